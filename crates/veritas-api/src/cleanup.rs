//! Periodic purge of expired sessions.
//!
//! Started once at boot and stopped at shutdown. It shares nothing with the
//! answering engine beyond the process.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::sessions::SessionRegistry;

/// Background loop that expires sessions on a fixed interval.
pub struct CleanupTask {
    sessions: Arc<SessionRegistry>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl CleanupTask {
    pub fn new(sessions: Arc<SessionRegistry>, interval: Duration) -> Self {
        Self {
            sessions,
            interval: interval.max(Duration::from_secs(1)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Session cleanup started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    let purged = self.sessions.purge_expired();
                    if purged > 0 {
                        tracing::info!(purged, remaining = self.sessions.len(), "Expired sessions purged");
                    } else {
                        tracing::trace!("No expired sessions");
                    }
                }
                _ = self.shutdown.notified() => {
                    tracing::info!("Session cleanup stopped");
                    return;
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the runtime.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Signal the loop to stop. Safe to call before `run` starts.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}
