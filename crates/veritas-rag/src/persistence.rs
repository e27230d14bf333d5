//! Background conversation-log writers.
//!
//! Completed turns are handed to a fixed pool of worker tasks sharing one
//! unbounded queue. Submission never blocks and never fails the turn: there
//! is no backpressure and delivery is best effort. Write failures are logged
//! and dropped.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use veritas_core::Turn;
use veritas_storage::ConversationStore;

struct WriteJob {
    user_id: String,
    turns: Vec<Turn>,
}

/// Fixed-size pool of background history writers.
pub struct HistoryWriter {
    tx: Mutex<Option<mpsc::UnboundedSender<WriteJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    pool_size: usize,
}

impl HistoryWriter {
    /// Spawn `pool_size` workers (at least one) writing into `store`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn ConversationStore>, pool_size: usize) -> Self {
        let pool_size = pool_size.max(1);
        let (tx, rx) = mpsc::unbounded_channel::<WriteJob>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let workers = (0..pool_size)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    loop {
                        let job = { rx.lock().await.recv().await };
                        let Some(job) = job else { break };
                        match store.save(&job.user_id, &job.turns).await {
                            Ok(()) => debug!(
                                worker,
                                user_id = %job.user_id,
                                entries = job.turns.len(),
                                "Conversation stored"
                            ),
                            Err(e) => error!(
                                worker,
                                user_id = %job.user_id,
                                error = %e,
                                "Failed to store conversation"
                            ),
                        }
                    }
                    debug!(worker, "History writer stopped");
                })
            })
            .collect();

        Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            pool_size,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Queue `turns` as the new log for `user_id`. Returns immediately.
    pub fn submit(&self, user_id: impl Into<String>, turns: Vec<Turn>) {
        let job = WriteJob {
            user_id: user_id.into(),
            turns,
        };
        let guard = match self.tx.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("History writer lock poisoned: {}", e);
                return;
            }
        };
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(job).is_err() {
                    warn!("History writers are gone, dropping conversation update");
                }
            }
            None => warn!(
                user_id = %job.user_id,
                "History writer shut down, dropping conversation update"
            ),
        }
    }

    /// Close the queue and wait until every queued write has been attempted.
    pub async fn shutdown(&self) {
        let tx = match self.tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(e) => {
                warn!("History writer lock poisoned: {}", e);
                None
            }
        };
        drop(tx);

        let workers = match self.workers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(e) => {
                warn!("History writer lock poisoned: {}", e);
                Vec::new()
            }
        };
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "History writer task failed");
            }
        }
    }
}
