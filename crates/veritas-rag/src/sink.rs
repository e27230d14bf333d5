use tokio::sync::mpsc;
use tracing::trace;
use veritas_core::{EventKind, StreamEvent};

use crate::error::RagError;

/// Item carried on a turn's event channel. An error is always the last item.
pub type EventItem = Result<StreamEvent, RagError>;

/// Producer side of a turn's event stream.
///
/// Sending never fails the turn: once the consumer goes away, events are
/// dropped and the turn runs to completion.
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<EventItem>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<EventItem>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards everything. Used by non-streaming calls.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Create a sink together with its receiving end.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<EventItem>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }

    pub async fn emit(&self, event: StreamEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(Ok(event)).await.is_err() {
                trace!("Event receiver dropped");
            }
        }
    }

    /// Emit a content-less event.
    pub async fn mark(&self, kind: EventKind, generate_id: u32) {
        self.emit(StreamEvent::new(kind, generate_id)).await;
    }

    /// Forward the error that ended the turn.
    pub async fn fail(&self, err: RagError) {
        if let Some(tx) = &self.tx {
            if tx.send(Err(err)).await.is_err() {
                trace!("Event receiver dropped before error delivery");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (sink, mut rx) = EventSink::channel(8);
        sink.mark(EventKind::Init, 0).await;
        sink.emit(StreamEvent::chunk(1, "a")).await;
        sink.fail(RagError::EmptyQuestion).await;
        drop(sink);

        assert_eq!(rx.recv().await.unwrap().unwrap().kind, EventKind::Init);
        assert_eq!(
            rx.recv().await.unwrap().unwrap().content.as_deref(),
            Some("a")
        );
        assert!(rx.recv().await.unwrap().is_err());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_ignored() {
        let (sink, rx) = EventSink::channel(1);
        drop(rx);
        sink.mark(EventKind::Init, 0).await;
        sink.fail(RagError::EmptyQuestion).await;
    }

    #[tokio::test]
    async fn test_disabled_sink() {
        let sink = EventSink::disabled();
        sink.mark(EventKind::Final, 3).await;
    }
}
