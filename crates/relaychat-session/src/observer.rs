//! Collaborator interface the session reports into, plus a queue-backed
//! implementation for consumers that want to pull events.
//!
//! Callbacks are invoked from the session's driver task and must return
//! promptly; anything slow (terminal output, UI updates) belongs behind a
//! queue such as [`EventQueue`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use relaychat_core::{ChannelId, DisconnectReason, SessionError};
use tokio::sync::mpsc;
use tracing::warn;

/// Receives inbound messages and lifecycle notifications from a session.
///
/// Exactly one of [`on_disconnected`](Self::on_disconnected) or
/// [`on_error`](Self::on_error) is called when a session ends.
pub trait SessionObserver: Send + Sync {
    /// One decoded inbound text frame, in delivery order.
    fn on_message(&self, text: &str);

    /// The connection opened.
    fn on_connected(&self, _channel: &ChannelId) {}

    /// The session reached `Closed`.
    fn on_disconnected(&self, _reason: &DisconnectReason) {}

    /// The session reached `Failed`.
    fn on_error(&self, _error: &SessionError) {}
}

/// An observer notification as a value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// See [`SessionObserver::on_connected`].
    Connected(ChannelId),
    /// See [`SessionObserver::on_message`].
    Message(String),
    /// See [`SessionObserver::on_disconnected`].
    Disconnected(DisconnectReason),
    /// See [`SessionObserver::on_error`].
    Error(SessionError),
}

impl SessionEvent {
    /// Whether this is the session's final notification.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected(_) | Self::Error(_))
    }
}

/// Create a bounded event queue and its receiving half.
pub fn event_queue(capacity: usize) -> (EventQueue, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let overflow = Arc::new(Mutex::new(None));
    (
        EventQueue {
            tx: Mutex::new(Some(tx)),
            overflow: overflow.clone(),
            dropped: AtomicU64::new(0),
        },
        EventReceiver {
            rx,
            overflow,
            finished: false,
        },
    )
}

/// [`SessionObserver`] that forwards notifications into a bounded queue.
///
/// Hand-off never blocks: when the queue is full, messages are dropped and
/// counted. The terminal notification is never dropped; if the queue is
/// full it is parked and delivered after the queued events drain.
pub struct EventQueue {
    tx: Mutex<Option<mpsc::Sender<SessionEvent>>>,
    overflow: Arc<Mutex<Option<SessionEvent>>>,
    dropped: AtomicU64,
}

impl EventQueue {
    /// Enqueue an event. Returns `false` if it was dropped.
    pub fn push(&self, event: SessionEvent) -> bool {
        if event.is_terminal() {
            let Some(tx) = self.tx.lock().take() else {
                return false;
            };
            if let Err(mpsc::error::TrySendError::Full(event)) = tx.try_send(event) {
                *self.overflow.lock() = Some(event);
            }
            // dropping the last sender closes the queue behind the terminal event
            return true;
        }

        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        if tx.try_send(event).is_ok() {
            true
        } else {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(dropped, "event queue full, dropping event");
            false
        }
    }

    /// Total events dropped because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SessionObserver for EventQueue {
    fn on_message(&self, text: &str) {
        let _ = self.push(SessionEvent::Message(text.to_owned()));
    }

    fn on_connected(&self, channel: &ChannelId) {
        let _ = self.push(SessionEvent::Connected(channel.clone()));
    }

    fn on_disconnected(&self, reason: &DisconnectReason) {
        let _ = self.push(SessionEvent::Disconnected(reason.clone()));
    }

    fn on_error(&self, error: &SessionError) {
        let _ = self.push(SessionEvent::Error(error.clone()));
    }
}

/// Receiving half of an [`EventQueue`].
pub struct EventReceiver {
    rx: mpsc::Receiver<SessionEvent>,
    overflow: Arc<Mutex<Option<SessionEvent>>>,
    finished: bool,
}

impl EventReceiver {
    /// Next event, or `None` once the terminal event has been delivered.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        let event = match self.rx.recv().await {
            Some(event) => Some(event),
            None => self.overflow.lock().take(),
        };
        if event.as_ref().is_some_and(SessionEvent::is_terminal) {
            self.finished = true;
        }
        event
    }

    /// Next inbound chat message, skipping lifecycle events.
    ///
    /// Fails with [`SessionError::SessionClosed`] once the session has ended
    /// and every message queued before the end has been returned.
    pub async fn recv_message(&mut self) -> Result<String, SessionError> {
        while let Some(event) = self.recv().await {
            if let SessionEvent::Message(text) = event {
                return Ok(text);
            }
        }
        Err(SessionError::SessionClosed)
    }

    /// Whether the terminal event has been received.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (queue, mut rx) = event_queue(8);
        queue.on_connected(&ChannelId::new("42").unwrap());
        queue.on_message("one");
        queue.on_message("two");
        queue.on_disconnected(&DisconnectReason::Normal);

        assert_matches!(rx.recv().await, Some(SessionEvent::Connected(_)));
        assert_eq!(rx.recv().await, Some(SessionEvent::Message("one".into())));
        assert_eq!(rx.recv().await, Some(SessionEvent::Message("two".into())));
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::Disconnected(DisconnectReason::Normal))
        );
        assert!(rx.is_finished());
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn full_queue_drops_messages_and_counts() {
        let (queue, mut rx) = event_queue(1);
        assert!(queue.push(SessionEvent::Message("kept".into())));
        assert!(!queue.push(SessionEvent::Message("dropped".into())));
        assert_eq!(queue.dropped_count(), 1);
        assert_eq!(rx.recv().await, Some(SessionEvent::Message("kept".into())));
    }

    #[tokio::test]
    async fn terminal_event_survives_full_queue() {
        let (queue, mut rx) = event_queue(1);
        queue.on_message("fills the queue");
        queue.on_error(&SessionError::Transport("reset".into()));

        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::Message("fills the queue".into()))
        );
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::Error(SessionError::Transport("reset".into())))
        );
        assert_eq!(rx.recv().await, None);
        assert_eq!(queue.dropped_count(), 0);
    }

    #[tokio::test]
    async fn nothing_enqueued_after_terminal() {
        let (queue, mut rx) = event_queue(8);
        queue.on_disconnected(&DisconnectReason::Normal);
        assert!(!queue.push(SessionEvent::Message("late".into())));
        assert_matches!(rx.recv().await, Some(SessionEvent::Disconnected(_)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn recv_message_skips_lifecycle_and_ends_with_session_closed() {
        let (queue, mut rx) = event_queue(8);
        queue.on_connected(&ChannelId::new("42").unwrap());
        queue.on_message("echo:Hello from client!");
        queue.on_error(&SessionError::Transport("reset".into()));

        assert_eq!(rx.recv_message().await.unwrap(), "echo:Hello from client!");
        assert_eq!(rx.recv_message().await, Err(SessionError::SessionClosed));
        assert_eq!(rx.recv_message().await, Err(SessionError::SessionClosed));
    }
}
