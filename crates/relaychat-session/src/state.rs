//! Shared session state cell.

use relaychat_core::SessionState;
use tokio::sync::watch;
use tracing::debug;

/// Current [`SessionState`], shared by the session handle and its driver.
///
/// Transitions are compare-and-set so two racing callers cannot both claim
/// the same edge; in particular only one caller ever wins the move into a
/// terminal state, which is what gates the final lifecycle notification.
pub(crate) struct StateCell {
    tx: watch::Sender<SessionState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Idle);
        Self { tx }
    }

    pub(crate) fn get(&self) -> SessionState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Move `from → to`. Returns `false` (and changes nothing) if the
    /// current state is not `from`.
    pub(crate) fn advance(&self, from: SessionState, to: SessionState) -> bool {
        let moved = self.tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if moved {
            debug!(%from, %to, "session state changed");
        }
        moved
    }

    /// Move into a terminal state. Returns `true` only for the call that
    /// performed the transition.
    pub(crate) fn terminate(&self, to: SessionState) -> bool {
        debug_assert!(to.is_terminal());
        let mut from = SessionState::Idle;
        let moved = self.tx.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                from = *state;
                *state = to;
                true
            }
        });
        if moved {
            debug!(%from, %to, "session state changed");
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        assert_eq!(StateCell::new().get(), SessionState::Idle);
    }

    #[test]
    fn advance_requires_expected_state() {
        let cell = StateCell::new();
        assert!(!cell.advance(SessionState::Open, SessionState::Closing));
        assert_eq!(cell.get(), SessionState::Idle);
        assert!(cell.advance(SessionState::Idle, SessionState::Connecting));
        assert_eq!(cell.get(), SessionState::Connecting);
    }

    #[test]
    fn terminate_wins_once() {
        let cell = StateCell::new();
        assert!(cell.advance(SessionState::Idle, SessionState::Connecting));
        assert!(cell.terminate(SessionState::Failed));
        assert!(!cell.terminate(SessionState::Closed));
        assert_eq!(cell.get(), SessionState::Failed);
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let cell = StateCell::new();
        let mut rx = cell.subscribe();
        assert!(cell.advance(SessionState::Idle, SessionState::Connecting));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SessionState::Connecting);
    }
}
