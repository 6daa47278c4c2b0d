//! Error taxonomy for session operations.
//!
//! Every variant carries enough context to tell the caller what happened
//! without inspecting the transport. Causes are kept as strings so errors
//! can be cloned into lifecycle notifications and event queues.

use thiserror::Error;

use crate::types::SessionState;

/// Errors reported by a connection session.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Rejected before any I/O (e.g. empty channel identifier).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The connect handshake failed or timed out.
    #[error("connection to {endpoint} failed: {reason}")]
    Connection {
        /// Address the session tried to reach.
        endpoint: String,
        /// Underlying cause.
        reason: String,
    },

    /// A send was attempted while the session was not open.
    #[error("cannot send while session is {state}")]
    Send {
        /// State at the time of the call.
        state: SessionState,
    },

    /// Mid-session I/O failure that was not a clean close.
    #[error("transport error: {0}")]
    Transport(String),

    /// The session already reached `Closed` or `Failed`.
    #[error("session is closed")]
    SessionClosed,

    /// `start` was called on a session that already left `Idle`.
    #[error("session already started (currently {state})")]
    AlreadyStarted {
        /// State at the time of the call.
        state: SessionState,
    },
}

impl SessionError {
    /// Stable machine-readable code for the variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::Send { .. } => "SEND_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::SessionClosed => "SESSION_CLOSED",
            Self::AlreadyStarted { .. } => "ALREADY_STARTED",
        }
    }

    /// Whether the error ended the session (as opposed to rejecting one call).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Transport(_))
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_display() {
        let err = SessionError::Connection {
            endpoint: "ws://localhost:8000/ws/42".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "connection to ws://localhost:8000/ws/42 failed: connection refused"
        );
    }

    #[test]
    fn send_error_names_state() {
        let err = SessionError::Send {
            state: SessionState::Closing,
        };
        assert_eq!(err.to_string(), "cannot send while session is closing");
    }

    #[test]
    fn codes_are_distinct() {
        let errors = [
            SessionError::InvalidArgument("x".into()),
            SessionError::Connection {
                endpoint: "e".into(),
                reason: "r".into(),
            },
            SessionError::Send {
                state: SessionState::Idle,
            },
            SessionError::Transport("reset".into()),
            SessionError::SessionClosed,
            SessionError::AlreadyStarted {
                state: SessionState::Open,
            },
        ];
        let mut codes: Vec<_> = errors.iter().map(SessionError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn only_connection_and_transport_are_fatal() {
        assert!(SessionError::Transport("reset".into()).is_fatal());
        assert!(
            SessionError::Connection {
                endpoint: "e".into(),
                reason: "r".into(),
            }
            .is_fatal()
        );
        assert!(!SessionError::SessionClosed.is_fatal());
        assert!(
            !SessionError::Send {
                state: SessionState::Idle
            }
            .is_fatal()
        );
    }
}
