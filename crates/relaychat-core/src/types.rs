//! Channel identifiers and session lifecycle types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

// ─────────────────────────────────────────────────────────────────────────────
// ChannelId
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque identifier scoping a connection to one channel on the relay.
///
/// Always non-empty. Surrounding whitespace is stripped on construction, so
/// `" 42 "` and `"42"` name the same channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(String);

impl ChannelId {
    /// Validate and wrap a channel identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, SessionError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SessionError::InvalidArgument(
                "channel identifier must not be empty".into(),
            ));
        }
        if trimmed.len() == raw.len() {
            Ok(Self(raw))
        } else {
            Ok(Self(trimmed.to_owned()))
        }
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ChannelId {
    type Error = SessionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ChannelId {
    type Error = SessionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionState
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of a connection session.
///
/// ```text
/// Idle → Connecting → Open → Closing → Closed
///            │          │
///            └──────────┴──→ Failed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, not yet started.
    Idle,
    /// Connect handshake in flight.
    Connecting,
    /// Connected; sends and receives are permitted.
    Open,
    /// Close handshake in progress; no new sends.
    Closing,
    /// Handshake finished (or timed out) and the handle was released.
    Closed,
    /// Connect or mid-session transport failure; the handle was released.
    Failed,
}

impl SessionState {
    /// Whether no further operations are permitted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    /// Stable lowercase name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DisconnectReason
// ─────────────────────────────────────────────────────────────────────────────

/// Why a session reached `Closed`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisconnectReason {
    /// Local shutdown; the close handshake completed.
    Normal,
    /// The relay sent a close frame.
    PeerClosed {
        /// Close code from the peer's frame, if it carried one.
        code: Option<u16>,
        /// Close reason text from the peer's frame.
        reason: String,
    },
    /// The close handshake did not complete (timed out or the transport
    /// broke mid-handshake); the handle was released anyway.
    HandshakeIncomplete {
        /// What went wrong.
        detail: String,
    },
    /// `shutdown` was called before the session was ever started.
    NeverStarted,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::PeerClosed { code, reason } => match (code, reason.is_empty()) {
                (Some(code), false) => write!(f, "closed by peer ({code}: {reason})"),
                (Some(code), true) => write!(f, "closed by peer ({code})"),
                (None, _) => f.write_str("closed by peer"),
            },
            Self::HandshakeIncomplete { detail } => {
                write!(f, "close handshake incomplete: {detail}")
            }
            Self::NeverStarted => f.write_str("never started"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
