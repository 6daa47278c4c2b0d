//! Session configuration.

use std::time::Duration;

use relaychat_settings::{ClientSettings, SessionSettings};

/// Runtime parameters for one [`ConnectionSession`](crate::ConnectionSession).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Relay base address; the channel ID is appended to it.
    pub base_address: String,
    /// Bound on the connect handshake.
    pub connect_timeout: Duration,
    /// Bound on the close handshake.
    pub close_timeout: Duration,
    /// Longest a receive may stall before the session fails (`None` = no bound).
    pub read_timeout: Option<Duration>,
    /// Outbound send queue depth.
    pub outbound_capacity: usize,
}

impl SessionConfig {
    /// Defaults for everything but the base address.
    pub fn new(base_address: impl Into<String>) -> Self {
        Self::with_session_settings(base_address, &SessionSettings::default())
    }

    /// Build from loaded client settings.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self::with_session_settings(settings.relay.base_address(), &settings.session)
    }

    fn with_session_settings(base_address: impl Into<String>, session: &SessionSettings) -> Self {
        Self {
            base_address: base_address.into(),
            connect_timeout: session.connect_timeout(),
            close_timeout: session.close_timeout(),
            read_timeout: session.read_timeout(),
            outbound_capacity: session.outbound_queue_capacity.max(1),
        }
    }

    /// Set the read idle bound.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the close handshake bound.
    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set the connect handshake bound.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
