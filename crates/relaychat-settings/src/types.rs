//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may specify any subset of fields; missing ones keep their defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the relaychat client.
///
/// ```json
/// {
///   "relay": { "host": "host.docker.internal", "port": 8000 },
///   "session": { "readTimeoutMs": 60000 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Where the relay lives.
    pub relay: RelaySettings,
    /// Connection session timing and queue sizes.
    pub session: SessionSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl ClientSettings {
    /// Check cross-field constraints the types cannot express.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.relay.scheme.as_str(), "ws" | "wss") {
            return Err(SettingsError::InvalidValue(format!(
                "relay.scheme must be \"ws\" or \"wss\", got \"{}\"",
                self.relay.scheme
            )));
        }
        if self.relay.host.trim().is_empty() {
            return Err(SettingsError::InvalidValue("relay.host must not be empty".into()));
        }
        if self.relay.port == 0 {
            return Err(SettingsError::InvalidValue("relay.port must be non-zero".into()));
        }
        if self.session.connect_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "session.connectTimeoutMs must be non-zero".into(),
            ));
        }
        if self.session.close_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "session.closeTimeoutMs must be non-zero".into(),
            ));
        }
        if self.session.event_queue_capacity == 0 || self.session.outbound_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "session queue capacities must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Relay endpoint location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// `ws` or `wss`.
    pub scheme: String,
    /// Relay host name or IP.
    pub host: String,
    /// Relay port.
    pub port: u16,
    /// Path prefix under which channels live.
    pub path: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            scheme: "ws".to_string(),
            host: "localhost".to_string(),
            port: 8000,
            path: "/ws".to_string(),
        }
    }
}

impl RelaySettings {
    /// Render `scheme://host:port/path` without a trailing slash.
    pub fn base_address(&self) -> String {
        let path = self.path.trim_matches('/');
        if path.is_empty() {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}/{path}", self.scheme, self.host, self.port)
        }
    }
}

/// Session timing and buffering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Bound on the connect handshake.
    pub connect_timeout_ms: u64,
    /// Bound on the close handshake before the handle is released anyway.
    pub close_timeout_ms: u64,
    /// Longest a receive may stall before the session fails. `None` or `0`
    /// waits indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
    /// Capacity of the inbound event queue handed to the display.
    pub event_queue_capacity: usize,
    /// Capacity of the outbound send queue feeding the driver.
    pub outbound_queue_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            close_timeout_ms: 5_000,
            read_timeout_ms: None,
            event_queue_capacity: 256,
            outbound_queue_capacity: 32,
        }
    }
}

impl SessionSettings {
    /// Connect bound as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Close handshake bound as a [`Duration`].
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// Read idle bound as a [`Duration`], if enabled.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `tracing` filter directive (e.g. `info`, `relaychat_session=debug`).
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_address_normalizes_slashes() {
        let mut relay = RelaySettings::default();
        relay.path = "ws/".into();
        assert_eq!(relay.base_address(), "ws://localhost:8000/ws");
        relay.path = "/".into();
        assert_eq!(relay.base_address(), "ws://localhost:8000");
        relay.path = "/api/chat".into();
        assert_eq!(relay.base_address(), "ws://localhost:8000/api/chat");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{"relay": {"host": "host.docker.internal"}}"#;
        let settings: ClientSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.relay.host, "host.docker.internal");
        assert_eq!(settings.relay.port, 8000);
        assert_eq!(settings.session, SessionSettings::default());
    }

    #[test]
    fn read_timeout_omitted_when_disabled() {
        let json = serde_json::to_value(SessionSettings::default()).unwrap();
        assert!(json.get("readTimeoutMs").is_none());
        assert_eq!(json["closeTimeoutMs"], 5000);
    }

    #[test]
    fn durations() {
        let session = SessionSettings {
            read_timeout_ms: Some(250),
            ..SessionSettings::default()
        };
        assert_eq!(session.connect_timeout(), Duration::from_secs(10));
        assert_eq!(session.close_timeout(), Duration::from_secs(5));
        assert_eq!(session.read_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(ClientSettings::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_scheme() {
        let mut settings = ClientSettings::default();
        settings.relay.scheme = "http".into();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("relay.scheme"));
    }

    #[test]
    fn validate_rejects_zero_close_timeout() {
        let mut settings = ClientSettings::default();
        settings.session.close_timeout_ms = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_connect_timeout() {
        let mut settings = ClientSettings::default();
        settings.session.connect_timeout_ms = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("connectTimeoutMs"));
    }

    #[test]
    fn zero_read_timeout_is_disabled() {
        let session = SessionSettings {
            read_timeout_ms: Some(0),
            ..SessionSettings::default()
        };
        assert_eq!(session.read_timeout(), None);
    }

    #[test]
    fn validate_rejects_zero_queue() {
        let mut settings = ClientSettings::default();
        settings.session.event_queue_capacity = 0;
        assert!(settings.validate().is_err());
    }
}
