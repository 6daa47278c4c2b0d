//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ClientSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `RELAYCHAT_*` environment overrides
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::ClientSettings;

/// Resolve the default settings file (`~/.relaychat/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".relaychat").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ClientSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ClientSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<ClientSettings> {
    let defaults = serde_json::to_value(ClientSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ClientSettings = serde_json::from_value(merged)?;
    // 0 disables the read timeout, same as RELAYCHAT_READ_TIMEOUT_MS=0
    if settings.session.read_timeout_ms == Some(0) {
        settings.session.read_timeout_ms = None;
    }
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `RELAYCHAT_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut ClientSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable lookup.
///
/// Invalid or out-of-range values are ignored with a warning and the
/// file/default value is kept. `RELAYCHAT_READ_TIMEOUT_MS=0` disables the
/// read timeout.
pub fn apply_overrides<F>(settings: &mut ClientSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let ranged = |name: &str, min: u64, max: u64| {
        let raw = lookup(name)?;
        let parsed = parse_u64_range(&raw, min, max);
        if parsed.is_none() {
            warn!(key = name, value = %raw, "invalid numeric env var, ignoring");
        }
        parsed
    };

    // ── Relay ───────────────────────────────────────────────────────
    if let Some(v) = string("RELAYCHAT_SCHEME") {
        settings.relay.scheme = v;
    }
    if let Some(v) = string("RELAYCHAT_HOST") {
        settings.relay.host = v;
    }
    if let Some(v) = ranged("RELAYCHAT_PORT", 1, u64::from(u16::MAX))
        .and_then(|v| u16::try_from(v).ok())
    {
        settings.relay.port = v;
    }
    if let Some(v) = string("RELAYCHAT_PATH") {
        settings.relay.path = v;
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = ranged("RELAYCHAT_CONNECT_TIMEOUT_MS", 100, 600_000) {
        settings.session.connect_timeout_ms = v;
    }
    if let Some(v) = ranged("RELAYCHAT_CLOSE_TIMEOUT_MS", 100, 600_000) {
        settings.session.close_timeout_ms = v;
    }
    if let Some(v) = ranged("RELAYCHAT_READ_TIMEOUT_MS", 0, 86_400_000) {
        settings.session.read_timeout_ms = (v > 0).then_some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("RELAYCHAT_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"relay": {"port": 8000, "host": "localhost"}});
        let source = serde_json::json!({"relay": {"port": 9000}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["relay"]["port"], 9000);
        assert_eq!(merged["relay"]["host"], "localhost");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = read_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, ClientSettings::default());
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"relay": {"host": "host.docker.internal"}, "session": {"readTimeoutMs": 30000}}"#,
        )
        .unwrap();

        let settings = read_file_layer(&path).unwrap();
        assert_eq!(
            settings.relay.base_address(),
            "ws://host.docker.internal:8000/ws"
        );
        assert_eq!(settings.session.read_timeout_ms, Some(30_000));
        assert_eq!(settings.session.close_timeout_ms, 5_000);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let err = read_file_layer(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"relay": {"scheme": "http"}}"#).unwrap();

        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    #[test]
    fn zero_read_timeout_in_file_disables_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"session": {"readTimeoutMs": 0}}"#).unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.session.read_timeout_ms, None);
        assert_eq!(settings.session.read_timeout(), None);
    }

    #[test]
    fn zero_connect_timeout_in_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"session": {"readTimeoutMs": 0, "connectTimeoutMs": 0}}"#,
        )
        .unwrap();

        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(ref m) if m.contains("connectTimeoutMs")));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_relay_fields() {
        let mut settings = ClientSettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("RELAYCHAT_HOST", "relay.internal"),
                ("RELAYCHAT_PORT", "9443"),
                ("RELAYCHAT_SCHEME", "wss"),
            ]),
        );
        assert_eq!(settings.relay.base_address(), "wss://relay.internal:9443/ws");
    }

    #[test]
    fn out_of_range_port_ignored() {
        let mut settings = ClientSettings::default();
        apply_overrides(&mut settings, env(&[("RELAYCHAT_PORT", "70000")]));
        assert_eq!(settings.relay.port, 8000);
    }

    #[test]
    fn empty_string_override_ignored() {
        let mut settings = ClientSettings::default();
        apply_overrides(&mut settings, env(&[("RELAYCHAT_HOST", "")]));
        assert_eq!(settings.relay.host, "localhost");
    }

    #[test]
    fn read_timeout_zero_disables() {
        let mut settings = ClientSettings::default();
        settings.session.read_timeout_ms = Some(1_000);
        apply_overrides(&mut settings, env(&[("RELAYCHAT_READ_TIMEOUT_MS", "0")]));
        assert_eq!(settings.session.read_timeout_ms, None);

        apply_overrides(&mut settings, env(&[("RELAYCHAT_READ_TIMEOUT_MS", "45000")]));
        assert_eq!(settings.session.read_timeout_ms, Some(45_000));
    }

    #[test]
    fn log_level_override() {
        let mut settings = ClientSettings::default();
        apply_overrides(&mut settings, env(&[("RELAYCHAT_LOG_LEVEL", "debug")]));
        assert_eq!(settings.logging.level, "debug");
    }

    // ── parse_u64_range ─────────────────────────────────────────────

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("1000", 1000, 600_000), Some(1000));
        assert_eq!(parse_u64_range(" 2500 ", 1000, 600_000), Some(2500));
        assert_eq!(parse_u64_range("999", 1000, 600_000), None);
        assert_eq!(parse_u64_range("abc", 1000, 600_000), None);
    }
}
