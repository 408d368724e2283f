//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ProbeSettings::default()`]
//! 2. If a settings file was given, deep-merge its values over the defaults
//! 3. Apply `WSPROBE_*` environment variable overrides
//!
//! Command-line flags are applied by the binary on top of the result.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};
use wsprobe_logging::LogFormat;

use crate::errors::Result;
use crate::types::ProbeSettings;

/// Load settings from an optional JSON file, then apply env overrides.
///
/// A missing file is an error here: the path was asked for explicitly.
pub fn load_settings(path: Option<&Path>) -> Result<ProbeSettings> {
    let mut settings = match path {
        Some(path) => load_file(path)?,
        None => ProbeSettings::default(),
    };
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file(path: &Path) -> Result<ProbeSettings> {
    debug!(?path, "loading settings from file");
    let defaults = serde_json::to_value(ProbeSettings::default())?;
    let content = std::fs::read_to_string(path)?;
    let user: Value = serde_json::from_str(&content)?;
    Ok(serde_json::from_value(deep_merge(defaults, user))?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply `WSPROBE_*` overrides from the process environment.
///
/// Invalid values are logged and ignored.
pub fn apply_env_overrides(settings: &mut ProbeSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides using `lookup` in place of the process environment.
pub fn apply_overrides_from<F>(settings: &mut ProbeSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    if let Some(v) = env.string("WSPROBE_SERVE") {
        settings.server.serve = v;
    }
    if let Some(v) = env.string("WSPROBE_CERT") {
        settings.server.cert = Some(v);
    }
    if let Some(v) = env.string("WSPROBE_PKEY") {
        settings.server.pkey = Some(v);
    }
    if let Some(v) = env.string("WSPROBE_FILE_ROOT") {
        settings.server.file_root = v;
    }
    if let Some(v) = env.u64("WSPROBE_PING_INTERVAL_MS", 100, 3_600_000) {
        settings.server.ping_interval_ms = v;
    }
    if let Some(v) = env.u64("WSPROBE_CONTROL_TIMEOUT_MS", 100, 600_000) {
        settings.server.control_timeout_ms = v;
    }
    if let Some(v) = env.u64("WSPROBE_MAX_FILE_BYTES", 1, u64::MAX) {
        settings.server.max_file_bytes = Some(v);
    }
    if let Some(v) = env.string("WSPROBE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("WSPROBE_LOG_FORMAT") {
        match v.parse::<LogFormat>() {
            Ok(format) => settings.logging.format = format,
            Err(e) => warn!(key = "WSPROBE_LOG_FORMAT", value = %v, error = %e, "ignoring"),
        }
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"serve": "ws://:8080", "fileRoot": "/tmp"}});
        let source = serde_json::json!({"server": {"fileRoot": "/srv"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["fileRoot"], "/srv");
        assert_eq!(merged["server"]["serve"], "ws://:8080");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let merged = deep_merge(target, serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let merged = deep_merge(target, serde_json::json!({"a": 42}));
        assert_eq!(merged["a"], 42);
    }

    #[test]
    fn no_file_gives_defaults() {
        let mut settings = ProbeSettings::default();
        apply_overrides_from(&mut settings, env(&[]));
        assert_eq!(settings, ProbeSettings::default());
    }

    #[test]
    fn load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wsprobe.json");
        std::fs::write(
            &path,
            r#"{"server": {"serve": "wss://127.0.0.1:8443", "maxFileBytes": 1024}, "logging": {"format": "json"}}"#,
        )
        .unwrap();

        let settings = load_file(&path).unwrap();
        assert_eq!(settings.server.serve, "wss://127.0.0.1:8443");
        assert_eq!(settings.server.max_file_bytes, Some(1024));
        assert_eq!(settings.server.file_root, "/tmp");
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }

    #[test]
    fn invalid_json_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wsprobe.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_file(&path).unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = ProbeSettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("WSPROBE_SERVE", "wss://:9443"),
                ("WSPROBE_CERT", "/etc/wsprobe/cert.pem"),
                ("WSPROBE_PKEY", "/etc/wsprobe/key.pem"),
                ("WSPROBE_FILE_ROOT", "/srv/files"),
                ("WSPROBE_PING_INTERVAL_MS", "2000"),
                ("WSPROBE_CONTROL_TIMEOUT_MS", "500"),
                ("WSPROBE_MAX_FILE_BYTES", "4096"),
                ("WSPROBE_LOG_LEVEL", "debug"),
                ("WSPROBE_LOG_FORMAT", "json"),
            ]),
        );
        assert_eq!(settings.server.serve, "wss://:9443");
        assert_eq!(settings.server.cert.as_deref(), Some("/etc/wsprobe/cert.pem"));
        assert_eq!(settings.server.pkey.as_deref(), Some("/etc/wsprobe/key.pem"));
        assert_eq!(settings.server.file_root, "/srv/files");
        assert_eq!(settings.server.ping_interval_ms, 2000);
        assert_eq!(settings.server.control_timeout_ms, 500);
        assert_eq!(settings.server.max_file_bytes, Some(4096));
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = ProbeSettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("WSPROBE_PING_INTERVAL_MS", "fast"),
                ("WSPROBE_CONTROL_TIMEOUT_MS", "5"),
                ("WSPROBE_MAX_FILE_BYTES", "0"),
                ("WSPROBE_LOG_FORMAT", "xml"),
                ("WSPROBE_SERVE", ""),
            ]),
        );
        assert_eq!(settings, ProbeSettings::default());
    }

    #[test]
    fn parse_u64_range_bounds() {
        assert_eq!(parse_u64_range("100", 100, 200), Some(100));
        assert_eq!(parse_u64_range(" 200 ", 100, 200), Some(200));
        assert_eq!(parse_u64_range("99", 100, 200), None);
        assert_eq!(parse_u64_range("201", 100, 200), None);
        assert_eq!(parse_u64_range("-1", 0, 200), None);
    }
}
