//! Settings type definitions.
//!
//! Field names are camelCase in JSON. Every struct is `#[serde(default)]`, so
//! a partial file only needs the keys it changes.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Level;
use wsprobe_logging::{LogFormat, LoggingOptions};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "serve": "wss://:8443", "cert": "cert.pem", "pkey": "key.pem" },
///   "logging": { "format": "json" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeSettings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

impl ProbeSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.serve.trim().is_empty() {
            return Err(SettingsError::InvalidValue("serve must not be empty".into()));
        }
        if self.server.ping_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "pingIntervalMs must be positive".into(),
            ));
        }
        if self.server.control_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "controlTimeoutMs must be positive".into(),
            ));
        }
        if self.server.max_file_bytes == Some(0) {
            return Err(SettingsError::InvalidValue(
                "maxFileBytes must be positive when set".into(),
            ));
        }
        let _ = self.logging.to_options()?;
        Ok(())
    }
}

/// Listener and session settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Listen URL: `ws://host:port` or `wss://host:port`. An empty host binds
    /// every interface.
    pub serve: String,
    /// PEM certificate chain, required for `wss://`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    /// PEM private key, required for `wss://`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pkey: Option<String>,
    /// Directory that `send me file://` requests resolve under.
    pub file_root: String,
    /// Ping interval in milliseconds. The auto-ping task fires every half interval.
    pub ping_interval_ms: u64,
    /// Deadline for each control-frame write, in milliseconds.
    pub control_timeout_ms: u64,
    /// Largest file `send me file://` will transfer. Unlimited when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_bytes: Option<u64>,
}

impl ServerSettings {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            serve: "ws://:8080".to_string(),
            cert: None,
            pkey: None,
            file_root: "/tmp".to_string(),
            ping_interval_ms: 5_000,
            control_timeout_ms: 10_000,
            max_file_bytes: None,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    pub format: LogFormat,
    /// Per-module levels, e.g. `{"wsprobe_server::session": "debug"}`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub modules: BTreeMap<String, String>,
}

fn parse_level(value: &str) -> Result<Level> {
    Level::from_str(value.trim())
        .map_err(|_| SettingsError::InvalidValue(format!("unknown log level '{value}'")))
}

impl LoggingSettings {
    pub fn level(&self) -> Result<Level> {
        parse_level(&self.level)
    }

    /// Subscriber options for `wsprobe_logging::init_subscriber`.
    pub fn to_options(&self) -> Result<LoggingOptions> {
        let module_levels = self
            .modules
            .iter()
            .map(|(module, level)| {
                if module.trim().is_empty() {
                    return Err(SettingsError::InvalidValue(
                        "logging module name must not be empty".into(),
                    ));
                }
                Ok((module.trim().to_owned(), parse_level(level)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(LoggingOptions {
            level: self.level()?,
            module_levels,
            format: self.format,
        })
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            modules: BTreeMap::new(),
        }
    }
}
