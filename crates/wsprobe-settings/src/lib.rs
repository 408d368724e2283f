//! # wsprobe-settings
//!
//! Layered configuration for the wsprobe server.
//!
//! Settings are resolved from four layers (lowest priority first):
//! 1. **Compiled defaults** ([`ProbeSettings::default()`])
//! 2. **Settings file** given with `--config` (deep-merged over defaults)
//! 3. **Environment variables** (`WSPROBE_*`)
//! 4. **Command-line flags**, applied by the binary

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, apply_overrides_from, deep_merge, load_settings};
pub use types::{LoggingSettings, ProbeSettings, ServerSettings};
