//! # wsprobe
//!
//! Diagnostic WebSocket server binary. Resolves settings, installs logging
//! and serves until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use wsprobe_logging::LogFormat;
use wsprobe_server::{ProbeServer, ServerConfig};
use wsprobe_settings::ProbeSettings;

const LINE_SEPARATOR: &str = "----------------------------------------";

/// How long shutdown waits for open sessions.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Diagnostic WebSocket server.
#[derive(Parser, Debug)]
#[command(name = "wsprobe", about = "Diagnostic WebSocket server", version)]
struct Cli {
    /// JSON settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen URL, `ws://host:port` or `wss://host:port`.
    #[arg(long)]
    serve: Option<String>,

    /// Server certificate if serving `wss://`.
    #[arg(long)]
    cert: Option<String>,

    /// Server private key if serving `wss://`.
    #[arg(long)]
    pkey: Option<String>,

    /// Root directory for `send me file://` requests.
    #[arg(long)]
    fileroot: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty or json).
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Flags win over every other settings layer.
    fn apply(&self, settings: &mut ProbeSettings) {
        if let Some(ref serve) = self.serve {
            settings.server.serve.clone_from(serve);
        }
        if let Some(ref cert) = self.cert {
            settings.server.cert = Some(cert.clone());
        }
        if let Some(ref pkey) = self.pkey {
            settings.server.pkey = Some(pkey.clone());
        }
        if let Some(ref root) = self.fileroot {
            settings.server.file_root.clone_from(root);
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }
}

fn resolve_settings(cli: &Cli) -> Result<ProbeSettings> {
    let mut settings = wsprobe_settings::load_settings(cli.config.as_deref())
        .context("Failed to load settings")?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn log_banner(settings: &ProbeSettings) {
    let server = &settings.server;
    info!("{LINE_SEPARATOR}");
    info!("Server configuration:");
    info!("{LINE_SEPARATOR}");
    info!("Server: {}", server.serve);
    info!("Certificate: {}", server.cert.as_deref().unwrap_or_default());
    info!("PrivateKey: {}", server.pkey.as_deref().unwrap_or_default());
    info!("FileRoot: {}", server.file_root);
    info!("{LINE_SEPARATOR}");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;

    let log_options = settings
        .logging
        .to_options()
        .context("Invalid logging settings")?;
    wsprobe_logging::init_subscriber(&log_options)
        .context("Failed to install tracing subscriber")?;

    log_banner(&settings);

    let config = ServerConfig::try_from(&settings.server).context("Invalid server configuration")?;
    let handle = ProbeServer::new(config)
        .start()
        .await
        .context("Failed to start server")?;
    info!(url = %handle.ws_url(), "ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("received Ctrl-C");
    handle.shutdown(Some(SHUTDOWN_TIMEOUT)).await;
    Ok(())
}
