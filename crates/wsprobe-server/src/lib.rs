//! # wsprobe-server
//!
//! Diagnostic WebSocket server. Clients connect to `/ws` and drive the
//! server with a small text protocol:
//!
//! | Text | Reaction |
//! |------|----------|
//! | `ping me` | ping control frame, payload `ping me` |
//! | `pong me` | pong control frame, payload `pong me` |
//! | `start ping me` | start pinging every half ping interval |
//! | `stop ping me` | stop the running auto-ping task |
//! | `disconnect me` | close control frame, payload `disconnect me` |
//! | `send me file://<path>` | contents of `<file root>/<path>` as one binary frame |
//! | anything else | echoed back as text |
//!
//! Binary frames are echoed back unchanged.

#![deny(unsafe_code)]

pub mod auto_ping;
pub mod command;
pub mod config;
pub mod error;
pub mod file_send;
pub mod health;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod tls;
pub mod websocket;

pub use command::Command;
pub use config::{ListenUrl, Scheme, ServerConfig, SessionConfig, TlsFiles};
pub use error::{ServerError, SessionError};
pub use server::{AppState, ProbeServer, ServerHandle, build_router};
pub use session::{Session, SessionContext, SessionEnd};
pub use shutdown::ShutdownCoordinator;
