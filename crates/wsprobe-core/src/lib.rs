//! # wsprobe-core
//!
//! Shared building blocks for the wsprobe diagnostic WebSocket server.
//!
//! - [`frame`]: frame model for reads ([`Frame`]) and writes ([`DataFrame`], [`ControlFrame`])
//! - [`transport`]: the duplex connection seam ([`FrameSource`], [`FrameSink`], [`Connection`])
//! - [`signal`]: per-session cancellation signals for background tasks
//! - [`ids`]: session identifiers
//! - `mock`: in-memory transport for tests (`test-util` feature)

#![deny(unsafe_code)]

pub mod errors;
pub mod frame;
pub mod ids;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod signal;
pub mod transport;

pub use errors::TransportError;
pub use frame::{CloseReason, ControlFrame, DataFrame, Frame, FrameKind};
pub use ids::SessionId;
pub use signal::{CancelReason, ControlSignaler, TaskSignals};
pub use transport::{Connection, ControlHandler, FrameSink, FrameSource, FrameWriter};
