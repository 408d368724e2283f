//! axum WebSocket adapter for the frame transport seam.

pub mod transport;

pub use transport::{WsFrameSink, WsFrameSource, split_socket};
