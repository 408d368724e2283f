//! Duplex frame connection seam.
//!
//! A concrete transport (the axum WebSocket adapter in `wsprobe-server`, or
//! the in-memory [`mock`](crate::mock) pair) supplies a [`FrameSource`] and a
//! [`FrameSink`]. [`Connection`] layers the session-facing behavior on top:
//! control-frame handlers run synchronously inside [`Connection::read_frame`],
//! and control writes carry a deadline.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;
use tracing::trace;

use crate::errors::TransportError;
use crate::frame::{CloseReason, ControlFrame, DataFrame, Frame};

/// Read half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame from the peer, or `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;
}

/// Write half of a connection.
///
/// Implementations must serialize concurrent writers; the session loop and a
/// background task share one sink.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send_data(&self, frame: DataFrame) -> Result<(), TransportError>;
    async fn send_control(&self, frame: ControlFrame) -> Result<(), TransportError>;
    /// Flush and shut down the write half.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Callbacks for control frames received during [`Connection::read_frame`].
///
/// All methods default to no-ops.
#[async_trait]
pub trait ControlHandler: Send + Sync {
    async fn on_close(&self, _reason: Option<&CloseReason>) {}
    async fn on_ping(&self, _payload: &Bytes) {}
    async fn on_pong(&self, _payload: &Bytes) {}
}

/// Cloneable write handle.
#[derive(Clone)]
pub struct FrameWriter {
    sink: Arc<dyn FrameSink>,
}

impl FrameWriter {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self { sink }
    }

    pub async fn write_frame(&self, frame: DataFrame) -> Result<(), TransportError> {
        trace!(kind = %frame.kind(), len = frame.len(), "writing frame");
        self.sink.send_data(frame).await
    }

    /// Write a control frame, failing with [`TransportError::DeadlineExceeded`]
    /// if it has not completed by `deadline`.
    pub async fn write_control_frame(
        &self,
        frame: ControlFrame,
        deadline: Instant,
    ) -> Result<(), TransportError> {
        let budget = deadline.saturating_duration_since(Instant::now());
        trace!(kind = %frame.kind(), payload = %frame.payload_text(), "writing control frame");
        match tokio::time::timeout_at(deadline, self.sink.send_control(frame)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::DeadlineExceeded(budget)),
        }
    }

    pub async fn close(&self) -> Result<(), TransportError> {
        self.sink.close().await
    }
}

impl fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameWriter").finish_non_exhaustive()
    }
}

/// One upgraded duplex connection.
pub struct Connection<S> {
    source: S,
    writer: FrameWriter,
    handler: Option<Arc<dyn ControlHandler>>,
}

impl<S: FrameSource> Connection<S> {
    pub fn new(source: S, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            source,
            writer: FrameWriter::new(sink),
            handler: None,
        }
    }

    pub fn writer(&self) -> &FrameWriter {
        &self.writer
    }

    /// Register the close/ping/pong callbacks. Replaces any earlier handler.
    pub fn set_control_handler(&mut self, handler: Arc<dyn ControlHandler>) {
        self.handler = Some(handler);
    }

    /// Read the next frame.
    ///
    /// Ping and pong frames are passed to the control handler and never
    /// returned. A close frame is passed to the handler and then returned so
    /// the caller can end its loop. End of stream is [`TransportError::Closed`].
    pub async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        loop {
            let frame = match self.source.next_frame().await {
                Some(result) => result?,
                None => return Err(TransportError::Closed),
            };

            match &frame {
                Frame::Ping(payload) => {
                    if let Some(handler) = &self.handler {
                        handler.on_ping(payload).await;
                    }
                }
                Frame::Pong(payload) => {
                    if let Some(handler) = &self.handler {
                        handler.on_pong(payload).await;
                    }
                }
                Frame::Close(reason) => {
                    if let Some(handler) = &self.handler {
                        handler.on_close(reason.as_ref()).await;
                    }
                    return Ok(frame);
                }
                Frame::Text(_) | Frame::Binary(_) | Frame::Unknown(_) => return Ok(frame),
            }
        }
    }

    /// Release the transport.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.writer.close().await
    }
}
