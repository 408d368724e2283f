//! Connection session loop.
//!
//! One [`Session`] serves one upgraded connection from the first read to the
//! final close:
//!
//! 1. Registers [`SessionControl`] so close/ping/pong frames are handled
//!    during reads
//! 2. Echoes binary frames and hands text frames to the command interpreter
//! 3. Ends on any read failure, peer close, fatal command error, or server
//!    shutdown
//! 4. Signals `closing`, waits for background tasks and releases the transport
//!    on every exit path

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info, info_span, trace, warn};
use wsprobe_core::{
    CloseReason, Connection, ControlFrame, ControlHandler, ControlSignaler, DataFrame, Frame,
    FrameSource, FrameWriter, SessionId,
};

use crate::command;
use crate::config::SessionConfig;
use crate::error::SessionError;

/// State shared by the session loop, the command interpreter and the
/// auto-ping task.
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub id: SessionId,
    pub writer: FrameWriter,
    pub signaler: ControlSignaler,
    /// Background tasks owned by this session.
    pub tasks: TaskTracker,
    pub config: Arc<SessionConfig>,
}

impl SessionContext {
    pub fn new(writer: FrameWriter, signaler: ControlSignaler, config: Arc<SessionConfig>) -> Self {
        Self {
            id: SessionId::new(),
            writer,
            signaler,
            tasks: TaskTracker::new(),
            config,
        }
    }

    /// Deadline for a control write started now.
    pub fn control_deadline(&self) -> Instant {
        Instant::now() + self.config.control_timeout
    }

    /// Write a control frame under the configured deadline.
    pub async fn send_control(&self, frame: ControlFrame) -> Result<(), SessionError> {
        debug!(kind = %frame.kind(), payload = %frame.payload_text(), "sending control frame");
        self.writer
            .write_control_frame(frame, self.control_deadline())
            .await
            .map_err(|e| {
                warn!(error = %e, "control frame write failed");
                SessionError::TransportWrite(e)
            })
    }
}

/// Close/ping/pong callbacks for one session.
pub struct SessionControl {
    ctx: SessionContext,
}

impl SessionControl {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ControlHandler for SessionControl {
    async fn on_close(&self, reason: Option<&CloseReason>) {
        match reason {
            Some(r) => info!(code = r.code, reason = %r.reason, "peer sent close, cancelling tasks"),
            None => info!("peer sent close, cancelling tasks"),
        }
        self.ctx.signaler.close();
    }

    async fn on_ping(&self, payload: &Bytes) {
        debug!(len = payload.len(), "got ping");
        match self
            .ctx
            .writer
            .write_control_frame(ControlFrame::Pong(payload.clone()), self.ctx.control_deadline())
            .await
        {
            Ok(()) => debug!("sent pong"),
            Err(e) => warn!(error = %e, "failed to answer ping"),
        }
    }

    async fn on_pong(&self, payload: &Bytes) {
        debug!(len = payload.len(), "got pong");
    }
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The peer sent a close frame.
    PeerClosed(Option<CloseReason>),
    /// Reading failed, the stream ended, or a frame handler failed fatally.
    Failed(SessionError),
    /// The server is shutting down.
    Shutdown,
}

impl SessionEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PeerClosed(_) => "peer_closed",
            Self::Failed(_) => "failed",
            Self::Shutdown => "shutdown",
        }
    }
}

/// One live connection.
pub struct Session<S> {
    conn: Connection<S>,
    ctx: SessionContext,
}

impl<S: FrameSource> Session<S> {
    /// Wrap an upgraded connection. `shutdown` also closes this session.
    pub fn new(mut conn: Connection<S>, config: Arc<SessionConfig>, shutdown: &CancellationToken) -> Self {
        let signaler = ControlSignaler::with_parent(shutdown);
        let ctx = SessionContext::new(conn.writer().clone(), signaler, config);
        conn.set_control_handler(Arc::new(SessionControl::new(ctx.clone())));
        Self { conn, ctx }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Serve the connection until it ends.
    pub async fn run(mut self) -> SessionEnd {
        let span = info_span!("session", session_id = %self.ctx.id);
        async move {
            info!("session started");
            let _closing = self.ctx.signaler.close_on_drop();

            let end = self.serve().await;

            self.ctx.signaler.close();
            let _ = self.ctx.tasks.close();
            self.ctx.tasks.wait().await;
            if let Err(e) = self.conn.close().await {
                debug!(error = %e, "transport close failed");
            }

            match &end {
                SessionEnd::Failed(SessionError::TransportRead(e)) if e.is_closed() => {
                    info!(end = end.as_str(), "stream ended, session ended");
                }
                SessionEnd::Failed(e) => {
                    warn!(end = end.as_str(), error = %e, kind = e.error_kind(), "session ended");
                }
                _ => info!(end = end.as_str(), "session ended"),
            }
            end
        }
        .instrument(span)
        .await
    }

    async fn serve(&mut self) -> SessionEnd {
        let closing = self.ctx.signaler.closing_token();
        loop {
            let read = tokio::select! {
                biased;
                read = self.conn.read_frame() => read,
                () = closing.cancelled() => {
                    info!("server shutting down, closing session");
                    let close = ControlFrame::Close(CloseReason::going_away("server shutting down"));
                    let _ = self.ctx.send_control(close).await;
                    return SessionEnd::Shutdown;
                }
            };

            let frame = match read {
                Ok(frame) => frame,
                Err(e) => return SessionEnd::Failed(SessionError::TransportRead(e)),
            };
            trace!(kind = %frame.kind(), len = frame.len(), "received frame");

            match frame {
                Frame::Close(reason) => {
                    info!("got client close, closing");
                    return SessionEnd::PeerClosed(reason);
                }
                Frame::Binary(data) => {
                    info!(len = data.len(), "echoing binary");
                    if let Err(e) = self.ctx.writer.write_frame(DataFrame::Binary(data)).await {
                        return SessionEnd::Failed(SessionError::TransportWrite(e));
                    }
                }
                Frame::Text(text) => {
                    debug!(len = text.len(), "got text");
                    if let Err(e) = command::handle_text(&self.ctx, &text).await {
                        if e.is_fatal() {
                            return SessionEnd::Failed(e);
                        }
                        warn!(error = %e, kind = e.error_kind(), "command failed");
                    }
                }
                Frame::Unknown(opcode) => {
                    let e = SessionError::ProtocolViolation(format!("opcode {opcode:#x}"));
                    warn!(error = %e, kind = e.error_kind(), "ignoring frame");
                }
                // Answered by `SessionControl` inside `read_frame`.
                Frame::Ping(_) | Frame::Pong(_) => {}
            }
        }
    }
}
