//! Text command protocol.
//!
//! Every incoming text frame is parsed into exactly one [`Command`]. Matching
//! is exact and case-sensitive; anything that is not a command is echoed.

use tracing::{debug, info};
use wsprobe_core::{CancelReason, CloseReason, ControlFrame, DataFrame};

use crate::auto_ping;
use crate::error::SessionError;
use crate::file_send;
use crate::session::SessionContext;

pub const PING_ME: &str = "ping me";
pub const PONG_ME: &str = "pong me";
pub const START_PING_ME: &str = "start ping me";
pub const STOP_PING_ME: &str = "stop ping me";
pub const DISCONNECT_ME: &str = "disconnect me";
pub const SEND_ME_FILE_PREFIX: &str = "send me file://";

/// One parsed text frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    PingMe,
    PongMe,
    StartPing,
    StopPing,
    DisconnectMe,
    /// Path requested after the `send me file://` prefix.
    SendFile(&'a str),
    /// Anything else, echoed back verbatim.
    Echo(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(text: &'a str) -> Self {
        match text {
            PING_ME => Self::PingMe,
            PONG_ME => Self::PongMe,
            START_PING_ME => Self::StartPing,
            STOP_PING_ME => Self::StopPing,
            DISCONNECT_ME => Self::DisconnectMe,
            _ => match text.strip_prefix(SEND_ME_FILE_PREFIX) {
                Some(path) => Self::SendFile(path),
                None => Self::Echo(text),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PingMe => "ping_me",
            Self::PongMe => "pong_me",
            Self::StartPing => "start_ping",
            Self::StopPing => "stop_ping",
            Self::DisconnectMe => "disconnect_me",
            Self::SendFile(_) => "send_file",
            Self::Echo(_) => "echo",
        }
    }

    /// Run the command against one session.
    pub async fn execute(self, ctx: &SessionContext) -> Result<(), SessionError> {
        debug!(command = self.name(), "executing command");
        match self {
            Self::PingMe => ctx.send_control(ControlFrame::ping(PING_ME)).await,
            Self::PongMe => ctx.send_control(ControlFrame::pong(PONG_ME)).await,
            Self::DisconnectMe => {
                ctx.send_control(ControlFrame::Close(CloseReason::normal(DISCONNECT_ME)))
                    .await
            }
            Self::StartPing => {
                if auto_ping::spawn(ctx) {
                    info!("auto-ping started");
                } else {
                    info!("auto-ping already running, ignoring start");
                }
                Ok(())
            }
            Self::StopPing => {
                if ctx.signaler.cancel_task(CancelReason::CancelPing) {
                    info!("auto-ping cancellation sent");
                } else {
                    info!("no auto-ping running, ignoring stop");
                }
                Ok(())
            }
            Self::SendFile(path) => file_send::send_file(ctx, path).await,
            Self::Echo(text) => {
                debug!(len = text.len(), "echoing text");
                ctx.writer
                    .write_frame(DataFrame::Text(text.to_owned()))
                    .await
                    .map_err(SessionError::TransportWrite)
            }
        }
    }
}

/// Parse and execute one text payload.
pub async fn handle_text(ctx: &SessionContext, text: &str) -> Result<(), SessionError> {
    Command::parse(text).execute(ctx).await
}
