//! Background auto-ping task.
//!
//! Started by `start ping me`: writes a ping immediately, then one every half
//! ping interval, until the session closes, the client sends `stop ping me`,
//! or a write fails. At most one runs per session.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{Instrument, debug, info, warn};
use wsprobe_core::{CancelReason, ControlFrame, FrameWriter, TaskSignals, TransportError};

use crate::command::START_PING_ME;
use crate::session::SessionContext;

/// Why an auto-ping task stopped.
#[derive(Debug)]
pub enum PingExit {
    SessionClosed,
    Cancelled(CancelReason),
    WriteFailed(TransportError),
}

/// Start the auto-ping task for this session.
///
/// Returns `false` without spawning if one is already running or the session
/// is closing.
pub fn spawn(ctx: &SessionContext) -> bool {
    let Some(signals) = ctx.signaler.register_task() else {
        return false;
    };
    let writer = ctx.writer.clone();
    let period = ctx.config.ping_period();
    let control_timeout = ctx.config.control_timeout;
    let _ = ctx.tasks.spawn(
        async move {
            let _ = run(writer, signals, period, control_timeout).await;
        }
        .in_current_span(),
    );
    true
}

/// Ping loop. Cancellation is observed within one `period`.
pub async fn run(
    writer: FrameWriter,
    mut signals: TaskSignals,
    period: Duration,
    control_timeout: Duration,
) -> PingExit {
    let mut sent: u64 = 0;
    loop {
        let deadline = Instant::now() + control_timeout;
        if let Err(e) = writer
            .write_control_frame(ControlFrame::ping(START_PING_ME), deadline)
            .await
        {
            warn!(error = %e, kind = e.error_kind(), sent, "auto-ping write failed, stopping");
            return PingExit::WriteFailed(e);
        }
        sent += 1;
        debug!(sent, "auto-ping sent");

        tokio::select! {
            biased;
            () = signals.closing.cancelled() => {
                info!(sent, "session closing, auto-ping stopped");
                return PingExit::SessionClosed;
            }
            reason = signals.cancel.recv() => {
                return match reason {
                    Some(reason) => {
                        info!(%reason, sent, "auto-ping cancelled");
                        PingExit::Cancelled(reason)
                    }
                    None => {
                        info!(sent, "signaler dropped, auto-ping stopped");
                        PingExit::SessionClosed
                    }
                };
            }
            () = tokio::time::sleep(period) => {}
        }
    }
}
