//! Per-session cancellation signals for background tasks.
//!
//! Each session owns one [`ControlSignaler`]. It carries two signals:
//!
//! | Signal | Primitive | Meaning |
//! |--------|-----------|---------|
//! | session closing | `CancellationToken` | terminal, seen by every task, never blocks the sender |
//! | cancel current task | capacity-1 `mpsc` | stop the one running task, with a reason |

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why a background task was asked to stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// The client sent `stop ping me`.
    CancelPing,
}

impl CancelReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CancelPing => "cancel ping",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signals handed to a background task when it is registered.
#[derive(Debug)]
pub struct TaskSignals {
    /// Cancelled once the owning session ends.
    pub closing: CancellationToken,
    /// Receives at most one cancellation reason.
    pub cancel: mpsc::Receiver<CancelReason>,
}

/// Session-scoped signal pair shared by the session loop and its background task.
#[derive(Clone, Debug)]
pub struct ControlSignaler {
    closing: CancellationToken,
    current_task: Arc<Mutex<Option<mpsc::Sender<CancelReason>>>>,
}

impl ControlSignaler {
    pub fn new() -> Self {
        Self::from_token(CancellationToken::new())
    }

    /// Signaler whose closing signal also fires when `parent` is cancelled
    /// (server shutdown).
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self::from_token(parent.child_token())
    }

    fn from_token(closing: CancellationToken) -> Self {
        Self {
            closing,
            current_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Signal that the session is ending. Idempotent and never blocks.
    pub fn close(&self) {
        self.closing.cancel();
    }

    pub fn is_closing(&self) -> bool {
        self.closing.is_cancelled()
    }

    pub fn closing_token(&self) -> CancellationToken {
        self.closing.clone()
    }

    /// Guard that signals closing when dropped, including during unwinding.
    pub fn close_on_drop(&self) -> DropGuard {
        self.closing.clone().drop_guard()
    }

    /// Register a new background task.
    ///
    /// Returns `None` while another task is still alive, or once the session
    /// is closing.
    pub fn register_task(&self) -> Option<TaskSignals> {
        if self.is_closing() {
            return None;
        }
        let mut slot = self.current_task.lock();
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return None;
        }
        let (tx, rx) = mpsc::channel(1);
        *slot = Some(tx);
        Some(TaskSignals {
            closing: self.closing.clone(),
            cancel: rx,
        })
    }

    /// Ask the current task to stop. Returns `false` if no live task received it.
    pub fn cancel_task(&self, reason: CancelReason) -> bool {
        let Some(tx) = self.current_task.lock().take() else {
            return false;
        };
        tx.try_send(reason).is_ok()
    }

    /// Whether a registered task is still holding its signals.
    pub fn has_active_task(&self) -> bool {
        self.current_task
            .lock()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

impl Default for ControlSignaler {
    fn default() -> Self {
        Self::new()
    }
}
