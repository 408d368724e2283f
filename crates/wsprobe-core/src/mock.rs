//! In-memory transport for tests.
//!
//! [`scripted`] returns a [`FrameFeeder`] / [`ScriptedSource`] pair: frames
//! pushed into the feeder are read by the source in order, and dropping every
//! feeder ends the stream as if the peer went away. [`RecordingSink`] keeps
//! every write so tests can assert on exactly what a session sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::errors::TransportError;
use crate::frame::{CloseReason, ControlFrame, DataFrame, Frame};
use crate::transport::{FrameSink, FrameSource};

type FrameResult = Result<Frame, TransportError>;

/// Create a connected feeder/source pair.
pub fn scripted() -> (FrameFeeder, ScriptedSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FrameFeeder { tx }, ScriptedSource { rx })
}

/// Pushes frames (or read errors) into a [`ScriptedSource`].
#[derive(Clone, Debug)]
pub struct FrameFeeder {
    tx: mpsc::UnboundedSender<FrameResult>,
}

impl FrameFeeder {
    /// Queue a frame. Returns `false` if the source was dropped.
    pub fn frame(&self, frame: Frame) -> bool {
        self.tx.send(Ok(frame)).is_ok()
    }

    pub fn text(&self, text: &str) -> bool {
        self.frame(Frame::Text(text.to_owned()))
    }

    pub fn binary(&self, data: &[u8]) -> bool {
        self.frame(Frame::Binary(Bytes::copy_from_slice(data)))
    }

    pub fn close(&self, reason: Option<CloseReason>) -> bool {
        self.frame(Frame::Close(reason))
    }

    /// Queue a read failure.
    pub fn error(&self, err: TransportError) -> bool {
        self.tx.send(Err(err)).is_ok()
    }
}

/// Channel-fed [`FrameSource`].
#[derive(Debug)]
pub struct ScriptedSource {
    rx: mpsc::UnboundedReceiver<FrameResult>,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn next_frame(&mut self) -> Option<FrameResult> {
        self.rx.recv().await
    }
}

/// One write observed by a [`RecordingSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Written {
    Data(DataFrame),
    Control(ControlFrame),
    Closed,
}

/// [`FrameSink`] that records writes.
#[derive(Debug, Default)]
pub struct RecordingSink {
    written: Mutex<Vec<Written>>,
    fail_writes: AtomicBool,
    control_delay: Mutex<Option<Duration>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent data and control write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Stall each control write for `delay` before recording it.
    pub fn delay_control(&self, delay: Duration) {
        *self.control_delay.lock() = Some(delay);
    }

    pub fn written(&self) -> Vec<Written> {
        self.written.lock().clone()
    }

    pub fn data_frames(&self) -> Vec<DataFrame> {
        self.written
            .lock()
            .iter()
            .filter_map(|w| match w {
                Written::Data(frame) => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn control_frames(&self) -> Vec<ControlFrame> {
        self.written
            .lock()
            .iter()
            .filter_map(|w| match w {
                Written::Control(frame) => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of ping control frames written so far.
    pub fn ping_count(&self) -> usize {
        self.written
            .lock()
            .iter()
            .filter(|w| matches!(w, Written::Control(ControlFrame::Ping(_))))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.written.lock().contains(&Written::Closed)
    }

    fn check_failure(&self) -> Result<(), TransportError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Write("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_data(&self, frame: DataFrame) -> Result<(), TransportError> {
        self.check_failure()?;
        self.written.lock().push(Written::Data(frame));
        Ok(())
    }

    async fn send_control(&self, frame: ControlFrame) -> Result<(), TransportError> {
        let delay = *self.control_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failure()?;
        self.written.lock().push(Written::Control(frame));
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.written.lock().push(Written::Closed);
        Ok(())
    }
}
