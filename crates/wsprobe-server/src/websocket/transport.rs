//! Frame source and sink over an upgraded axum `WebSocket`.
//!
//! The socket is split; the write half sits behind a `tokio::sync::Mutex` so
//! the session loop and the auto-ping task never interleave writes.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use wsprobe_core::{
    CloseReason, ControlFrame, DataFrame, Frame, FrameSink, FrameSource, TransportError,
};

/// Split an upgraded socket into the two transport halves.
pub fn split_socket(socket: WebSocket) -> (WsFrameSource, WsFrameSink) {
    let (tx, rx) = socket.split();
    (
        WsFrameSource { stream: rx },
        WsFrameSink {
            sink: Mutex::new(tx),
        },
    )
}

/// Read half.
pub struct WsFrameSource {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        let message = self.stream.next().await?;
        Some(
            message
                .map(frame_from_message)
                .map_err(|e| TransportError::Read(e.to_string())),
        )
    }
}

/// Write half.
pub struct WsFrameSink {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsFrameSink {
    async fn send(&self, message: Message) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(message)
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_data(&self, frame: DataFrame) -> Result<(), TransportError> {
        self.send(message_from_data(frame)).await
    }

    async fn send_control(&self, frame: ControlFrame) -> Result<(), TransportError> {
        self.send(message_from_control(frame)).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }
}

pub(crate) fn frame_from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(data) => Frame::Binary(data),
        Message::Ping(data) => Frame::Ping(data),
        Message::Pong(data) => Frame::Pong(data),
        Message::Close(close) => Frame::Close(close.map(|c| CloseReason {
            code: c.code,
            reason: c.reason.as_str().to_owned(),
        })),
    }
}

pub(crate) fn message_from_data(frame: DataFrame) -> Message {
    match frame {
        DataFrame::Text(text) => Message::Text(text.into()),
        DataFrame::Binary(data) => Message::Binary(data),
    }
}

pub(crate) fn message_from_control(frame: ControlFrame) -> Message {
    match frame {
        ControlFrame::Ping(data) => Message::Ping(data),
        ControlFrame::Pong(data) => Message::Pong(data),
        ControlFrame::Close(reason) => Message::Close(Some(CloseFrame {
            code: reason.code,
            reason: reason.reason.into(),
        })),
    }
}
