//! Frame model.
//!
//! Reads produce a [`Frame`]. Writes are split into application data
//! ([`DataFrame`]) and protocol control frames ([`ControlFrame`]) because only
//! the latter carry a write deadline.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Normal closure status code (RFC 6455 §7.4.1).
pub const CLOSE_NORMAL: u16 = 1000;

/// Going-away status code, sent when the server shuts down.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Policy violation status code (RFC 6455 §7.4.1).
pub const CLOSE_POLICY: u16 = 1008;

/// Status code and reason text carried by a close frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    /// Close with status 1000.
    pub fn normal(reason: impl Into<String>) -> Self {
        Self {
            code: CLOSE_NORMAL,
            reason: reason.into(),
        }
    }

    /// Close with status 1001.
    pub fn going_away(reason: impl Into<String>) -> Self {
        Self {
            code: CLOSE_GOING_AWAY,
            reason: reason.into(),
        }
    }

    /// Close with status 1008.
    pub fn policy(reason: impl Into<String>) -> Self {
        Self {
            code: CLOSE_POLICY,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason)
    }
}

/// A frame read from the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<CloseReason>),
    /// A frame the transport could not map to a known type.
    Unknown(u8),
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Text(_) => FrameKind::Text,
            Self::Binary(_) => FrameKind::Binary,
            Self::Ping(_) => FrameKind::Ping,
            Self::Pong(_) => FrameKind::Pong,
            Self::Close(_) => FrameKind::Close,
            Self::Unknown(_) => FrameKind::Unknown,
        }
    }

    /// Payload length in bytes (close frames count their reason text).
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) | Self::Ping(data) | Self::Pong(data) => data.len(),
            Self::Close(reason) => reason.as_ref().map_or(0, |r| r.reason.len()),
            Self::Unknown(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Frame type tag, used for logging and dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Text,
    Binary,
    Ping,
    Pong,
    Close,
    Unknown,
}

impl FrameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Close => "close",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_control(self) -> bool {
        matches!(self, Self::Ping | Self::Pong | Self::Close)
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application data written to the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataFrame {
    Text(String),
    Binary(Bytes),
}

impl DataFrame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Text(_) => FrameKind::Text,
            Self::Binary(_) => FrameKind::Binary,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Protocol control frame written to the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlFrame {
    Ping(Bytes),
    Pong(Bytes),
    Close(CloseReason),
}

impl ControlFrame {
    /// Ping carrying a static text payload.
    pub fn ping(payload: &'static str) -> Self {
        Self::Ping(Bytes::from_static(payload.as_bytes()))
    }

    /// Pong carrying a static text payload.
    pub fn pong(payload: &'static str) -> Self {
        Self::Pong(Bytes::from_static(payload.as_bytes()))
    }

    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Ping(_) => FrameKind::Ping,
            Self::Pong(_) => FrameKind::Pong,
            Self::Close(_) => FrameKind::Close,
        }
    }

    /// Payload as lossy UTF-8, for logging.
    pub fn payload_text(&self) -> String {
        match self {
            Self::Ping(data) | Self::Pong(data) => String::from_utf8_lossy(data).into_owned(),
            Self::Close(reason) => reason.reason.clone(),
        }
    }
}
