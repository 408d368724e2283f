//! Transport error types.

use std::time::Duration;

/// Failures surfaced by a [`FrameSource`](crate::FrameSource) or
/// [`FrameSink`](crate::FrameSink).
#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    /// Reading the next frame failed.
    #[error("read failed: {0}")]
    Read(String),
    /// Writing a frame failed.
    #[error("write failed: {0}")]
    Write(String),
    /// A control frame could not be written before its deadline.
    #[error("control frame write exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),
    /// The peer went away or the connection was already closed.
    #[error("connection closed")]
    Closed,
}

impl TransportError {
    /// Whether this error is the ordinary end of a connection rather than a fault.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Read(_) => "read",
            Self::Write(_) => "write",
            Self::DeadlineExceeded(_) => "deadline_exceeded",
            Self::Closed => "closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_is_not_a_fault() {
        assert!(TransportError::Closed.is_closed());
        assert!(!TransportError::Read("reset".into()).is_closed());
        assert!(!TransportError::DeadlineExceeded(Duration::from_secs(1)).is_closed());
    }

    #[test]
    fn error_kinds() {
        assert_eq!(TransportError::Read("x".into()).error_kind(), "read");
        assert_eq!(TransportError::Write("x".into()).error_kind(), "write");
        assert_eq!(
            TransportError::DeadlineExceeded(Duration::from_secs(10)).error_kind(),
            "deadline_exceeded"
        );
        assert_eq!(TransportError::Closed.error_kind(), "closed");
    }

    #[test]
    fn deadline_display_includes_duration() {
        let err = TransportError::DeadlineExceeded(Duration::from_secs(10));
        assert_eq!(err.to_string(), "control frame write exceeded deadline of 10s");
    }
}
