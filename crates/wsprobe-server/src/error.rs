//! Session and server error types.

use std::path::PathBuf;

use wsprobe_core::TransportError;

/// Failures raised while serving one connection.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Reading from the transport failed.
    #[error("transport read failed: {0}")]
    TransportRead(#[source] TransportError),

    /// Writing to the transport failed, including a missed control deadline.
    #[error("transport write failed: {0}")]
    TransportWrite(#[source] TransportError),

    /// A file request named a path outside the file root.
    #[error("requested path escapes the file root: {requested}")]
    PathTraversal { requested: String },

    /// Resolving or reading a requested file failed.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A requested file exceeds the configured size limit.
    #[error("{} is {size} bytes, limit is {limit}", .path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// A frame type the session does not handle.
    #[error("unsupported frame: {0}")]
    ProtocolViolation(String),
}

impl SessionError {
    /// Whether the session must end after this error.
    ///
    /// Everything except [`SessionError::ProtocolViolation`] is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ProtocolViolation(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::TransportRead(_) => "transport_read",
            Self::TransportWrite(_) => "transport_write",
            Self::PathTraversal { .. } => "path_traversal",
            Self::Io { .. } => "io",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::ProtocolViolation(_) => "protocol_violation",
        }
    }
}

/// Failures starting or configuring the listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid listen URL '{url}': {reason}")]
    InvalidListenUrl { url: String, reason: String },

    #[error("wss:// requires both a certificate and a private key")]
    MissingTlsMaterial,

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
