//! `send me file://` handling.
//!
//! Requests resolve strictly under the configured file root. Any `..` in the
//! request, or a resolved path outside the root (a symlink pointing out, for
//! instance), is rejected with a `close on read` close frame.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use wsprobe_core::{CloseReason, ControlFrame, DataFrame};

use crate::error::SessionError;
use crate::session::SessionContext;

/// Close-frame payload sent when a request escapes the root.
pub const CLOSE_ON_READ: &str = "close on read";

/// Send the requested file as one binary frame.
pub async fn send_file(ctx: &SessionContext, requested: &str) -> Result<(), SessionError> {
    info!(requested, root = %ctx.config.file_root.display(), "file requested");

    let path = match resolve_under_root(&ctx.config.file_root, requested).await {
        Ok(path) => path,
        Err(err @ SessionError::PathTraversal { .. }) => {
            warn!(requested, "refusing file outside root");
            let close = ControlFrame::Close(CloseReason::policy(CLOSE_ON_READ));
            if let Err(e) = ctx.send_control(close).await {
                warn!(error = %e, "failed to send close after rejected file request");
            }
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    if let Some(limit) = ctx.config.max_file_bytes {
        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|source| SessionError::Io {
                path: path.clone(),
                source,
            })?
            .len();
        if size > limit {
            return Err(SessionError::FileTooLarge { path, size, limit });
        }
    }

    debug!(path = %path.display(), "reading file");
    let contents = tokio::fs::read(&path)
        .await
        .map_err(|source| SessionError::Io {
            path: path.clone(),
            source,
        })?;

    let len = contents.len();
    ctx.writer
        .write_frame(DataFrame::Binary(contents.into()))
        .await
        .map_err(SessionError::TransportWrite)?;
    info!(path = %path.display(), len, "file sent");
    Ok(())
}

/// Resolve `requested` to a canonical path inside `root`.
///
/// Surrounding whitespace and leading slashes are ignored, so
/// `send me file:///notes.txt` names `<root>/notes.txt`.
pub async fn resolve_under_root(root: &Path, requested: &str) -> Result<PathBuf, SessionError> {
    let traversal = || SessionError::PathTraversal {
        requested: requested.to_owned(),
    };

    let trimmed = requested.trim();
    if trimmed.contains("..") {
        return Err(traversal());
    }
    let relative = trimmed.trim_start_matches('/');

    let root = tokio::fs::canonicalize(root)
        .await
        .map_err(|source| SessionError::Io {
            path: root.to_path_buf(),
            source,
        })?;
    let candidate = root.join(relative);
    let resolved = tokio::fs::canonicalize(&candidate)
        .await
        .map_err(|source| SessionError::Io {
            path: candidate,
            source,
        })?;

    if !resolved.starts_with(&root) {
        return Err(traversal());
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::tests::context;
    use assert_matches::assert_matches;
    use bytes::Bytes;
    use wsprobe_core::mock::Written;

    fn config_for(root: &Path) -> SessionConfig {
        SessionConfig {
            file_root: root.to_path_buf(),
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn sends_file_contents_as_binary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("notes")).unwrap();
        std::fs::write(dir.path().join("notes/a.txt"), b"\x00hello\xff").unwrap();

        let (ctx, sink) = context(config_for(dir.path()));
        send_file(&ctx, "notes/a.txt").await.unwrap();

        assert_eq!(
            sink.written(),
            vec![Written::Data(DataFrame::Binary(Bytes::from_static(
                b"\x00hello\xff"
            )))]
        );
    }

    #[tokio::test]
    async fn leading_slash_and_whitespace_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"abc").unwrap();

        let (ctx, sink) = context(config_for(dir.path()));
        send_file(&ctx, " /a.txt\n").await.unwrap();
        assert_eq!(sink.data_frames().len(), 1);
    }

    #[tokio::test]
    async fn dotdot_is_rejected_with_close() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, sink) = context(config_for(dir.path()));

        let err = send_file(&ctx, "secrets/../../etc/passwd").await.unwrap_err();
        assert_matches!(err, SessionError::PathTraversal { ref requested } if requested == "secrets/../../etc/passwd");
        assert_eq!(
            sink.written(),
            vec![Written::Control(ControlFrame::Close(CloseReason::policy(
                "close on read"
            )))]
        );
    }

    #[tokio::test]
    async fn dotdot_anywhere_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a..b"), b"x").unwrap();
        let (ctx, sink) = context(config_for(dir.path()));

        assert_matches!(
            send_file(&ctx, "a..b").await,
            Err(SessionError::PathTraversal { .. })
        );
        assert!(sink.data_frames().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_out_of_root_is_rejected() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret"), b"top secret").unwrap();
        let root = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret"), root.path().join("link"))
            .unwrap();

        let (ctx, sink) = context(config_for(root.path()));
        assert_matches!(
            send_file(&ctx, "link").await,
            Err(SessionError::PathTraversal { .. })
        );
        assert!(sink.data_frames().is_empty());
        assert_eq!(sink.control_frames().len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_inside_root_is_followed() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("real"), b"data").unwrap();
        std::os::unix::fs::symlink(root.path().join("real"), root.path().join("alias")).unwrap();

        let (ctx, sink) = context(config_for(root.path()));
        send_file(&ctx, "alias").await.unwrap();
        assert_eq!(
            sink.data_frames(),
            vec![DataFrame::Binary(Bytes::from_static(b"data"))]
        );
    }

    #[tokio::test]
    async fn missing_file_is_io_error_without_writes() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, sink) = context(config_for(dir.path()));

        assert_matches!(
            send_file(&ctx, "absent.txt").await,
            Err(SessionError::Io { .. })
        );
        assert!(sink.written().is_empty());
    }

    #[tokio::test]
    async fn directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _sink) = context(config_for(dir.path()));
        assert_matches!(send_file(&ctx, "").await, Err(SessionError::Io { .. }));
    }

    #[tokio::test]
    async fn size_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.bin"), vec![7u8; 64]).unwrap();
        std::fs::write(dir.path().join("small.bin"), vec![7u8; 8]).unwrap();

        let config = SessionConfig {
            max_file_bytes: Some(16),
            ..config_for(dir.path())
        };
        let (ctx, sink) = context(config);

        assert_matches!(
            send_file(&ctx, "big.bin").await,
            Err(SessionError::FileTooLarge { size: 64, limit: 16, .. })
        );
        send_file(&ctx, "small.bin").await.unwrap();
        assert_eq!(sink.data_frames().len(), 1);
    }

    #[tokio::test]
    async fn resolve_returns_canonical_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f"), b"").unwrap();
        let resolved = resolve_under_root(dir.path(), "./f").await.unwrap();
        assert_eq!(resolved, std::fs::canonicalize(dir.path().join("f")).unwrap());
    }
}
