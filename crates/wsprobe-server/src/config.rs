//! Validated server configuration.
//!
//! [`ServerConfig`] is built from [`ServerSettings`] and is what the listener
//! and every session actually run with.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use wsprobe_settings::ServerSettings;

use crate::error::ServerError;

/// Listener scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Ws,
    Wss,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `ws://host:port` or `wss://host:port`.
///
/// An empty host binds every interface. A bare `host:port` is plain `ws`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenUrl {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl ListenUrl {
    /// Address string handed to `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        let host = if self.host.is_empty() {
            "0.0.0.0"
        } else {
            self.host.as_str()
        };
        format!("{host}:{}", self.port)
    }
}

impl fmt::Display for ListenUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl FromStr for ListenUrl {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ServerError::InvalidListenUrl {
            url: s.to_owned(),
            reason: reason.to_owned(),
        };

        let trimmed = s.trim();
        let (scheme, rest) = match trimmed.split_once("://") {
            Some(("ws", rest)) => (Scheme::Ws, rest),
            Some(("wss", rest)) => (Scheme::Wss, rest),
            Some(_) => return Err(invalid("scheme must be ws or wss")),
            None => (Scheme::Ws, trimmed),
        };

        let authority = rest.trim_end_matches('/');
        if authority.contains('/') {
            return Err(invalid("paths are not supported"));
        }
        let Some((host, port)) = authority.rsplit_once(':') else {
            return Err(invalid("missing port"));
        };
        let port = port
            .parse::<u16>()
            .map_err(|_| invalid("port must be a number between 0 and 65535"))?;

        Ok(Self {
            scheme,
            host: host.to_owned(),
            port,
        })
    }
}

/// PEM files for a `wss://` listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Per-session settings shared by every connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Directory `send me file://` requests resolve under.
    pub file_root: PathBuf,
    /// The auto-ping task fires every half of this.
    pub ping_interval: Duration,
    /// Deadline for each control-frame write.
    pub control_timeout: Duration,
    pub max_file_bytes: Option<u64>,
}

impl SessionConfig {
    pub fn ping_period(&self) -> Duration {
        self.ping_interval / 2
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file_root: PathBuf::from("/tmp"),
            ping_interval: Duration::from_secs(5),
            control_timeout: Duration::from_secs(10),
            max_file_bytes: None,
        }
    }
}

/// Complete listener configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: ListenUrl,
    /// Present exactly when `listen.scheme` is `wss`.
    pub tls: Option<TlsFiles>,
    pub session: SessionConfig,
}

impl ServerConfig {
    /// Plain listener on `127.0.0.1` with an OS-assigned port.
    pub fn local(session: SessionConfig) -> Self {
        Self {
            listen: ListenUrl {
                scheme: Scheme::Ws,
                host: "127.0.0.1".into(),
                port: 0,
            },
            tls: None,
            session,
        }
    }
}

impl TryFrom<&ServerSettings> for ServerConfig {
    type Error = ServerError;

    fn try_from(settings: &ServerSettings) -> Result<Self, Self::Error> {
        let listen: ListenUrl = settings.serve.parse()?;

        let non_empty = |v: &Option<String>| v.as_deref().filter(|s| !s.trim().is_empty()).map(PathBuf::from);
        let tls = match listen.scheme {
            Scheme::Ws => None,
            Scheme::Wss => match (non_empty(&settings.cert), non_empty(&settings.pkey)) {
                (Some(cert), Some(key)) => Some(TlsFiles { cert, key }),
                _ => return Err(ServerError::MissingTlsMaterial),
            },
        };

        Ok(Self {
            listen,
            tls,
            session: SessionConfig {
                file_root: PathBuf::from(&settings.file_root),
                ping_interval: settings.ping_interval(),
                control_timeout: settings.control_timeout(),
                max_file_bytes: settings.max_file_bytes,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn default_serve_binds_all_interfaces() {
        let url: ListenUrl = "ws://:8080".parse().unwrap();
        assert_eq!(url.scheme, Scheme::Ws);
        assert_eq!(url.host, "");
        assert_eq!(url.port, 8080);
        assert_eq!(url.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn wss_with_host() {
        let url: ListenUrl = "wss://127.0.0.1:8443".parse().unwrap();
        assert_eq!(url.scheme, Scheme::Wss);
        assert_eq!(url.bind_addr(), "127.0.0.1:8443");
        assert_eq!(url.to_string(), "wss://127.0.0.1:8443");
    }

    #[test]
    fn bare_host_port_is_ws() {
        let url: ListenUrl = "localhost:9000".parse().unwrap();
        assert_eq!(url.scheme, Scheme::Ws);
        assert_eq!(url.bind_addr(), "localhost:9000");
    }

    #[test]
    fn ipv6_host_keeps_brackets() {
        let url: ListenUrl = "ws://[::1]:9000".parse().unwrap();
        assert_eq!(url.host, "[::1]");
        assert_eq!(url.bind_addr(), "[::1]:9000");
    }

    #[test]
    fn trailing_slash_allowed() {
        let url: ListenUrl = "ws://:8080/".parse().unwrap();
        assert_eq!(url.port, 8080);
    }

    #[test]
    fn rejects_bad_urls() {
        for bad in ["http://:8080", "ws://:notaport", "ws://host", "ws://:8080/ws", "ws://:70000"] {
            assert_matches!(
                bad.parse::<ListenUrl>(),
                Err(ServerError::InvalidListenUrl { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn settings_defaults_convert() {
        let config = ServerConfig::try_from(&ServerSettings::default()).unwrap();
        assert_eq!(config.listen.port, 8080);
        assert!(config.tls.is_none());
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.session.ping_period(), Duration::from_millis(2500));
    }

    #[test]
    fn wss_requires_cert_and_key() {
        let mut settings = ServerSettings {
            serve: "wss://:8443".into(),
            ..ServerSettings::default()
        };
        assert_matches!(
            ServerConfig::try_from(&settings),
            Err(ServerError::MissingTlsMaterial)
        );

        settings.cert = Some("cert.pem".into());
        settings.pkey = Some("  ".into());
        assert_matches!(
            ServerConfig::try_from(&settings),
            Err(ServerError::MissingTlsMaterial)
        );

        settings.pkey = Some("key.pem".into());
        let config = ServerConfig::try_from(&settings).unwrap();
        assert_eq!(
            config.tls,
            Some(TlsFiles {
                cert: "cert.pem".into(),
                key: "key.pem".into(),
            })
        );
    }

    #[test]
    fn ws_ignores_tls_files() {
        let settings = ServerSettings {
            cert: Some("cert.pem".into()),
            pkey: Some("key.pem".into()),
            ..ServerSettings::default()
        };
        assert!(ServerConfig::try_from(&settings).unwrap().tls.is_none());
    }

    #[test]
    fn session_values_carried_over() {
        let settings = ServerSettings {
            file_root: "/srv/files".into(),
            ping_interval_ms: 2_000,
            control_timeout_ms: 500,
            max_file_bytes: Some(64),
            ..ServerSettings::default()
        };
        let session = ServerConfig::try_from(&settings).unwrap().session;
        assert_eq!(session.file_root, PathBuf::from("/srv/files"));
        assert_eq!(session.ping_period(), Duration::from_secs(1));
        assert_eq!(session.control_timeout, Duration::from_millis(500));
        assert_eq!(session.max_file_bytes, Some(64));
    }
}
