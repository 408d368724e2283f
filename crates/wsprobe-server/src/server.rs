//! `ProbeServer`: axum HTTP + WebSocket listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::{Html, IntoResponse, Json};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wsprobe_core::Connection;

use crate::config::{Scheme, ServerConfig, SessionConfig};
use crate::error::ServerError;
use crate::health::{self, HealthResponse};
use crate::session::Session;
use crate::shutdown::ShutdownCoordinator;
use crate::tls;
use crate::websocket::split_socket;

/// Body served at `/`.
pub const HOME_PAGE: &str = "<h1> Home Page </h1>";

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub session_config: Arc<SessionConfig>,
    pub shutdown: Arc<ShutdownCoordinator>,
    pub start_time: Instant,
}

/// Build the router: `/`, `/ws` and `/health`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// The diagnostic server.
pub struct ProbeServer {
    config: ServerConfig,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl ProbeServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    pub fn router(&self) -> Router {
        build_router(AppState {
            session_config: Arc::new(self.config.session.clone()),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
        })
    }

    /// Bind and start serving in the background.
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        // Load TLS material before binding so a bad key never leaves a port open.
        let acceptor = self.config.tls.as_ref().map(tls::load_acceptor).transpose()?;

        let addr = self.config.listen.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let scheme = self.config.listen.scheme;

        let server = match acceptor {
            None => tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router)
                    .with_graceful_shutdown(token.cancelled_owned())
                    .await
                {
                    error!(error = %e, "server stopped with error");
                }
            }),
            Some(acceptor) => tokio::spawn(tls::serve(listener, acceptor, router, token)),
        };

        info!(%local_addr, %scheme, "wsprobe listening");

        Ok(ServerHandle {
            local_addr,
            scheme,
            shutdown: self.shutdown,
            server,
        })
    }
}

/// Handle to a running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    scheme: Scheme,
    shutdown: Arc<ShutdownCoordinator>,
    server: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `ws://` or `wss://` URL of the upgrade endpoint.
    pub fn ws_url(&self) -> String {
        format!("{}://{}/ws", self.scheme, self.local_addr)
    }

    pub fn active_sessions(&self) -> usize {
        self.shutdown.active_sessions()
    }

    /// Stop accepting, close every session and wait up to `timeout`.
    pub async fn shutdown(self, timeout: Option<Duration>) {
        info!("shutting down");
        self.shutdown
            .graceful_shutdown(vec![self.server], timeout)
            .await;
    }
}

/// GET /
async fn home_handler() -> Html<&'static str> {
    Html(HOME_PAGE)
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.shutdown.active_sessions(),
        state.shutdown.is_shutting_down(),
    ))
}

/// GET /ws. Any origin is accepted.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_failed_upgrade(|e| warn!(error = %e, "connection upgrade failed"))
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (source, sink) = split_socket(socket);
    let conn = Connection::new(source, Arc::new(sink));
    let session = Session::new(conn, state.session_config.clone(), &state.shutdown.token());
    debug!(session_id = %session.context().id, "connection upgraded");

    let end = state.shutdown.sessions().track_future(session.run()).await;
    debug!(end = end.as_str(), "session task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn make_server() -> ProbeServer {
        ProbeServer::new(ServerConfig::local(SessionConfig::default()))
    }

    async fn body_bytes(resp: axum::response::Response) -> axum::body::Bytes {
        axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap()
    }

    #[tokio::test]
    async fn home_page() {
        let resp = make_server()
            .router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(&body_bytes(resp).await[..], HOME_PAGE.as_bytes());
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let resp = make_server()
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let parsed: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["active_sessions"], 0);
    }

    #[tokio::test]
    async fn health_reports_shutdown() {
        let server = make_server();
        server.shutdown().shutdown();
        let resp = server
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(parsed["status"], "shutting_down");
    }

    #[tokio::test]
    async fn ws_without_upgrade_is_rejected() {
        let resp = make_server()
            .router()
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let resp = make_server()
            .router()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn start_binds_ephemeral_port() {
        let handle = make_server().start().await.unwrap();
        assert_ne!(handle.local_addr().port(), 0);
        assert!(handle.ws_url().starts_with("ws://127.0.0.1:"));
        assert!(handle.ws_url().ends_with("/ws"));
        handle.shutdown(Some(Duration::from_secs(1))).await;
    }

    #[tokio::test]
    async fn bad_tls_material_fails_before_binding() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::local(SessionConfig::default());
        config.listen.scheme = Scheme::Wss;
        config.tls = Some(crate::config::TlsFiles {
            cert: dir.path().join("cert.pem"),
            key: dir.path().join("key.pem"),
        });
        assert!(matches!(
            ProbeServer::new(config).start().await,
            Err(ServerError::Tls(_))
        ));
    }
}
