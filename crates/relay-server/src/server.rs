//! Server assembly: HTTP routes, WebSocket upgrade, and lifecycle.
//!
//! Authentication happens before the protocol upgrade: a request with a
//! missing or non-positive `user_id` is a 400, a missing or invalid token a
//! 401, and only then does the connection become a client session.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use relay_auth::SessionAuthenticator;
use relay_store::ChatStore;
use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::health::{HealthResponse, health_check};
use crate::hub::{Hub, HubHandle};
use crate::metrics::{install_recorder, render};
use crate::router::Router;
use crate::session::run_client_session;
use crate::shutdown;
use crate::stats::StatsSnapshot;

/// Fatal server startup or serve errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener could not be bound or the accept loop failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared per-request state.
#[derive(Clone)]
pub struct AppState {
    hub: HubHandle,
    auth: Arc<SessionAuthenticator>,
    config: Arc<RelayConfig>,
    metrics: PrometheusHandle,
    start_time: Instant,
}

/// The assembled relay server: hub loop, routes, shutdown coordination.
pub struct RelayServer {
    state: AppState,
    hub_task: tokio::task::JoinHandle<()>,
    shutdown: CancellationToken,
}

impl RelayServer {
    /// Build the server and start its hub loop.
    pub fn new(config: RelayConfig, store: ChatStore, auth: SessionAuthenticator) -> Self {
        let shutdown = CancellationToken::new();
        let config = Arc::new(config);
        let (hub, hub_handle) = Hub::new(Router::new(store), &config, shutdown.clone());
        let hub_task = tokio::spawn(hub.run());
        let state = AppState {
            hub: hub_handle,
            auth: Arc::new(auth),
            config,
            metrics: install_recorder(),
            start_time: Instant::now(),
        };
        Self {
            state,
            hub_task,
            shutdown,
        }
    }

    /// The hub's outbound callable surface.
    pub fn hub(&self) -> HubHandle {
        self.state.hub.clone()
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The route table, for serving or for in-process testing.
    pub fn app(&self) -> axum::Router {
        axum::Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/stats", get(stats_handler))
            .route("/metrics", get(metrics_handler))
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn listen(self) -> Result<(), ServerError> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until the shutdown token fires,
    /// then drain the hub loop.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        info!(%addr, "relay server listening");

        let app = self.app();
        let token = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(token.cancelled_owned())
            .await?;

        shutdown::drain(&self.shutdown, self.hub_task, shutdown::DRAIN_TIMEOUT).await;
        info!("relay server stopped");
        Ok(())
    }
}

#[derive(Deserialize)]
struct WsQuery {
    user_id: Option<i64>,
    token: Option<String>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let Some(user_id) = query.user_id.filter(|id| *id > 0) else {
        return (StatusCode::BAD_REQUEST, "user_id must be a positive integer").into_response();
    };
    let Some(token) = query.token else {
        return (StatusCode::UNAUTHORIZED, "missing session token").into_response();
    };

    match state.auth.validate(&token, user_id) {
        Ok(authenticated_id) => {
            let hub = state.hub.clone();
            let config = state.config.clone();
            ws.max_message_size(state.config.max_message_size)
                .on_upgrade(move |socket| run_client_session(socket, authenticated_id, hub, config))
                .into_response()
        }
        Err(e) => {
            warn!(user_id, error = %e, "websocket authentication rejected");
            (StatusCode::UNAUTHORIZED, "invalid session").into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health_check(
        state.start_time,
        state.hub.registry().connection_count(),
        state.hub.online_users().len(),
    ))
}

async fn stats_handler(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.hub.stats())
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    render(&state.metrics)
}
