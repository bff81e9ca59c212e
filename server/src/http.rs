//! Axum HTTP transport.
//!
//! - `GET /health`: liveness probe, plain-text `OK`, not gated.
//! - `POST /mcp`: JSON-RPC. The origin is the TCP peer address and the
//!   credential comes from `Authorization: Bearer`.
//!
//! Each `/mcp` request runs on the blocking thread pool: verification may
//! fetch a key set and handlers are synchronous.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, warn};

use warden_contracts::{envelope::Status, error::GateResult};

use crate::wire::{McpService, Reply};

/// Build the router with every endpoint.
pub fn build_router(service: Arc<McpService>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/mcp", post(handle_mcp))
        .with_state(service)
}

/// Bind `address` and serve until Ctrl-C.
pub async fn serve(address: &str, service: Arc<McpService>) -> GateResult<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(address = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        build_router(service).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            // Without a signal handler the server runs until killed.
            warn!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    }
}

/// GET /health
async fn handle_health() -> &'static str {
    "OK"
}

/// POST /mcp
async fn handle_mcp(
    State(service): State<Arc<McpService>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let origin = peer.ip().to_string();
    let credential = bearer_credential(&headers);

    let reply = tokio::task::spawn_blocking(move || {
        service.handle(Some(&origin), credential.as_deref(), &body)
    })
    .await;

    match reply {
        Ok(Reply::Rpc(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(Reply::Rejected { status, response }) => match status {
            Status::Forbidden => (StatusCode::FORBIDDEN, Json(response)).into_response(),
            _ => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(response),
            )
                .into_response(),
        },
        Ok(Reply::Accepted) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            error!(error = %e, "request task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// The token from `Authorization: Bearer <token>`. The scheme is matched
/// case-insensitively; any other scheme counts as no credential.
fn bearer_credential(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim().to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
