//! HTTP transport for the MCP server.
//!
//! Exposes `POST /mcp` for JSON-RPC and `GET /health`. The caller identity
//! is read per request from the `x-trellis-scopes`, `x-trellis-roles`, and
//! `x-trellis-subject` headers (comma-separated values); verifying the
//! credential that produced them is an upstream concern.

use crate::authz::CallerIdentity;
use crate::error::McpError;
use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One in-flight request: the parsed message, the caller, and the reply
/// channel.
pub type TransportRequest = (JsonRpcRequest, CallerIdentity, mpsc::Sender<JsonRpcResponse>);

/// Shared state for the HTTP handlers.
pub struct HttpTransportState {
    request_tx: mpsc::Sender<TransportRequest>,
}

impl HttpTransportState {
    /// Create transport state around the server's request channel.
    pub fn new(request_tx: mpsc::Sender<TransportRequest>) -> Self {
        Self { request_tx }
    }
}

/// Build the MCP router.
pub fn create_router(state: Arc<HttpTransportState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp_post))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Extract the caller identity from request headers.
fn caller_from_headers(headers: &HeaderMap) -> CallerIdentity {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    CallerIdentity::from_header_values(
        header("x-trellis-scopes"),
        header("x-trellis-roles"),
        header("x-trellis-subject"),
    )
}

async fn handle_mcp_post(
    State(state): State<Arc<HttpTransportState>>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let caller = caller_from_headers(&headers);
    let (response_tx, mut response_rx) = mpsc::channel(1);

    if state
        .request_tx
        .send((request, caller, response_tx))
        .await
        .is_err()
    {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(JsonRpcResponse::error(None, -32603, "MCP server unavailable")),
        );
    }

    match response_rx.recv().await {
        Some(response) => (StatusCode::OK, Json(response)),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(JsonRpcResponse::error(
                None,
                -32603,
                "No response from MCP server",
            )),
        ),
    }
}

async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "trellis",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// The HTTP listener for the MCP transport.
pub struct HttpServer {
    bind_address: String,
    state: Arc<HttpTransportState>,
}

impl HttpServer {
    /// Create a server bound to `bind_address` once run.
    pub fn new(bind_address: String, request_tx: mpsc::Sender<TransportRequest>) -> Self {
        Self {
            bind_address,
            state: Arc::new(HttpTransportState::new(request_tx)),
        }
    }

    /// Bind and serve until the process exits.
    pub async fn run(self) -> Result<(), McpError> {
        let app = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(&self.bind_address)
            .await
            .map_err(|e| {
                McpError::StartupFailed(format!("failed to bind {}: {e}", self.bind_address))
            })?;

        tracing::info!(address = %self.bind_address, "MCP HTTP transport listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| McpError::Internal(e.into()))?;

        Ok(())
    }
}
