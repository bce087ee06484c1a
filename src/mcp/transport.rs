//! STDIO and HTTP bindings for the MCP bridge

use std::future::Future;

use anyhow::Context;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rmcp::{
    model::ProtocolVersion,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    },
    ServiceExt,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::bridge::{CobotMcpBridge, SERVER_NAME};
use super::prompts::PROMPTS;

/// Path of the streamable HTTP event channel
pub const EVENT_STREAM_PATH: &str = "/sse";

const REQUIRED_TOOLS: [&str; 2] = ["search", "fetch"];

/// Serve MCP on stdin/stdout until the client disconnects
pub async fn serve_stdio(bridge: CobotMcpBridge) -> anyhow::Result<()> {
    tracing::info!("serving MCP over stdio");
    let running = bridge
        .serve((tokio::io::stdin(), tokio::io::stdout()))
        .await
        .map_err(|e| anyhow::anyhow!("MCP server init error: {e}"))?;
    running
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;
    Ok(())
}

/// Serve MCP over HTTP on `listener` until `shutdown` resolves
pub async fn serve_http<F>(listener: TcpListener, bridge: CobotMcpBridge, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("listener has no local address")?;
    tracing::info!(%addr, "serving MCP over HTTP, event stream at {EVENT_STREAM_PATH}");
    axum::serve(listener, http_router(bridge))
        .with_graceful_shutdown(shutdown)
        .await
        .context("MCP HTTP server failed")
}

pub fn http_router(bridge: CobotMcpBridge) -> Router {
    let factory = bridge.clone();
    let mcp_service = StreamableHttpService::new(
        move || Ok(factory.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    Router::new()
        .route("/", get(root).post(root))
        .route("/health", get(health))
        .route("/mcp", get(discovery))
        .route("/.well-known/mcp", get(discovery))
        .nest_service(EVENT_STREAM_PATH, mcp_service)
        .fallback(fallback_handler)
        .with_state(bridge)
        .layer(middleware::from_fn(log_request_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn log_request_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    tracing::debug!("MCP HTTP: {} {}", method, uri);
    next.run(request).await
}

async fn fallback_handler(request: Request) -> impl IntoResponse {
    tracing::warn!("MCP HTTP: unmatched route {}", request.uri());
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found",
            "hint": format!("MCP endpoint is at {EVENT_STREAM_PATH}"),
        })),
    )
}

fn capabilities() -> Value {
    json!({
        "tools": true,
        "prompts": true,
        "resources": false,
        "logging": true,
    })
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Cobot MCP server",
        "version": env!("CARGO_PKG_VERSION"),
        "mcp_endpoint": EVENT_STREAM_PATH,
        "health_check": "/health",
        "specification": "/.well-known/mcp",
    }))
}

async fn discovery(State(bridge): State<CobotMcpBridge>) -> Json<Value> {
    let additional: Vec<&str> = bridge
        .dispatcher()
        .tool_names()
        .into_iter()
        .filter(|name| !REQUIRED_TOOLS.contains(name))
        .collect();
    Json(json!({
        "mcp_version": ProtocolVersion::LATEST,
        "server_name": SERVER_NAME,
        "server_version": env!("CARGO_PKG_VERSION"),
        "description": "Control a six-joint robot arm through its REST API",
        "endpoints": { "sse": EVENT_STREAM_PATH },
        "required_tools": REQUIRED_TOOLS,
        "additional_tools": additional,
        "prompts": PROMPTS.map(|p| p.name),
        "capabilities": capabilities(),
    }))
}

async fn health(State(bridge): State<CobotMcpBridge>) -> Response {
    match bridge.dispatcher().context().api.status().await {
        Ok(status) => {
            let state = if status.connected { "healthy" } else { "degraded" };
            Json(json!({
                "status": state,
                "transport": "http",
                "mcp_server": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "robot_connected": status.connected,
                "robot_moving": status.is_moving,
                "endpoints": { "sse": EVENT_STREAM_PATH, "health": "/health" },
                "capabilities": capabilities(),
            }))
            .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach the REST API");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "transport": "http",
                    "mcp_server": SERVER_NAME,
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}
