//! Endpoint listeners and the HTTP discovery service.
//!
//! Three loopback ports: the CDP port (WebSocket upgrades plus the HTTP
//! discovery routes on the same listener), the native port, and the agent
//! attach port. Every accepted client socket gets a fresh registry id, a
//! reader loop feeding the router, and a dedicated writer task drained from
//! the connection's channel.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Json},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::info;

use cdpmux_cdp::discovery::BrowserVersion;

use crate::bridge::BridgeState;
use crate::error::BridgeError;
use crate::link;
use crate::registry::ClientKind;
use crate::ring::LogLevel;
use crate::router;

/// Bind a loopback listener for one of the bridge's endpoints.
pub async fn bind(endpoint: &'static str, port: u16) -> Result<TcpListener, BridgeError> {
    TcpListener::bind(("127.0.0.1", port))
        .await
        .map_err(|source| BridgeError::Bind {
            endpoint,
            port,
            source,
        })
}

/// Router for the CDP port: discovery HTTP plus client WebSocket upgrades.
///
/// CORS is permissive; the listener is loopback-only.
pub fn cdp_router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/json/version", get(json_version))
        .route("/json", get(json_list))
        .route("/json/list", get(json_list))
        .route("/logs", get(logs))
        .route("/", get(cdp_ws))
        .route("/devtools/browser/{target_id}", get(cdp_ws_with_target))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Router for the native envelope port.
pub fn native_router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/", get(native_ws))
        .fallback(get(native_ws))
        .with_state(state)
}

/// Router for the agent attach port.
pub fn agent_router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/", get(agent_ws))
        .fallback(get(agent_ws))
        .with_state(state)
}

async fn json_version(State(state): State<Arc<BridgeState>>) -> Json<BrowserVersion> {
    let mut version = state.browser.cached_version().unwrap_or_else(|| BrowserVersion {
        browser: Some(format!("cdpmux/{}", env!("CARGO_PKG_VERSION"))),
        protocol_version: Some("1.3".to_string()),
        user_agent: Some("cdpmux".to_string()),
        ..BrowserVersion::default()
    });
    // Clients must dial the bridge, never the browser directly.
    version.web_socket_debugger_url = Some(state.config.advertised_ws_url(&state.target_id));
    Json(version)
}

async fn json_list(State(state): State<Arc<BridgeState>>) -> Json<serde_json::Value> {
    let ws_url = state.config.advertised_ws_url(&state.target_id);
    Json(json!([{
        "description": "",
        "devtoolsFrontendUrl": format!(
            "/devtools/inspector.html?ws={}",
            ws_url.trim_start_matches("ws://")
        ),
        "id": state.target_id,
        "title": "cdpmux",
        "type": "page",
        "url": "about:blank",
        "webSocketDebuggerUrl": ws_url,
    }]))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
    level: Option<String>,
}

async fn logs(
    Query(query): Query<LogsQuery>,
    State(state): State<Arc<BridgeState>>,
) -> Json<serde_json::Value> {
    let min_level = query.level.as_deref().and_then(|s| s.parse().ok());
    let entries = state.ring.snapshot(query.limit, min_level);
    Json(json!({"count": entries.len(), "logs": entries}))
}

async fn cdp_ws(ws: WebSocketUpgrade, State(state): State<Arc<BridgeState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_client_socket(socket, state, ClientKind::Cdp))
}

async fn cdp_ws_with_target(
    ws: WebSocketUpgrade,
    Path(_target_id): Path<String>,
    State(state): State<Arc<BridgeState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_client_socket(socket, state, ClientKind::Cdp))
}

async fn native_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BridgeState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_client_socket(socket, state, ClientKind::Native))
}

async fn agent_ws(ws: WebSocketUpgrade, State(state): State<Arc<BridgeState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| link::agent::attach_inbound(state, socket))
}

/// Serve one accepted client socket until it closes.
async fn handle_client_socket(socket: WebSocket, state: Arc<BridgeState>, kind: ClientKind) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(256);
    let conn = state.registry.register(kind, tx);

    let label = match kind {
        ClientKind::Cdp => "CDP",
        ClientKind::Native => "native",
    };
    info!(conn, "{label} client connected");
    state
        .ring
        .record(LogLevel::Info, format!("{label} client {conn} connected"));

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => match kind {
                ClientKind::Cdp => router::on_client_message(&state, conn, &text).await,
                ClientKind::Native => router::on_native_message(&state, conn, &text).await,
            },
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    router::on_client_closed(&state, kind, conn).await;
    writer.abort();
}
