//! The message state machine.
//!
//! Four inbound sources drive this module: CDP clients, native clients, the
//! agent link, and the browser link. Every egress frame to a CDP client is
//! either serialized from a shape that cannot violate the response/event
//! disjointness, or repaired before transmission. An unroutable or
//! unrepairable message is dropped; emitting it would crash the client's
//! assertion layer.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use cdpmux_cdp::{CdpEvent, CdpMessage, CdpResponse};

use crate::bridge::BridgeState;
use crate::classify::Classification;
use crate::correlate::{AgentOrigin, PendingNotice};
use crate::envelope::{AgentResponse, CdpEnvelope, FromAgent, ToAgent, id_key};
use crate::registry::{ClientKind, ConnectionId};
use crate::ring::LogLevel;

/// JSON-RPC error code for a malformed request.
pub const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC error code for a method neither backend handles.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC error code for a failed forward (browser link down).
pub const INTERNAL_ERROR: i64 = -32603;
/// JSON-RPC server error code (agent unavailable, superseded, timeout).
pub const SERVER_ERROR: i64 = -32000;

const AGENT_UNAVAILABLE_MSG: &str = "Agent not connected";
const BACKEND_UNAVAILABLE_MSG: &str = "CDP forwarding failed";
const SUPERSEDED_MSG: &str = "superseded by a newer request with the same id";
const TIMEOUT_MSG: &str = "timeout";

/// Handle one frame from a CDP client.
pub async fn on_client_message(state: &Arc<BridgeState>, conn: ConnectionId, text: &str) {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            state.ring.record(
                LogLevel::Warn,
                format!("client {conn}: unparseable frame dropped: {e}"),
            );
            return;
        }
    };

    let id = value.get("id").and_then(Value::as_u64);
    let method = value
        .get("method")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    let (Some(id), Some(method)) = (id, method) else {
        // Recoverable only if the client gave us an id to answer on; the id
        // is echoed back verbatim, numeric or not.
        if let Some(raw_id) = value.get("id").cloned() {
            let reason = if id.is_none() {
                "invalid request: id must be a number"
            } else {
                "invalid request: method must be a non-empty string"
            };
            send_raw_error(state, conn, raw_id, INVALID_REQUEST, reason).await;
        } else {
            state.ring.record(
                LogLevel::Warn,
                format!("client {conn}: request without id dropped"),
            );
        }
        return;
    };

    let session_id = value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string);

    match state.policy.classify(&method) {
        Classification::Browser => {
            route_to_browser(state, conn, id, &method, session_id, value).await;
        }
        Classification::Agent => {
            route_to_agent(state, conn, id, &method, session_id, value, false).await;
        }
        Classification::Unsupported => {
            send_response(
                state,
                conn,
                CdpResponse::err(id, METHOD_NOT_FOUND, format!("'{method}' wasn't found")),
            )
            .await;
        }
    }
}

async fn route_to_browser(
    state: &Arc<BridgeState>,
    conn: ConnectionId,
    id: u64,
    method: &str,
    session_id: Option<String>,
    original: Value,
) {
    if let Some(tx) = state.browser.sender() {
        let (rewritten, superseded) =
            state
                .correlator
                .register_browser(conn, id, method, session_id, original.clone());
        if let Some(notice) = superseded {
            notify_superseded(state, notice).await;
        }

        let mut outbound = original;
        outbound["id"] = json!(rewritten);
        debug!(conn, id, rewritten, method, "forwarding to browser");

        if tx.send(outbound.to_string()).await.is_err() {
            // The link died between the liveness check and the send.
            state.correlator.resolve_browser(rewritten);
            send_response(
                state,
                conn,
                CdpResponse::err(id, INTERNAL_ERROR, BACKEND_UNAVAILABLE_MSG),
            )
            .await;
        }
    } else if state.policy.browser_fallback_to_agent(method) && state.agent.is_connected() {
        route_to_agent(state, conn, id, method, session_id, original, true).await;
    } else {
        send_response(
            state,
            conn,
            CdpResponse::err(id, INTERNAL_ERROR, BACKEND_UNAVAILABLE_MSG),
        )
        .await;
    }
}

async fn route_to_agent(
    state: &Arc<BridgeState>,
    conn: ConnectionId,
    id: u64,
    method: &str,
    session_id: Option<String>,
    original: Value,
    degraded: bool,
) {
    let Some(tx) = state.agent.sender() else {
        send_response(
            state,
            conn,
            CdpResponse::err(id, SERVER_ERROR, AGENT_UNAVAILABLE_MSG),
        )
        .await;
        return;
    };

    let (key, notices) =
        state
            .correlator
            .register_agent_cdp(conn, id, method, session_id.clone(), original.clone());
    for notice in notices {
        notify_superseded(state, notice).await;
    }

    let envelope = ToAgent::Cdp(CdpEnvelope {
        connection_id: conn,
        id,
        method: method.to_string(),
        params: original.get("params").cloned(),
        session_id,
        original_command: original,
        degraded: degraded.then_some(true),
    });
    debug!(conn, id, method, degraded, "wrapping for agent");

    match serde_json::to_string(&envelope) {
        Ok(frame) => {
            if tx.send(frame).await.is_err() {
                state.correlator.resolve_agent(&key);
                send_response(
                    state,
                    conn,
                    CdpResponse::err(id, SERVER_ERROR, AGENT_UNAVAILABLE_MSG),
                )
                .await;
            }
        }
        Err(e) => {
            state.correlator.resolve_agent(&key);
            state
                .ring
                .record(LogLevel::Error, format!("envelope serialization failed: {e}"));
            send_response(
                state,
                conn,
                CdpResponse::err(id, INTERNAL_ERROR, "internal envelope error"),
            )
            .await;
        }
    }
}

/// Handle one frame from a native client.
pub async fn on_native_message(state: &Arc<BridgeState>, conn: ConnectionId, text: &str) {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            state.ring.record(
                LogLevel::Warn,
                format!("native client {conn}: unparseable frame dropped: {e}"),
            );
            return;
        }
    };

    let id = value.get("id").cloned();
    let method = value
        .get("method")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    let (Some(id), Some(method)) = (id, method) else {
        if let Some(id) = value.get("id").cloned() {
            send_native_reply(state, conn, native_error(&id, "invalid request")).await;
        } else {
            state.ring.record(
                LogLevel::Warn,
                format!("native client {conn}: request without id dropped"),
            );
        }
        return;
    };

    let Some(tx) = state.agent.sender() else {
        send_native_reply(state, conn, native_error(&id, AGENT_UNAVAILABLE_MSG)).await;
        return;
    };

    let (key, superseded) = state.correlator.register_agent_native(conn, &id);
    if let Some(notice) = superseded {
        notify_superseded(state, notice).await;
    }

    let envelope = ToAgent::Command {
        id: id.clone(),
        method,
        params: value.get("params").cloned().unwrap_or_else(|| json!({})),
    };

    match serde_json::to_string(&envelope) {
        Ok(frame) => {
            if tx.send(frame).await.is_err() {
                state.correlator.resolve_agent(&key);
                send_native_reply(state, conn, native_error(&id, AGENT_UNAVAILABLE_MSG)).await;
            }
        }
        Err(e) => {
            state.correlator.resolve_agent(&key);
            state
                .ring
                .record(LogLevel::Error, format!("envelope serialization failed: {e}"));
            send_native_reply(state, conn, native_error(&id, "internal envelope error")).await;
        }
    }
}

/// Handle one frame from the agent link.
pub async fn on_agent_message(state: &Arc<BridgeState>, text: &str) {
    let msg: FromAgent = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            state.ring.record(
                LogLevel::Warn,
                format!("agent: malformed envelope dropped: {e}"),
            );
            return;
        }
    };

    match msg {
        FromAgent::Welcome | FromAgent::Pong => state.agent.touch_pong(),
        FromAgent::Response(resp) => deliver_agent_response(state, resp).await,
        FromAgent::CdpEvent(evt) => {
            // Rebuilding through the typed event strips anything (like a
            // leaked id) that would violate the event shape.
            let event = CdpEvent {
                method: evt.method,
                params: evt.params,
                session_id: evt.session_id,
            };
            match serde_json::to_string(&event) {
                Ok(frame) => broadcast_event(state, frame).await,
                Err(e) => {
                    state
                        .ring
                        .record(LogLevel::Warn, format!("agent event dropped: {e}"));
                }
            }
        }
    }
}

async fn deliver_agent_response(state: &Arc<BridgeState>, resp: AgentResponse) {
    let key = id_key(&resp.id);
    match state.correlator.resolve_agent(&key) {
        Some(AgentOrigin::Cdp { conn, client_id }) => {
            let response = agent_response_to_cdp(client_id, resp);
            send_response(state, conn, response).await;
        }
        Some(AgentOrigin::Native { conn, id }) => {
            let success = resp.success.unwrap_or(resp.error.is_none());
            let mut reply = json!({"id": id, "success": success});
            if let Some(result) = resp.result {
                reply["result"] = result;
            }
            if let Some(error) = resp.error {
                reply["error"] = error;
            }
            send_native_reply(state, conn, reply.to_string()).await;
        }
        None => {
            state.ring.record(
                LogLevel::Debug,
                format!("agent response for unknown id {key} dropped"),
            );
        }
    }
}

/// Convert an agent response body into a CDP response on the client's id.
fn agent_response_to_cdp(client_id: u64, resp: AgentResponse) -> CdpResponse {
    if let Some(error) = resp.error {
        let (code, message, data) = match &error {
            Value::Object(obj) => (
                obj.get("code").and_then(Value::as_i64).unwrap_or(SERVER_ERROR),
                obj.get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("agent error")
                    .to_string(),
                obj.get("data").cloned(),
            ),
            Value::String(s) => (SERVER_ERROR, s.clone(), None),
            other => (SERVER_ERROR, other.to_string(), None),
        };
        let mut response = CdpResponse::err(client_id, code, message);
        if let Some(err) = response.error.as_mut() {
            err.data = data;
        }
        response
    } else if resp.success == Some(false) {
        CdpResponse::err(client_id, SERVER_ERROR, "agent command failed")
    } else {
        CdpResponse::ok(client_id, resp.result.unwrap_or_else(|| json!({})))
    }
}

/// Handle one frame from the browser link.
///
/// Discrimination and shape repair happen in one step: deserializing
/// through [`CdpMessage`] discards a `method` leaked onto a response and an
/// `id` leaked onto an event, and a frame matching neither shape is
/// unroutable and dropped.
pub async fn on_browser_message(state: &Arc<BridgeState>, text: &str) {
    let msg: CdpMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            state.ring.record(
                LogLevel::Warn,
                format!("browser: unroutable frame dropped: {e}"),
            );
            return;
        }
    };

    match msg {
        CdpMessage::Response(mut resp) => {
            let Some(shadow) = state.correlator.resolve_browser(resp.id) else {
                state.ring.record(
                    LogLevel::Debug,
                    format!("browser response for unknown id {} dropped", resp.id),
                );
                return;
            };
            resp.id = shadow.client_id;
            // Exactly one of result/error on egress.
            if resp.error.is_some() {
                resp.result = None;
            } else if resp.result.is_none() {
                resp.result = Some(json!({}));
            }
            send_response(state, shadow.conn, resp).await;
        }
        CdpMessage::Event(event) => match serde_json::to_string(&event) {
            Ok(frame) => broadcast_event(state, frame).await,
            Err(e) => {
                state
                    .ring
                    .record(LogLevel::Warn, format!("browser event dropped: {e}"));
            }
        },
    }
}

/// Fan an event frame out to every live CDP client.
///
/// Native clients never receive CDP events. A client whose writer queue is
/// full loses the event rather than stalling the source reader.
async fn broadcast_event(state: &Arc<BridgeState>, frame: String) {
    for (conn, tx) in state.registry.cdp_senders() {
        if tx.try_send(frame.clone()).is_err() {
            state.ring.record(
                LogLevel::Warn,
                format!("client {conn}: event dropped (slow consumer)"),
            );
        }
    }
}

/// A client connection closed: deregister it and purge its pendings.
pub async fn on_client_closed(state: &Arc<BridgeState>, kind: ClientKind, conn: ConnectionId) {
    state.registry.deregister(kind, conn);
    let purged = state.correlator.purge_connection(conn);
    if purged > 0 {
        debug!(conn, purged, "purged pending records on disconnect");
    }
    state
        .ring
        .record(LogLevel::Info, format!("client {conn} disconnected"));
}

/// The agent link dropped: every agent-bound pending fails immediately.
pub async fn fail_agent_pendings(state: &Arc<BridgeState>) {
    for notice in state.correlator.fail_all_agent() {
        match notice {
            PendingNotice::Cdp { conn, client_id } => {
                send_response(
                    state,
                    conn,
                    CdpResponse::err(client_id, SERVER_ERROR, AGENT_UNAVAILABLE_MSG),
                )
                .await;
            }
            PendingNotice::Native { conn, id } => {
                send_native_reply(state, conn, native_error(&id, AGENT_UNAVAILABLE_MSG)).await;
            }
        }
    }
}

/// The browser link dropped: browser-bound pendings fail immediately.
pub async fn fail_browser_pendings(state: &Arc<BridgeState>) {
    for notice in state.correlator.fail_all_browser() {
        if let PendingNotice::Cdp { conn, client_id } = notice {
            send_response(
                state,
                conn,
                CdpResponse::err(client_id, INTERNAL_ERROR, BACKEND_UNAVAILABLE_MSG),
            )
            .await;
        }
    }
}

/// Fail every pending older than `deadline` with a timeout error.
pub async fn expire_pendings(state: &Arc<BridgeState>, deadline: Duration) {
    for notice in state.correlator.expire(deadline) {
        match notice {
            PendingNotice::Cdp { conn, client_id } => {
                send_response(
                    state,
                    conn,
                    CdpResponse::err(client_id, SERVER_ERROR, TIMEOUT_MSG),
                )
                .await;
            }
            PendingNotice::Native { conn, id } => {
                send_native_reply(state, conn, native_error(&id, TIMEOUT_MSG)).await;
            }
        }
    }
}

async fn notify_superseded(state: &Arc<BridgeState>, notice: PendingNotice) {
    match notice {
        PendingNotice::Cdp { conn, client_id } => {
            send_response(
                state,
                conn,
                CdpResponse::err(client_id, SERVER_ERROR, SUPERSEDED_MSG),
            )
            .await;
        }
        PendingNotice::Native { conn, id } => {
            send_native_reply(state, conn, native_error(&id, SUPERSEDED_MSG)).await;
        }
    }
}

async fn send_response(state: &Arc<BridgeState>, conn: ConnectionId, response: CdpResponse) {
    match serde_json::to_string(&response) {
        Ok(frame) => send_to_cdp(state, conn, frame).await,
        Err(e) => {
            state.ring.record(
                LogLevel::Error,
                format!("response serialization failed: {e}"),
            );
        }
    }
}

async fn send_raw_error(
    state: &Arc<BridgeState>,
    conn: ConnectionId,
    id: Value,
    code: i64,
    message: &str,
) {
    let frame = json!({"id": id, "error": {"code": code, "message": message}}).to_string();
    send_to_cdp(state, conn, frame).await;
}

async fn send_to_cdp(state: &Arc<BridgeState>, conn: ConnectionId, frame: String) {
    let Some(tx) = state.registry.cdp_sender(conn) else {
        debug!(conn, "dropping frame for departed client");
        return;
    };
    if tx.send(frame).await.is_err() {
        warn!(conn, "client writer gone, frame dropped");
    }
}

async fn send_native_reply(state: &Arc<BridgeState>, conn: ConnectionId, frame: String) {
    let Some(tx) = state.registry.native_sender(conn) else {
        debug!(conn, "dropping frame for departed native client");
        return;
    };
    if tx.send(frame).await.is_err() {
        warn!(conn, "native client writer gone, frame dropped");
    }
}

fn native_error(id: &Value, message: &str) -> String {
    json!({"id": id, "success": false, "error": message}).to_string()
}
