//! The private envelope protocol between the bridge and the agent.
//!
//! Every frame on the agent link is a JSON object with a `type` discriminator.
//! The discriminator is authoritative: a response is a response because its
//! `type` says so, never because of the presence or absence of an `id` field.
//!
//! Native clients speak the same command/response pair without the `type`
//! wrapper: `{id, method, params}` in, `{id, success, result?, error?}` out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages the bridge sends to the agent.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ToAgent {
    /// Sent once when a link opens.
    #[serde(rename = "welcome")]
    Welcome {
        /// Greeting text for the agent's log.
        message: String,
        /// Unix milliseconds.
        timestamp: i64,
    },

    /// Keepalive probe; the agent must answer with `pong`.
    #[serde(rename = "ping")]
    Ping {
        /// Unix milliseconds.
        timestamp: i64,
    },

    /// A native client command, forwarded as-is inside the envelope.
    #[serde(rename = "brop_command")]
    Command {
        /// The native client's request id, echoed back in the response.
        id: Value,
        /// Command name, e.g. "list_tabs".
        method: String,
        /// Command parameters.
        params: Value,
    },

    /// A CDP request routed to the agent instead of the browser.
    #[serde(rename = "BROP_CDP")]
    Cdp(CdpEnvelope),
}

/// Payload of a [`ToAgent::Cdp`] envelope.
///
/// The client's id travels unchanged; `connectionId` carries the originating
/// client identity out of band, so no id rewriting is needed on this link.
#[derive(Debug, Clone, Serialize)]
pub struct CdpEnvelope {
    /// The originating client connection. Never echoed to the client.
    #[serde(rename = "connectionId")]
    pub connection_id: u64,
    /// The client's own request id, preserved verbatim.
    pub id: u64,
    /// CDP method name.
    pub method: String,
    /// CDP parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// CDP session id, passed through verbatim.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// The client's message, verbatim, for the agent's own bookkeeping.
    #[serde(rename = "originalCommand")]
    pub original_command: Value,
    /// Set when the browser link is down and the agent should use its
    /// degraded fallback handler for this method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<bool>,
}

/// Messages the agent sends to the bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum FromAgent {
    /// Liveness greeting; treated like a pong.
    #[serde(rename = "welcome")]
    Welcome,

    /// Keepalive answer.
    #[serde(rename = "pong")]
    Pong,

    /// Answer to a `brop_command` or `BROP_CDP` envelope.
    #[serde(rename = "response")]
    Response(AgentResponse),

    /// An event synthesized by the agent, fanned out to CDP clients.
    #[serde(rename = "cdp_event")]
    CdpEvent(AgentEvent),
}

/// An agent response body.
///
/// Native command responses carry `success`; CDP-routed responses carry
/// `result`/`error` directly. Both shapes share the envelope `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentResponse {
    /// The id of the request this answers (the client's own id).
    pub id: Value,
    /// Present on native command responses.
    pub success: Option<bool>,
    /// Result payload.
    pub result: Option<Value>,
    /// Error payload; an object with `code`/`message`, or a bare string.
    pub error: Option<Value>,
}

/// An agent-synthesized CDP event.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentEvent {
    /// CDP event method name.
    pub method: String,
    /// Event parameters.
    pub params: Option<Value>,
    /// Session id, if the agent scoped the event.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Canonical map key for an envelope id.
///
/// Uses the JSON text of the value, so the string id `"5"` and the number id
/// `5` occupy distinct keys.
pub fn id_key(id: &Value) -> String {
    id.to_string()
}

/// Current time as unix milliseconds, for `welcome`/`ping` timestamps.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests;
