//! CDP message transport types.
//!
//! A CDP peer emits two message shapes toward the bridge: responses (`id` +
//! exactly one of `result`/`error`) and events (`method`, never `id`). The
//! two shapes are disjoint; automation clients assert this and tear down the
//! connection on violation. Client-bound traffic is forwarded verbatim, so
//! there is no request struct here; requests travel as raw JSON with only
//! their `id` field touched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A CDP response message.
///
/// Serialization cannot produce a `method` field, so emitting through this
/// type keeps the response shape valid by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpResponse {
    /// Message ID matching the request.
    pub id: u64,
    /// Result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CdpResponseError>,
    /// Session ID if this was a session-specific response.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl CdpResponse {
    /// Build a success response.
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
            session_id: None,
        }
    }

    /// Build an error response.
    pub fn err(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(CdpResponseError {
                code,
                message: message.into(),
                data: None,
            }),
            session_id: None,
        }
    }
}

/// Error details in a CDP response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpResponseError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A CDP event message.
///
/// Serialization cannot produce an `id` field, mirroring [`CdpResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpEvent {
    /// Event method name (e.g., "Target.targetCreated").
    pub method: String,
    /// Event parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Session ID if this event came from a specific session.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// An incoming CDP message (either response or event).
///
/// Discrimination is by shape: anything with a numeric `id` is a response,
/// anything else with a `method` is an event. Fields outside the two shapes
/// (a `method` leaked onto a response, an `id` leaked onto an event) are
/// discarded during deserialization, so a round trip through this enum
/// repairs malformed peer traffic.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CdpMessage {
    /// A response to a previous request.
    Response(CdpResponse),
    /// An event pushed by the peer.
    Event(CdpEvent),
}
