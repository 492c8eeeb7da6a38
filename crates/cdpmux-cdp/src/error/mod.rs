//! CDP error types.

use thiserror::Error;

/// Errors that can occur during CDP communication.
#[derive(Error, Debug)]
pub enum CdpError {
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket connection was lost during operation.
    #[error("WebSocket connection lost")]
    ConnectionLost,

    /// CDP protocol error returned by the peer.
    #[error("CDP protocol error {code}: {message}")]
    Protocol {
        /// JSON-RPC error code.
        code: i64,
        /// Human-readable message.
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The endpoint URL could not be parsed or has an unsupported scheme.
    #[error("invalid endpoint URL: {0}")]
    InvalidEndpointUrl(String),

    /// The HTTP discovery request failed.
    #[error("HTTP request failed: {0}")]
    HttpRequestFailed(String),

    /// Connection attempt timed out.
    #[error("connection timeout after {0:?}")]
    ConnectionTimeout(std::time::Duration),

    /// Endpoint discovery returned an unusable record.
    #[error("endpoint discovery failed for {url}: {reason}")]
    EndpointDiscoveryFailed {
        /// The endpoint that was queried.
        url: String,
        /// Why the record was unusable.
        reason: String,
    },
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        match err {
            tokio_tungstenite::tungstenite::Error::ConnectionClosed
            | tokio_tungstenite::tungstenite::Error::AlreadyClosed => Self::ConnectionLost,
            other => Self::ConnectionFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests;
