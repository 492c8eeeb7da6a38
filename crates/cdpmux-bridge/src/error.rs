//! Bridge error types.

use thiserror::Error;

/// Errors that can occur while running the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A listener could not be bound.
    #[error("failed to bind {endpoint} listener on port {port}: {source}")]
    Bind {
        /// Which endpoint failed (cdp, native, agent).
        endpoint: &'static str,
        /// The requested port.
        port: u16,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error outside the listener path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A CDP-layer error (discovery, dial, protocol).
    #[error(transparent)]
    Cdp(#[from] cdpmux_cdp::CdpError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}
