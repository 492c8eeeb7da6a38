//! Bridge runtime configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the bridge.
///
/// All endpoints bind to loopback; cross-host networking is out of scope.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Port serving automation clients (WebSocket + HTTP discovery).
    pub cdp_port: u16,
    /// Port serving native envelope clients.
    pub native_port: u16,
    /// Port accepting an inbound agent attach.
    pub agent_port: u16,
    /// WebSocket URL of the agent's own listener, dialed by the bridge.
    /// `None` disables outbound dialing (inbound attach only).
    pub agent_url: Option<String>,
    /// HTTP base of the controlled browser's DevTools endpoint.
    pub browser_url: String,
    /// Capacity of the in-memory log ring.
    pub ring_capacity: usize,
    /// Interval between agent keepalive pings.
    pub ping_interval: Duration,
    /// How long to wait for a pong before tearing the agent link down.
    pub pong_timeout: Duration,
    /// Delay between browser reconnect attempts.
    pub browser_retry: Duration,
    /// Optional per-request deadline. `None` means requests live as long as
    /// their link.
    pub request_timeout: Option<Duration>,
    /// Optional sentinel file; a content change forces both links to
    /// reconnect immediately, regardless of backoff state.
    pub wake_file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cdp_port: 9223,
            native_port: 9224,
            agent_port: 9225,
            agent_url: Some("ws://127.0.0.1:9226".to_string()),
            browser_url: "http://127.0.0.1:9222".to_string(),
            ring_capacity: 1000,
            ping_interval: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(15),
            browser_retry: Duration::from_secs(10),
            request_timeout: None,
            wake_file: None,
        }
    }
}

impl BridgeConfig {
    /// The WebSocket URL advertised to automation clients.
    pub fn advertised_ws_url(&self, target_id: &str) -> String {
        format!(
            "ws://127.0.0.1:{}/devtools/browser/{target_id}",
            self.cdp_port
        )
    }
}
