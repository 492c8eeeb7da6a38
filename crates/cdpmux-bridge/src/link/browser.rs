//! The browser link.
//!
//! The endpoint is discovered, not configured: the bridge fetches
//! `/json/version` from the browser's HTTP side, extracts
//! `webSocketDebuggerUrl`, and dials it. The version record is cached so the
//! discovery service can keep serving it while the browser is away. Retry is
//! unbounded at a fixed interval.

use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info};

use cdpmux_cdp::discovery::{BrowserVersion, fetch_browser_version};
use cdpmux_cdp::error::CdpError;

use crate::bridge::BridgeState;
use crate::error::BridgeError;
use crate::link::LinkState;
use crate::ring::LogLevel;
use crate::router;

/// Singleton state of the browser link.
#[derive(Debug)]
pub struct BrowserLink {
    link: LinkState,
    version: Mutex<Option<BrowserVersion>>,
}

impl Default for BrowserLink {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserLink {
    /// A link with no live session and no cached discovery record.
    pub fn new() -> Self {
        Self {
            link: LinkState::new(),
            version: Mutex::new(None),
        }
    }

    /// The live session's writer channel, if any.
    pub fn sender(&self) -> Option<mpsc::Sender<String>> {
        self.link.sender()
    }

    /// Whether a browser session is live.
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// The last discovery record seen, kept across disconnects.
    pub fn cached_version(&self) -> Option<BrowserVersion> {
        self.version.lock().clone()
    }

    /// Retry the connection immediately.
    pub fn force_reconnect(&self) {
        self.link.force_reconnect();
    }

    /// Install a session directly; used by the session driver and tests.
    pub(crate) fn install(&self, tx: mpsc::Sender<String>) -> (u64, bool) {
        self.link.install(tx)
    }

    fn set_version(&self, version: BrowserVersion) {
        *self.version.lock() = Some(version);
    }
}

/// Discover and dial the browser forever, retrying at a fixed interval.
pub async fn run_browser_loop(state: Arc<BridgeState>) {
    loop {
        if let Err(e) = connect_and_serve(&state).await {
            debug!(error = %e, "browser link attempt failed");
            state
                .ring
                .record(LogLevel::Warn, format!("browser link unavailable: {e}"));
        }
        tokio::select! {
            () = sleep(state.config.browser_retry) => {}
            () = state.browser.link.wait_for_wake() => {}
        }
    }
}

async fn connect_and_serve(state: &Arc<BridgeState>) -> Result<(), BridgeError> {
    let version = fetch_browser_version(&state.config.browser_url).await?;
    let ws_url = version.require_websocket_url(&state.config.browser_url)?;
    let (ws, _) = tokio_tungstenite::connect_async(ws_url.as_str())
        .await
        .map_err(CdpError::from)?;

    state.browser.set_version(version);
    info!(%ws_url, "browser link established");
    state.ring.record(LogLevel::Info, "browser link established");

    let (sink, stream) = ws.split();
    let (tx, rx) = mpsc::channel(256);
    let (generation, _) = state.browser.install(tx);

    let writer = crate::link::write_loop(rx, sink);
    let reader = async {
        let mut stream = stream;
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => router::on_browser_message(state, &text).await,
                Ok(WsMessage::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };
    tokio::select! {
        () = writer => {}
        () = reader => {}
    }

    if state.browser.link.uninstall(generation) {
        router::fail_browser_pendings(state).await;
    }
    state.ring.record(LogLevel::Warn, "browser link closed");
    Ok(())
}
