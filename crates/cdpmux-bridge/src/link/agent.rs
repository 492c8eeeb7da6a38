//! The agent link.
//!
//! The bridge dials the agent's well-known loopback listener and keeps the
//! link alive with a ping/pong probe. An agent may also attach inbound on
//! the agent port; the newest session wins and there is at most one live
//! link. While the link is down, agent-routed requests fail immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::bridge::BridgeState;
use crate::envelope::{ToAgent, now_millis};
use crate::link::LinkState;
use crate::ring::LogLevel;
use crate::router;

/// Consecutive failed dials before the link parks until a wake-up.
pub const MAX_DIAL_ATTEMPTS: u32 = 10;

/// Reconnect backoff: `min(1000 * 2^(attempt-1), 30000)` milliseconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(10);
    Duration::from_millis((1000u64 << exp).min(30_000))
}

/// Singleton state of the agent link.
#[derive(Debug)]
pub struct AgentLink {
    link: LinkState,
    attempts: AtomicU32,
    last_pong: Mutex<Instant>,
}

impl Default for AgentLink {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentLink {
    /// A link with no live session.
    pub fn new() -> Self {
        Self {
            link: LinkState::new(),
            attempts: AtomicU32::new(0),
            last_pong: Mutex::new(Instant::now()),
        }
    }

    /// The live session's writer channel, if any.
    pub fn sender(&self) -> Option<mpsc::Sender<String>> {
        self.link.sender()
    }

    /// Whether an agent session is live.
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Record a liveness signal (pong or welcome).
    pub fn touch_pong(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the last liveness signal.
    pub fn pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Retry dialing immediately, clearing any backoff state.
    pub fn force_reconnect(&self) {
        self.reset_attempts();
        self.link.force_reconnect();
    }

    /// Install a session directly; used by the session drivers and tests.
    pub(crate) fn install(&self, tx: mpsc::Sender<String>) -> (u64, bool) {
        self.link.install(tx)
    }

    fn reset_attempts(&self) {
        self.attempts.store(0, Ordering::Relaxed);
    }

    fn bump_attempts(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Dial the agent's listener forever, honoring backoff and wake-ups.
pub async fn run_dial_loop(state: Arc<BridgeState>) {
    let Some(url) = state.config.agent_url.clone() else {
        debug!("agent dialing disabled; inbound attach only");
        return;
    };

    loop {
        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                state.agent.reset_attempts();
                info!(%url, "agent link established");
                state.ring.record(LogLevel::Info, "agent link established");
                run_dialed_session(&state, ws).await;
                state.ring.record(LogLevel::Warn, "agent link closed");
            }
            Err(e) => {
                debug!(%url, error = %e, "agent dial failed");
            }
        }

        let attempt = state.agent.bump_attempts();
        if attempt > MAX_DIAL_ATTEMPTS {
            state.ring.record(
                LogLevel::Warn,
                "agent reconnect attempts exhausted; waiting for wake-up",
            );
            state.agent.link.wait_for_wake().await;
            state.agent.reset_attempts();
            continue;
        }
        tokio::select! {
            () = sleep(backoff_delay(attempt)) => {}
            () = state.agent.link.wait_for_wake() => {
                state.agent.reset_attempts();
            }
        }
    }
}

async fn run_dialed_session<S>(state: &Arc<BridgeState>, ws: S)
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (sink, stream) = ws.split();
    let (tx, rx) = mpsc::channel(64);
    let generation = install_and_greet(state, &tx).await;

    let writer = crate::link::write_loop(rx, sink);
    let reader = async {
        let mut stream = stream;
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => router::on_agent_message(state, &text).await,
                Ok(WsMessage::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };
    let keepalive = keepalive_loop(state, &tx);

    tokio::select! {
        () = writer => {}
        () = reader => {}
        () = keepalive => {}
    }

    finish_session(state, generation).await;
}

/// Attach an agent that connected inbound on the agent port.
pub async fn attach_inbound(state: Arc<BridgeState>, socket: axum::extract::ws::WebSocket) {
    use axum::extract::ws::Message as AxMessage;

    let (mut sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::channel(64);
    let generation = install_and_greet(&state, &tx).await;
    info!("agent attached inbound");
    state.ring.record(LogLevel::Info, "agent attached inbound");

    let writer = async move {
        let mut rx = rx;
        while let Some(frame) = rx.recv().await {
            if sink.send(AxMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    };
    let reader = async {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(AxMessage::Text(text)) => router::on_agent_message(&state, &text).await,
                Ok(AxMessage::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };
    let keepalive = keepalive_loop(&state, &tx);

    tokio::select! {
        () = writer => {}
        () = reader => {}
        () = keepalive => {}
    }

    finish_session(&state, generation).await;
    state.ring.record(LogLevel::Warn, "agent link closed");
}

/// Install the session (replacing any live one) and send the welcome
/// notification. Pendings of a replaced session are failed before new
/// traffic can reach the old socket.
async fn install_and_greet(state: &Arc<BridgeState>, tx: &mpsc::Sender<String>) -> u64 {
    let (generation, replaced) = state.agent.install(tx.clone());
    state.agent.touch_pong();
    if replaced {
        state
            .ring
            .record(LogLevel::Info, "agent session replaced by a newer link");
        router::fail_agent_pendings(state).await;
    }

    let welcome = ToAgent::Welcome {
        message: "cdpmux bridge ready".to_string(),
        timestamp: now_millis(),
    };
    if let Ok(frame) = serde_json::to_string(&welcome) {
        let _ = tx.send(frame).await;
    }
    generation
}

async fn finish_session(state: &Arc<BridgeState>, generation: u64) {
    if state.agent.link.uninstall(generation) {
        router::fail_agent_pendings(state).await;
    }
}

/// Send a ping every interval; end the session when the pong deadline is
/// missed. Only the link is torn down; pendings are failed by the caller.
async fn keepalive_loop(state: &Arc<BridgeState>, tx: &mpsc::Sender<String>) {
    let mut ticker = interval(state.config.ping_interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if state.agent.pong_elapsed() > state.config.pong_timeout {
            warn!("agent pong deadline missed, closing link");
            state
                .ring
                .record(LogLevel::Warn, "agent pong deadline missed; closing link");
            break;
        }
        let ping = ToAgent::Ping {
            timestamp: now_millis(),
        };
        let Ok(frame) = serde_json::to_string(&ping) else {
            break;
        };
        if tx.send(frame).await.is_err() {
            break;
        }
    }
}
