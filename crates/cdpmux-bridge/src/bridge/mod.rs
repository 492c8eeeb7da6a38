//! Bridge wiring: shared state, init, background tasks, shutdown.
//!
//! The three singletons (agent link, browser link, log ring) live inside
//! [`BridgeState`] with explicit start and shutdown steps; component
//! lifetime is not assumed to equal process lifetime.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info};
use uuid::Uuid;

use crate::classify::RoutePolicy;
use crate::config::BridgeConfig;
use crate::correlate::Correlator;
use crate::error::BridgeError;
use crate::link::{self, AgentLink, BrowserLink};
use crate::registry::Registry;
use crate::ring::{LogLevel, LogRing};
use crate::router;
use crate::server;

/// Everything the router, links, and listeners share.
#[derive(Debug)]
pub struct BridgeState {
    /// Runtime configuration.
    pub config: BridgeConfig,
    /// Id of the synthetic discovery target, stable per process.
    pub target_id: String,
    /// Live client connections.
    pub registry: Registry,
    /// Pending request tables.
    pub correlator: Correlator,
    /// Method routing policy.
    pub policy: RoutePolicy,
    /// The observability ring behind `/logs`.
    pub ring: LogRing,
    /// The agent link singleton.
    pub agent: AgentLink,
    /// The browser link singleton.
    pub browser: BrowserLink,
}

impl BridgeState {
    /// Fresh state with no live connections or links.
    pub fn new(config: BridgeConfig) -> Self {
        let ring = LogRing::new(config.ring_capacity);
        Self {
            target_id: Uuid::new_v4().to_string(),
            registry: Registry::new(),
            correlator: Correlator::new(),
            policy: RoutePolicy,
            ring,
            agent: AgentLink::new(),
            browser: BrowserLink::new(),
            config,
        }
    }
}

/// The bridge process: state plus its background tasks.
pub struct Bridge {
    state: Arc<BridgeState>,
    tasks: Vec<JoinHandle<()>>,
}

impl Bridge {
    /// Create a bridge that has not bound anything yet.
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            state: Arc::new(BridgeState::new(config)),
            tasks: Vec::new(),
        }
    }

    /// Shared handle to the bridge state.
    pub fn state(&self) -> Arc<BridgeState> {
        self.state.clone()
    }

    /// Bind the three listeners and spawn every background task.
    pub async fn start(&mut self) -> Result<(), BridgeError> {
        let config = &self.state.config;
        let cdp = server::bind("cdp", config.cdp_port).await?;
        let native = server::bind("native", config.native_port).await?;
        let agent = server::bind("agent", config.agent_port).await?;

        info!(
            cdp = config.cdp_port,
            native = config.native_port,
            agent = config.agent_port,
            "listeners bound"
        );
        self.state.ring.record(
            LogLevel::Info,
            format!(
                "listening on cdp {}, native {}, agent {}",
                config.cdp_port, config.native_port, config.agent_port
            ),
        );

        let app = server::cdp_router(self.state.clone());
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(cdp, app).await {
                error!(error = %e, "cdp listener failed");
            }
        }));

        let app = server::native_router(self.state.clone());
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(native, app).await {
                error!(error = %e, "native listener failed");
            }
        }));

        let app = server::agent_router(self.state.clone());
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(agent, app).await {
                error!(error = %e, "agent listener failed");
            }
        }));

        self.tasks
            .push(tokio::spawn(link::agent::run_dial_loop(self.state.clone())));
        self.tasks.push(tokio::spawn(link::browser::run_browser_loop(
            self.state.clone(),
        )));

        if let Some(deadline) = self.state.config.request_timeout {
            self.tasks
                .push(tokio::spawn(expire_loop(self.state.clone(), deadline)));
        }
        if self.state.config.wake_file.is_some() {
            self.tasks.push(tokio::spawn(wake_loop(self.state.clone())));
        }

        Ok(())
    }

    /// Cancel every task and close all sockets. Pending records are
    /// discarded, not replayed.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.state.ring.record(LogLevel::Info, "bridge shut down");
        info!("bridge shut down");
    }
}

/// Sweep pendings older than the configured deadline once per second.
async fn expire_loop(state: Arc<BridgeState>, deadline: Duration) {
    let mut ticker = interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        router::expire_pendings(&state, deadline).await;
    }
}

/// Poll the wake sentinel; a content change (including first appearance)
/// forces both links to reconnect immediately.
async fn wake_loop(state: Arc<BridgeState>) {
    let Some(path) = state.config.wake_file.clone() else {
        return;
    };
    let mut primed = false;
    let mut last: Option<String> = None;
    let mut ticker = interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        let current = tokio::fs::read_to_string(&path).await.ok();
        if primed && current.is_some() && current != last {
            info!("wake-up signal detected, reconnecting links");
            state
                .ring
                .record(LogLevel::Info, "wake-up signal detected; reconnecting links");
            state.agent.force_reconnect();
            state.browser.force_reconnect();
        }
        last = current;
        primed = true;
    }
}
