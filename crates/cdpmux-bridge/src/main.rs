//! cdpmux binary entry point.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cdpmux_bridge::{Bridge, BridgeConfig};

#[derive(Parser, Debug)]
#[command(name = "cdpmux", version, about = "Browser automation multiplexing bridge")]
struct Args {
    /// Port serving automation clients (WebSocket + HTTP discovery).
    #[arg(long, default_value_t = 9223)]
    cdp_port: u16,

    /// Port serving native envelope clients.
    #[arg(long, default_value_t = 9224)]
    native_port: u16,

    /// Port accepting an inbound agent attach.
    #[arg(long, default_value_t = 9225)]
    agent_port: u16,

    /// WebSocket URL of the agent's listener; pass "none" to disable
    /// outbound dialing.
    #[arg(long, default_value = "ws://127.0.0.1:9226")]
    agent_url: String,

    /// HTTP base of the controlled browser's DevTools endpoint.
    #[arg(long, default_value = "http://127.0.0.1:9222", env = "CDPMUX_BROWSER_URL")]
    browser_url: String,

    /// Capacity of the in-memory log ring served at /logs.
    #[arg(long, default_value_t = 1000)]
    log_capacity: usize,

    /// Per-request deadline in seconds; 0 means requests live as long as
    /// their link.
    #[arg(long, default_value_t = 0)]
    request_timeout: u64,

    /// Sentinel file that forces both links to reconnect when its content
    /// changes.
    #[arg(long)]
    wake_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = BridgeConfig {
        cdp_port: args.cdp_port,
        native_port: args.native_port,
        agent_port: args.agent_port,
        agent_url: (args.agent_url != "none").then_some(args.agent_url),
        browser_url: args.browser_url,
        ring_capacity: args.log_capacity,
        request_timeout: (args.request_timeout > 0)
            .then(|| Duration::from_secs(args.request_timeout)),
        wake_file: args.wake_file,
        ..BridgeConfig::default()
    };

    let mut bridge = Bridge::new(config);
    bridge.start().await?;
    info!("cdpmux running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    bridge.shutdown();
    Ok(())
}
