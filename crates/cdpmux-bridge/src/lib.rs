//! # cdpmux-bridge - browser automation multiplexing bridge
//!
//! cdpmux exposes a single Chrome DevTools Protocol endpoint to automation
//! clients (Playwright, Puppeteer) and satisfies each command from one of
//! two backends: a controlled browser reachable over CDP, or a privileged
//! in-browser agent reachable over a private envelope protocol. Clients see
//! one CDP WebSocket; the split is invisible.
//!
//! ## Topology
//!
//! ```text
//!  automation client ──ws──┐
//!  automation client ──ws──┤            ┌──ws──> browser (CDP)
//!                          ├── cdpmux ──┤
//!  native client ─────ws───┤            └──ws──> agent (envelope)
//!  agent (inbound) ───ws───┘
//! ```
//!
//! Three listeners accept connections (CDP clients, native clients, agent
//! attach); two outbound links dial the backends. The router correlates
//! request ids across two id spaces: browser-bound ids are rewritten to a
//! process-unique space, agent-bound ids travel inside an envelope that
//! carries the originating connection out of band.
//!
//! ## Modules
//!
//! - [`bridge`] - wiring, init/shutdown, background tasks
//! - [`classify`] - method name → backend policy table
//! - [`config`] - runtime configuration
//! - [`correlate`] - pending request tables and id rewriting
//! - [`envelope`] - the private agent wire protocol
//! - [`link`] - outbound browser and agent links
//! - [`registry`] - live client connection registry
//! - [`ring`] - bounded in-memory log ring behind `/logs`
//! - [`router`] - the message state machine
//! - [`server`] - endpoint listeners and HTTP discovery

pub mod bridge;
pub mod classify;
pub mod config;
pub mod correlate;
pub mod envelope;
pub mod error;
pub mod link;
pub mod registry;
pub mod ring;
pub mod router;
pub mod server;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use error::BridgeError;
