//! # cdpmux-cdp - Chrome DevTools Protocol wire layer
//!
//! Wire types and endpoint discovery for the cdpmux bridge.
//!
//! This crate handles:
//! - CDP response and event wire shapes and their serde forms
//! - Discrimination of incoming traffic into responses and events
//! - Browser endpoint discovery via the HTTP `/json/version` API
//!
//! The bridge forwards most traffic verbatim, so the types here are
//! deliberately thin: `params`, `result`, and `error.data` stay as raw
//! [`serde_json::Value`] payloads rather than per-domain structs. Requests
//! have no struct at all; the bridge touches only their `id` field and
//! everything else must survive untyped.
//!
//! ## Discovering a browser endpoint
//!
//! ```no_run
//! use cdpmux_cdp::discovery;
//!
//! # async fn example() -> Result<(), cdpmux_cdp::CdpError> {
//! let version = discovery::fetch_browser_version("http://127.0.0.1:9222").await?;
//! let ws_url = version.require_websocket_url("http://127.0.0.1:9222")?;
//! println!("browser CDP socket: {ws_url}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Discriminating incoming traffic
//!
//! ```
//! use cdpmux_cdp::CdpMessage;
//!
//! let msg: CdpMessage = serde_json::from_str(r#"{"id":7,"result":{}}"#).unwrap();
//! assert!(matches!(msg, CdpMessage::Response(_)));
//! ```

pub mod discovery;
pub mod error;
pub mod transport;

pub use discovery::{BrowserVersion, fetch_browser_version};
pub use error::CdpError;
pub use transport::{CdpEvent, CdpMessage, CdpResponse, CdpResponseError};
