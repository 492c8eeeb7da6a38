//! Browser endpoint discovery via HTTP.
//!
//! A Chromium-family browser exposes an HTTP endpoint that returns browser
//! metadata including the WebSocket URL. This module fetches that record so
//! the bridge can dial the browser and re-serve the metadata to its own
//! clients.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::CdpError;

/// Default timeout for HTTP endpoint discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// The browser-info record served at `/json/version`.
///
/// Field names follow the browser's own key spelling so the record can be
/// cached and re-served byte-compatibly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserVersion {
    /// Product string, e.g. "Chrome/132.0.6834.83".
    #[serde(rename = "Browser", skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    /// DevTools protocol version.
    #[serde(rename = "Protocol-Version", skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    /// User agent string.
    #[serde(rename = "User-Agent", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// V8 version.
    #[serde(rename = "V8-Version", skip_serializing_if = "Option::is_none")]
    pub v8_version: Option<String>,
    /// WebKit version.
    #[serde(rename = "WebKit-Version", skip_serializing_if = "Option::is_none")]
    pub webkit_version: Option<String>,
    /// The WebSocket URL for the browser-level CDP connection.
    #[serde(
        rename = "webSocketDebuggerUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub web_socket_debugger_url: Option<String>,
}

impl BrowserVersion {
    /// Extract the WebSocket URL, or fail with a discovery error naming the
    /// endpoint that produced the record.
    pub fn require_websocket_url(&self, endpoint_url: &str) -> Result<String, CdpError> {
        self.web_socket_debugger_url
            .clone()
            .ok_or_else(|| CdpError::EndpointDiscoveryFailed {
                url: endpoint_url.to_string(),
                reason: "response missing webSocketDebuggerUrl field".to_string(),
            })
    }
}

/// Fetch the `/json/version` record from a browser HTTP endpoint.
///
/// # Errors
///
/// Returns an error if the URL is invalid, the HTTP request fails, or the
/// response is not a browser-info record.
#[instrument(level = "debug")]
pub async fn fetch_browser_version(endpoint_url: &str) -> Result<BrowserVersion, CdpError> {
    let base_url = Url::parse(endpoint_url)
        .map_err(|e| CdpError::InvalidEndpointUrl(format!("{endpoint_url}: {e}")))?;

    if base_url.scheme() != "http" && base_url.scheme() != "https" {
        return Err(CdpError::InvalidEndpointUrl(format!(
            "expected http or https scheme, got: {}",
            base_url.scheme()
        )));
    }

    let version_url = base_url
        .join("/json/version")
        .map_err(|e| CdpError::InvalidEndpointUrl(format!("failed to build version URL: {e}")))?;

    debug!(url = %version_url, "fetching browser version record");

    let client = reqwest::Client::builder()
        .timeout(DEFAULT_DISCOVERY_TIMEOUT)
        .build()
        .map_err(|e| CdpError::HttpRequestFailed(e.to_string()))?;

    let response = client.get(version_url.as_str()).send().await.map_err(|e| {
        if e.is_timeout() {
            CdpError::ConnectionTimeout(DEFAULT_DISCOVERY_TIMEOUT)
        } else if e.is_connect() {
            CdpError::ConnectionFailed(format!("failed to connect to {endpoint_url}: {e}"))
        } else {
            CdpError::HttpRequestFailed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(CdpError::EndpointDiscoveryFailed {
            url: endpoint_url.to_string(),
            reason: format!("HTTP status {}", response.status()),
        });
    }

    let version: BrowserVersion =
        response
            .json()
            .await
            .map_err(|e| CdpError::EndpointDiscoveryFailed {
                url: endpoint_url.to_string(),
                reason: format!("failed to parse response: {e}"),
            })?;

    info!(browser = ?version.browser, "discovered browser endpoint");

    Ok(version)
}

#[cfg(test)]
mod tests;
