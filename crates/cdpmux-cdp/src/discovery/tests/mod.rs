use crate::discovery::BrowserVersion;
use crate::error::CdpError;

#[test]
fn test_browser_version_parses_chrome_keys() {
    let json = r#"{
        "Browser": "Chrome/132.0.6834.83",
        "Protocol-Version": "1.3",
        "User-Agent": "Mozilla/5.0",
        "V8-Version": "13.2.152.16",
        "WebKit-Version": "537.36",
        "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc"
    }"#;

    let version: BrowserVersion = serde_json::from_str(json).unwrap();
    assert_eq!(version.browser.as_deref(), Some("Chrome/132.0.6834.83"));
    assert_eq!(version.protocol_version.as_deref(), Some("1.3"));
    assert_eq!(
        version.web_socket_debugger_url.as_deref(),
        Some("ws://127.0.0.1:9222/devtools/browser/abc")
    );
}

#[test]
fn test_browser_version_reserializes_with_same_keys() {
    let version = BrowserVersion {
        browser: Some("Chrome/132.0.6834.83".to_string()),
        protocol_version: Some("1.3".to_string()),
        user_agent: None,
        v8_version: None,
        webkit_version: None,
        web_socket_debugger_url: Some("ws://127.0.0.1:9223/devtools/browser/xyz".to_string()),
    };

    let json = serde_json::to_string(&version).unwrap();
    assert!(json.contains("\"Browser\":"));
    assert!(json.contains("\"Protocol-Version\":"));
    assert!(json.contains("\"webSocketDebuggerUrl\":"));
    assert!(!json.contains("User-Agent"));
}

#[test]
fn test_require_websocket_url_present() {
    let version = BrowserVersion {
        web_socket_debugger_url: Some("ws://127.0.0.1:9222/devtools/browser/abc".to_string()),
        ..BrowserVersion::default()
    };
    let url = version.require_websocket_url("http://127.0.0.1:9222").unwrap();
    assert_eq!(url, "ws://127.0.0.1:9222/devtools/browser/abc");
}

#[test]
fn test_require_websocket_url_missing() {
    let version = BrowserVersion::default();
    let err = version
        .require_websocket_url("http://127.0.0.1:9222")
        .unwrap_err();
    assert!(matches!(err, CdpError::EndpointDiscoveryFailed { .. }));
}
