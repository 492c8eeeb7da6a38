use crate::error::CdpError;

#[test]
fn test_protocol_error_display() {
    let err = CdpError::Protocol {
        code: -32601,
        message: "'Foo.bar' wasn't found".to_string(),
    };
    let text = err.to_string();
    assert!(text.contains("-32601"));
    assert!(text.contains("Foo.bar"));
}

#[test]
fn test_tungstenite_closed_maps_to_connection_lost() {
    let err: CdpError = tokio_tungstenite::tungstenite::Error::ConnectionClosed.into();
    assert!(matches!(err, CdpError::ConnectionLost));
}

#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: CdpError = json_err.into();
    assert!(matches!(err, CdpError::Json(_)));
}

#[test]
fn test_discovery_failure_display_names_endpoint() {
    let err = CdpError::EndpointDiscoveryFailed {
        url: "http://127.0.0.1:9222".to_string(),
        reason: "HTTP status 500".to_string(),
    };
    assert!(err.to_string().contains("http://127.0.0.1:9222"));
}
