use serde_json::{Value, json};

use crate::envelope::{AgentResponse, CdpEnvelope, FromAgent, ToAgent, id_key};

#[test]
fn test_welcome_serialization() {
    let msg = ToAgent::Welcome {
        message: "bridge connected".to_string(),
        timestamp: 1_700_000_000_000,
    };
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"type\":\"welcome\""));
    assert!(json.contains("\"timestamp\":1700000000000"));
}

#[test]
fn test_ping_serialization() {
    let msg = ToAgent::Ping {
        timestamp: 1_700_000_000_000,
    };
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"type\":\"ping\""));
}

#[test]
fn test_command_envelope_preserves_string_id() {
    let msg = ToAgent::Command {
        id: json!("abc"),
        method: "list_tabs".to_string(),
        params: json!({}),
    };
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"type\":\"brop_command\""));
    assert!(json.contains("\"id\":\"abc\""));
    assert!(json.contains("\"method\":\"list_tabs\""));
}

#[test]
fn test_cdp_envelope_tag_and_fields() {
    let original = json!({"id": 2, "method": "Target.createTarget", "params": {"url": "about:blank"}});
    let msg = ToAgent::Cdp(CdpEnvelope {
        connection_id: 7,
        id: 2,
        method: "Target.createTarget".to_string(),
        params: Some(json!({"url": "about:blank"})),
        session_id: None,
        original_command: original,
        degraded: Some(true),
    });

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"type\":\"BROP_CDP\""));
    assert!(json.contains("\"connectionId\":7"));
    assert!(json.contains("\"id\":2"));
    assert!(json.contains("\"originalCommand\""));
    assert!(json.contains("\"degraded\":true"));
    assert!(!json.contains("sessionId"));
}

#[test]
fn test_cdp_envelope_omits_degraded_by_default() {
    let msg = ToAgent::Cdp(CdpEnvelope {
        connection_id: 1,
        id: 9,
        method: "screenshot".to_string(),
        params: None,
        session_id: Some("SESS".to_string()),
        original_command: json!({"id": 9, "method": "screenshot"}),
        degraded: None,
    });
    let json = serde_json::to_string(&msg).unwrap();
    assert!(!json.contains("degraded"));
    assert!(json.contains("\"sessionId\":\"SESS\""));
}

#[test]
fn test_from_agent_pong() {
    let msg: FromAgent = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
    assert!(matches!(msg, FromAgent::Pong));
}

#[test]
fn test_from_agent_pong_with_extra_fields() {
    let msg: FromAgent =
        serde_json::from_str(r#"{"type":"pong","timestamp":123}"#).unwrap();
    assert!(matches!(msg, FromAgent::Pong));
}

#[test]
fn test_from_agent_native_response() {
    let msg: FromAgent = serde_json::from_str(
        r#"{"type":"response","id":"abc","success":true,"result":{"tabs":[]}}"#,
    )
    .unwrap();
    let FromAgent::Response(resp) = msg else {
        panic!("expected response");
    };
    assert_eq!(resp.id, json!("abc"));
    assert_eq!(resp.success, Some(true));
    assert!(resp.result.is_some());
}

#[test]
fn test_from_agent_cdp_response_has_no_success() {
    let msg: FromAgent =
        serde_json::from_str(r#"{"type":"response","id":2,"result":{"targetId":"tab_42"}}"#)
            .unwrap();
    let FromAgent::Response(resp) = msg else {
        panic!("expected response");
    };
    assert_eq!(resp.id, json!(2));
    assert_eq!(resp.success, None);
}

#[test]
fn test_from_agent_event() {
    let msg: FromAgent = serde_json::from_str(
        r#"{"type":"cdp_event","method":"Target.targetCreated","params":{"targetInfo":{}}}"#,
    )
    .unwrap();
    let FromAgent::CdpEvent(evt) = msg else {
        panic!("expected event");
    };
    assert_eq!(evt.method, "Target.targetCreated");
}

#[test]
fn test_type_tag_is_authoritative_over_shape() {
    // An event that leaked an id still deserializes as an event; the tag
    // decides, not the field shape.
    let msg: FromAgent = serde_json::from_str(
        r#"{"type":"cdp_event","id":5,"method":"Page.loadEventFired","params":{}}"#,
    )
    .unwrap();
    assert!(matches!(msg, FromAgent::CdpEvent(_)));
}

#[test]
fn test_unknown_type_is_rejected() {
    let result = serde_json::from_str::<FromAgent>(r#"{"type":"mystery"}"#);
    assert!(result.is_err());
}

#[test]
fn test_agent_error_can_be_string_or_object() {
    let string_err: AgentResponse =
        serde_json::from_str(r#"{"id":1,"error":"tab not found"}"#).unwrap();
    assert_eq!(string_err.error, Some(json!("tab not found")));

    let object_err: AgentResponse =
        serde_json::from_str(r#"{"id":1,"error":{"code":-32000,"message":"boom"}}"#).unwrap();
    assert_eq!(
        object_err.error.unwrap().get("code").cloned(),
        Some(json!(-32000))
    );
}

#[test]
fn test_id_key_distinguishes_string_and_number() {
    assert_ne!(id_key(&json!(5)), id_key(&json!("5")));
    assert_eq!(id_key(&json!(5)), "5");
    assert_eq!(id_key(&Value::String("abc".to_string())), "\"abc\"");
}
