use crate::classify::{Classification, RoutePolicy};

#[test]
fn test_standard_cdp_domains_route_to_browser() {
    let policy = RoutePolicy;
    for method in [
        "Browser.getVersion",
        "Target.createTarget",
        "Page.navigate",
        "Runtime.evaluate",
        "DOM.getDocument",
        "Network.enable",
        "Security.disable",
    ] {
        assert_eq!(
            policy.classify(method),
            Classification::Browser,
            "{method} should route to the browser"
        );
    }
}

#[test]
fn test_unknown_dotted_domain_still_routes_to_browser() {
    assert_eq!(RoutePolicy.classify("Foo.bar"), Classification::Browser);
}

#[test]
fn test_agent_method_table_routes_to_agent() {
    let policy = RoutePolicy;
    for method in policy.agent_methods() {
        assert_eq!(
            policy.classify(method),
            Classification::Agent,
            "{method} should route to the agent"
        );
    }
}

#[test]
fn test_undotted_unknown_method_is_unsupported() {
    assert_eq!(
        RoutePolicy.classify("open_sesame"),
        Classification::Unsupported
    );
    assert_eq!(RoutePolicy.classify(""), Classification::Unsupported);
}

#[test]
fn test_fallback_allow_list_is_minimal() {
    let policy = RoutePolicy;
    assert!(policy.browser_fallback_to_agent("Browser.getVersion"));
    assert!(policy.browser_fallback_to_agent("Target.createTarget"));
    assert!(!policy.browser_fallback_to_agent("Page.navigate"));
    assert!(!policy.browser_fallback_to_agent("list_tabs"));
    assert_eq!(policy.fallback_methods().len(), 2);
}

#[test]
fn test_agent_methods_never_contain_dots() {
    // The dotted rule fires first, so a dotted entry in the agent table
    // would be unreachable.
    for method in RoutePolicy.agent_methods() {
        assert!(!method.contains('.'), "{method} would be shadowed");
    }
}
