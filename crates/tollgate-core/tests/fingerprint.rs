use serde_json::json;
use tollgate_core::{Fingerprint, GateRequest, RequestClass};

#[test]
fn same_inputs_same_fingerprint() {
    let a = Fingerprint::compute("draft a welcome email", &json!({"tenant": "acme"}));
    let b = Fingerprint::compute("draft a welcome email", &json!({"tenant": "acme"}));
    assert_eq!(a, b);
}

#[test]
fn different_text_different_fingerprint() {
    let a = Fingerprint::compute("draft a welcome email", &json!(null));
    let b = Fingerprint::compute("draft a farewell email", &json!(null));
    assert_ne!(a, b);
}

#[test]
fn different_context_different_fingerprint() {
    let a = Fingerprint::compute("draft", &json!({"tenant": "acme"}));
    let b = Fingerprint::compute("draft", &json!({"tenant": "globex"}));
    assert_ne!(a, b);
}

#[test]
fn context_key_order_does_not_matter() {
    // serde_json maps serialize with sorted keys, so construction order is
    // irrelevant to the digest.
    let a = Fingerprint::compute("draft", &json!({"a": 1, "b": 2}));
    let b = Fingerprint::compute("draft", &json!({"b": 2, "a": 1}));
    assert_eq!(a, b);
}

#[test]
fn fingerprint_is_hex_sha256() {
    let fp = Fingerprint::compute("hello", &json!(null));
    assert_eq!(fp.as_str().len(), 64);
    assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn request_fingerprint_uses_text_and_context() {
    let a = GateRequest::new(RequestClass::Cheap, "summarize q3 report")
        .with_context(json!({"doc": "q3"}));
    let b = GateRequest::new(RequestClass::Expensive, "summarize q3 report")
        .with_context(json!({"doc": "q3"}));
    // The class does not participate in the fingerprint; content does.
    assert_eq!(a.fingerprint(), b.fingerprint());

    let c = GateRequest::cheap("summarize q3 report").with_context(json!({"doc": "q4"}));
    assert_ne!(a.fingerprint(), c.fingerprint());
}
