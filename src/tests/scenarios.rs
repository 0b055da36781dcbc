//! End-to-end scenarios pinned from the design's testable-properties list.

use std::collections::BTreeMap;

use crate::config::CorsPolicy;
use crate::middleware::{Cors, Decision};
use crate::request::CorsRequest;
use crate::response::CorsResponse;

#[derive(Debug, Clone, Default)]
struct FakeRequest {
    method: String,
    headers: Vec<(String, String)>,
}

impl FakeRequest {
    fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            headers: Vec::new(),
        }
    }

    fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

impl CorsRequest for FakeRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn header(&self, header_name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(header_name))
            .map(|(_, v)| v.as_str())
    }

    fn header_all(&self, header_name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(header_name))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
struct FakeResponse {
    set_headers: BTreeMap<String, String>,
    vary: Vec<String>,
}

impl CorsResponse for FakeResponse {
    fn set(&mut self, header_name: &str, value: &str) {
        self.set_headers.insert(header_name.to_string(), value.to_string());
    }

    fn append(&mut self, header_name: &str, value: &str) {
        if header_name.eq_ignore_ascii_case("vary") {
            self.vary.push(value.to_string());
        } else {
            self.set(header_name, value);
        }
    }
}

impl FakeResponse {
    fn get(&self, header_name: &str) -> Option<&str> {
        self.set_headers.get(header_name).map(String::as_str)
    }
}

const PREFLIGHT_VARY: &str = "Access-Control-Request-Headers, Access-Control-Request-Method, Origin";

#[test]
fn s1_simple_allow() {
    let policy = CorsPolicy::builder()
        .origin("https://example.com")
        .method("POST")
        .request_header("Authorization")
        .finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("OPTIONS")
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "authorization");
    let mut res = FakeResponse::default();
    let decision = cors.wrap(&req, &mut res);

    assert_eq!(decision, Decision::Respond(204));
    assert_eq!(res.get("Access-Control-Allow-Origin"), Some("https://example.com"));
    assert_eq!(res.get("Access-Control-Allow-Headers"), Some("authorization"));
    assert_eq!(res.get("Access-Control-Max-Age"), Some("5"));
    assert_eq!(res.vary, vec![PREFLIGHT_VARY.to_string()]);
}

#[test]
fn s2_wildcard_subdomains_actual_request() {
    let policy = CorsPolicy::builder().origin("https://*.example.com").finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("GET").header("Origin", "https://a.b.example.com");
    let mut res = FakeResponse::default();
    let decision = cors.wrap(&req, &mut res);

    assert_eq!(decision, Decision::Continue);
    assert_eq!(
        res.get("Access-Control-Allow-Origin"),
        Some("https://a.b.example.com")
    );
    assert_eq!(res.vary, vec!["Origin".to_string()]);
}

#[test]
fn s3_suffix_attack_is_rejected() {
    let policy = CorsPolicy::builder()
        .origins(["https://foo.com", "https://bar.com"])
        .finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("GET").header("Origin", "https://barfoo.com");
    let mut res = FakeResponse::default();
    let decision = cors.wrap(&req, &mut res);

    assert_eq!(decision, Decision::Continue);
    assert!(res.get("Access-Control-Allow-Origin").is_none());
    assert_eq!(res.vary, vec!["Origin".to_string()]);
}

#[test]
fn s4_credentialed_wildcard_request_headers_echo_verbatim() {
    let policy = CorsPolicy::builder()
        .origin("https://example.com")
        .credentialed(true)
        .request_header("*")
        .finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("OPTIONS")
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "GET")
        .header("Access-Control-Request-Headers", "x-foo, x-bar");
    let mut res = FakeResponse::default();
    cors.wrap(&req, &mut res);

    assert_eq!(res.get("Access-Control-Allow-Headers"), Some("x-foo, x-bar"));
    assert_eq!(res.get("Access-Control-Allow-Credentials"), Some("true"));
}

#[test]
fn s5_non_debug_failure_silences_all_cors() {
    let policy = CorsPolicy::builder()
        .origin("https://example.com")
        .method("GET")
        .finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("OPTIONS")
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "PUT");
    let mut res = FakeResponse::default();
    let decision = cors.wrap(&req, &mut res);

    assert_eq!(decision, Decision::Respond(403));
    assert!(res.set_headers.is_empty());
    assert_eq!(res.vary, vec![PREFLIGHT_VARY.to_string()]);
}

#[test]
fn s6_debug_failure_preserves_diagnostics() {
    let policy = CorsPolicy::builder()
        .origin("https://example.com")
        .method("GET")
        .finish();
    let cors = Cors::new(policy).unwrap();
    cors.set_debug(true);

    let req = FakeRequest::new("OPTIONS")
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "PUT");
    let mut res = FakeResponse::default();
    let decision = cors.wrap(&req, &mut res);

    assert_eq!(decision, Decision::Respond(204));
    assert_eq!(res.get("Access-Control-Allow-Origin"), Some("https://example.com"));
    assert!(res.get("Access-Control-Allow-Methods").is_none());
    assert_eq!(res.vary, vec![PREFLIGHT_VARY.to_string()]);
}

#[test]
fn s7_safelisted_response_headers_dropped_from_readback() {
    let policy = CorsPolicy::builder()
        .origin("http://example.com")
        .response_headers(["Content-Type", "X-Foo"])
        .finish();
    let cors = Cors::new(policy).unwrap();
    let readback = cors.config().unwrap();
    let recompiled = crate::config::build(&readback).unwrap();
    let headers: Vec<String> = recompiled.response_headers.iter().map(|h| h.to_string()).collect();
    assert_eq!(headers, vec!["x-foo".to_string()]);
}

#[test]
fn safelisted_acrm_never_produces_allow_methods_header() {
    // Invariant 5 takes precedence over scenario S1's literal example line,
    // which names a safelisted method (POST) as its Access-Control-Request-Method;
    // a request whose ACRM is GET/HEAD/POST must never see
    // Access-Control-Allow-Methods, matching both §4.E step b and this
    // quantified invariant.
    let policy = CorsPolicy::builder()
        .origin("https://example.com")
        .method("POST")
        .finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("OPTIONS")
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "POST");
    let mut res = FakeResponse::default();
    cors.wrap(&req, &mut res);

    assert!(res.get("Access-Control-Allow-Methods").is_none());
}

#[test]
fn default_handle_is_a_passthrough() {
    let cors = Cors::default();
    let req = FakeRequest::new("OPTIONS")
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "GET");
    let mut res = FakeResponse::default();
    let decision = cors.wrap(&req, &mut res);
    assert_eq!(decision, Decision::Continue);
    assert!(res.set_headers.is_empty());
    assert!(res.vary.is_empty());
    assert!(cors.config().is_none());
}

#[test]
fn reconfigure_swaps_in_a_new_policy() {
    let policy = CorsPolicy::builder().origin("https://example.com").finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("GET").header("Origin", "https://other.com");
    let mut res = FakeResponse::default();
    cors.wrap(&req, &mut res);
    assert!(res.get("Access-Control-Allow-Origin").is_none());

    cors.reconfigure(CorsPolicy::builder().origin("https://other.com").finish())
        .unwrap();

    let mut res2 = FakeResponse::default();
    cors.wrap(&req, &mut res2);
    assert_eq!(res2.get("Access-Control-Allow-Origin"), Some("https://other.com"));
}

#[test]
fn reconfigure_failure_leaves_handle_unchanged() {
    let policy = CorsPolicy::builder().origin("https://example.com").finish();
    let cors = Cors::new(policy).unwrap();

    let bad = CorsPolicy::builder().finish(); // no origins: invalid
    assert!(cors.reconfigure(bad).is_err());

    let req = FakeRequest::new("GET").header("Origin", "https://example.com");
    let mut res = FakeResponse::default();
    cors.wrap(&req, &mut res);
    assert_eq!(res.get("Access-Control-Allow-Origin"), Some("https://example.com"));
}
