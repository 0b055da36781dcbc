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
    set_headers: Vec<(String, String)>,
    vary: Vec<String>,
}

impl CorsResponse for FakeResponse {
    fn set(&mut self, header_name: &str, value: &str) {
        if let Some(entry) = self.set_headers.iter_mut().find(|(n, _)| n == header_name) {
            entry.1 = value.to_string();
        } else {
            self.set_headers.push((header_name.to_string(), value.to_string()));
        }
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
        self.set_headers
            .iter()
            .find(|(n, _)| n == header_name)
            .map(|(_, v)| v.as_str())
    }
}

#[test]
fn non_cors_request_without_origin_gets_no_cors_headers() {
    let policy = CorsPolicy::builder().origin("https://example.com").finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("GET");
    let mut res = FakeResponse::default();
    let decision = cors.wrap(&req, &mut res);

    assert_eq!(decision, Decision::Continue);
    assert!(res.set_headers.is_empty());
    assert_eq!(res.vary, vec!["Origin".to_string()]);
}

#[test]
fn non_cors_request_against_allow_any_origin_sets_acao_star() {
    let policy = CorsPolicy::builder().origin("*").response_header("x-foo").finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("GET");
    let mut res = FakeResponse::default();
    cors.wrap(&req, &mut res);

    assert_eq!(res.get("Access-Control-Allow-Origin"), Some("*"));
    assert_eq!(res.get("Access-Control-Expose-Headers"), Some("x-foo"));
    assert!(res.vary.is_empty());
}

#[test]
fn actual_request_with_credentials_sets_allow_credentials() {
    let policy = CorsPolicy::builder()
        .origin("https://example.com")
        .credentialed(true)
        .response_header("x-foo")
        .finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("GET").header("Origin", "https://example.com");
    let mut res = FakeResponse::default();
    cors.wrap(&req, &mut res);

    assert_eq!(res.get("Access-Control-Allow-Origin"), Some("https://example.com"));
    assert_eq!(res.get("Access-Control-Allow-Credentials"), Some("true"));
    assert_eq!(res.get("Access-Control-Expose-Headers"), Some("x-foo"));
}

#[test]
fn discrete_request_headers_fail_silently_in_non_debug_preflight() {
    let policy = CorsPolicy::builder()
        .origin("https://example.com")
        .request_header("x-allowed")
        .finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("OPTIONS")
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "GET")
        .header("Access-Control-Request-Headers", "x-not-allowed");
    let mut res = FakeResponse::default();
    let decision = cors.wrap(&req, &mut res);

    assert_eq!(decision, Decision::Respond(403));
    assert!(res.set_headers.is_empty());
}

#[test]
fn discrete_request_headers_fail_with_diagnostics_in_debug_preflight() {
    let policy = CorsPolicy::builder()
        .origin("https://example.com")
        .request_header("x-allowed")
        .finish();
    let cors = Cors::new(policy).unwrap();
    cors.set_debug(true);

    let req = FakeRequest::new("OPTIONS")
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "GET")
        .header("Access-Control-Request-Headers", "x-not-allowed");
    let mut res = FakeResponse::default();
    let decision = cors.wrap(&req, &mut res);

    assert_eq!(decision, Decision::Respond(204));
    assert_eq!(res.get("Access-Control-Allow-Origin"), Some("https://example.com"));
    assert_eq!(res.get("Access-Control-Allow-Headers"), Some("x-allowed"));
}

#[test]
fn preflight_without_acrh_never_runs_step_c() {
    let policy = CorsPolicy::builder()
        .origin("https://example.com")
        .request_header("x-allowed")
        .finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("OPTIONS")
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "GET");
    let mut res = FakeResponse::default();
    let decision = cors.wrap(&req, &mut res);

    assert_eq!(decision, Decision::Respond(204));
    assert!(res.get("Access-Control-Allow-Headers").is_none());
}

#[test]
fn unknown_origin_preflight_fails_before_staging_anything() {
    let policy = CorsPolicy::builder().origin("https://example.com").finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("OPTIONS")
        .header("Origin", "https://evil.com")
        .header("Access-Control-Request-Method", "GET");
    let mut res = FakeResponse::default();
    let decision = cors.wrap(&req, &mut res);

    assert_eq!(decision, Decision::Respond(403));
    assert!(res.set_headers.is_empty());
}

#[test]
fn debug_preflight_with_no_precomputed_allow_headers_falls_back_to_204_not_configured_status() {
    let policy = CorsPolicy::builder()
        .origin("https://example.com")
        .preflight_success_status(200)
        .finish();
    let cors = Cors::new(policy).unwrap();
    cors.set_debug(true);

    let req = FakeRequest::new("OPTIONS")
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "GET")
        .header("Access-Control-Request-Headers", "x-whatever");
    let mut res = FakeResponse::default();
    let decision = cors.wrap(&req, &mut res);

    assert_eq!(decision, Decision::Respond(204));
    assert!(res.get("Access-Control-Allow-Headers").is_none());
}

#[test]
fn reconfigure_is_atomic_under_concurrent_wraps() {
    let policy_a = CorsPolicy::builder().origin("https://a.example.com").finish();
    let cors = Cors::new(policy_a).unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..200 {
                let policy_b = CorsPolicy::builder()
                    .origin("https://b.example.com")
                    .credentialed(true)
                    .finish();
                cors.reconfigure(policy_b).unwrap();
                let policy_a = CorsPolicy::builder().origin("https://a.example.com").finish();
                cors.reconfigure(policy_a).unwrap();
            }
        });

        for _ in 0..200 {
            let req = FakeRequest::new("GET").header("Origin", "https://a.example.com");
            let mut res = FakeResponse::default();
            let decision = cors.wrap(&req, &mut res);

            // Whichever snapshot this call observed, the response must be
            // internally consistent with exactly one of the two policies:
            // policy A allows "a.example.com" without credentials, policy B
            // doesn't mention "a.example.com" at all. A torn read (ACAO
            // present alongside policy B's Allow-Credentials) is the one
            // outcome this test would catch.
            assert_eq!(decision, Decision::Continue);
            if let Some(acao) = res.get("Access-Control-Allow-Origin") {
                assert_eq!(acao, "https://a.example.com");
                assert!(res.get("Access-Control-Allow-Credentials").is_none());
            }
        }
    });
}

#[test]
fn custom_preflight_success_status_is_honored() {
    let policy = CorsPolicy::builder()
        .origin("https://example.com")
        .preflight_success_status(200)
        .finish();
    let cors = Cors::new(policy).unwrap();

    let req = FakeRequest::new("OPTIONS")
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "GET");
    let mut res = FakeResponse::default();
    let decision = cors.wrap(&req, &mut res);

    assert_eq!(decision, Decision::Respond(200));
}
