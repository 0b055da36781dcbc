//! Validates a user-supplied [`CorsPolicy`] and compiles it into an
//! immutable [`CompiledCors`] ready for the request path.
//!
//! `build`/`build_with` never stop at the first problem: every applicable
//! [`CorsConfigError`] is collected so a caller sees every violation in one
//! pass, matching how `RipressError`-style crates in this ecosystem tend to
//! report validation failures.

use crate::error::{
    CorsConfigError, CorsConfigErrors, HeaderDirection, HeaderReason, IncompatibleReason,
    MethodReason, OriginPatternReason,
};
use crate::headers::{is_valid_token, HeaderNameSet};
use crate::origin::{
    parse_pattern_with, BuiltinPublicSuffixOracle, HostValidator, OriginPattern, PatternKind,
    PublicSuffixOracle, StrictDnsValidator,
};
use crate::tree::OriginTree;

const FORBIDDEN_METHODS: &[&str] = &["CONNECT", "TRACE", "TRACK"];
const WELL_KNOWN_METHODS: &[&str] = &["DELETE", "GET", "HEAD", "OPTIONS", "POST", "PUT"];
const SAFELISTED_METHODS: &[&str] = &["GET", "HEAD", "POST"];

const FORBIDDEN_REQUEST_HEADERS: &[&str] = &[
    "accept-charset",
    "accept-encoding",
    "access-control-request-headers",
    "access-control-request-method",
    "connection",
    "content-length",
    "cookie",
    "cookie2",
    "date",
    "dnt",
    "expect",
    "host",
    "keep-alive",
    "origin",
    "referer",
    "set-cookie",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "via",
];
const FORBIDDEN_REQUEST_HEADER_PREFIXES: &[&str] = &["proxy-", "sec-"];
const PROHIBITED_REQUEST_HEADER_PREFIX: &str = "access-control-";

const SAFELISTED_RESPONSE_HEADERS: &[&str] = &[
    "cache-control",
    "content-language",
    "content-length",
    "content-type",
    "expires",
    "last-modified",
    "pragma",
];
const FORBIDDEN_RESPONSE_HEADERS: &[&str] = &["set-cookie", "set-cookie2"];
const PROHIBITED_RESPONSE_HEADER_PREFIX: &str = "access-control-request-";

const MAX_AGE_DEFAULT: i64 = 0;
const MAX_AGE_DISABLE: i64 = -1;
const MAX_AGE_MAX: i64 = 86_400;

const PREFLIGHT_STATUS_DEFAULT: i64 = 0;
const PREFLIGHT_STATUS_MIN: i64 = 200;
const PREFLIGHT_STATUS_MAX: i64 = 299;

/// The single precomputed `Vary` value used on every preflight response and
/// on non-preflight `OPTIONS` requests without an `Origin` header.
pub const PREFLIGHT_VARY_VALUE: &str =
    "Access-Control-Request-Headers, Access-Control-Request-Method, Origin";

/// A CORS policy, as an operator would author it.
///
/// Construction only happens through [`CorsPolicyBuilder`] (`CorsPolicy`
/// has no public fields and no positional constructor), and the type
/// intentionally does not derive `PartialEq`/`Eq`: two policies are
/// compared by what they *compile to*, not by structural equality of the
/// authored fields.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: Vec<String>,
    credentialed: bool,
    methods: Vec<String>,
    request_headers: Vec<String>,
    response_headers: Vec<String>,
    max_age_seconds: i64,
    preflight_success_status: i64,
    tolerate_insecure_origins: bool,
    tolerate_public_suffix_subdomains: bool,
}

impl CorsPolicy {
    /// Starts building a policy.
    pub fn builder() -> CorsPolicyBuilder {
        CorsPolicyBuilder::default()
    }
}

/// Builder for [`CorsPolicy`].
#[derive(Debug, Clone, Default)]
pub struct CorsPolicyBuilder {
    origins: Vec<String>,
    credentialed: bool,
    methods: Vec<String>,
    request_headers: Vec<String>,
    response_headers: Vec<String>,
    max_age_seconds: i64,
    preflight_success_status: i64,
    tolerate_insecure_origins: bool,
    tolerate_public_suffix_subdomains: bool,
}

impl CorsPolicyBuilder {
    /// Appends one origin pattern (or `"*"`).
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origins.push(origin.into());
        self
    }

    /// Appends several origin patterns.
    pub fn origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.origins.extend(origins.into_iter().map(Into::into));
        self
    }

    /// Sets whether credentialed (cookie/`Authorization`-bearing) access is allowed.
    pub fn credentialed(mut self, yes: bool) -> Self {
        self.credentialed = yes;
        self
    }

    /// Appends one allowed method (or `"*"`).
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.methods.push(method.into());
        self
    }

    /// Appends several allowed methods.
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods.extend(methods.into_iter().map(Into::into));
        self
    }

    /// Appends one permitted request header (or `"*"`).
    pub fn request_header(mut self, header: impl Into<String>) -> Self {
        self.request_headers.push(header.into());
        self
    }

    /// Appends several permitted request headers.
    pub fn request_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request_headers.extend(headers.into_iter().map(Into::into));
        self
    }

    /// Appends one exposed response header (or `"*"`).
    pub fn response_header(mut self, header: impl Into<String>) -> Self {
        self.response_headers.push(header.into());
        self
    }

    /// Appends several exposed response headers.
    pub fn response_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.response_headers.extend(headers.into_iter().map(Into::into));
        self
    }

    /// Sets `Access-Control-Max-Age` behavior. `0` = default (~5s, no header
    /// emitted); `-1` = disable caching (emits `0`); otherwise seconds, capped at 86400.
    pub fn max_age_seconds(mut self, seconds: i64) -> Self {
        self.max_age_seconds = seconds;
        self
    }

    /// Sets the preflight success status. `0` = default (204).
    pub fn preflight_success_status(mut self, status: i64) -> Self {
        self.preflight_success_status = status;
        self
    }

    /// Allows `http://` origin patterns that are neither loopback nor `localhost`.
    pub fn tolerate_insecure_origins(mut self, yes: bool) -> Self {
        self.tolerate_insecure_origins = yes;
        self
    }

    /// Allows `*.`-wildcard patterns whose base domain is a public suffix.
    pub fn tolerate_public_suffix_subdomains(mut self, yes: bool) -> Self {
        self.tolerate_public_suffix_subdomains = yes;
        self
    }

    /// Finishes the builder into a [`CorsPolicy`]. Does not validate —
    /// validation happens in [`build`].
    pub fn finish(self) -> CorsPolicy {
        CorsPolicy {
            origins: self.origins,
            credentialed: self.credentialed,
            methods: self.methods,
            request_headers: self.request_headers,
            response_headers: self.response_headers,
            max_age_seconds: self.max_age_seconds,
            preflight_success_status: self.preflight_success_status,
            tolerate_insecure_origins: self.tolerate_insecure_origins,
            tolerate_public_suffix_subdomains: self.tolerate_public_suffix_subdomains,
        }
    }
}

/// How `Access-Control-Allow-Headers` is derived for a preflight that
/// carries `Access-Control-Request-Headers`.
#[derive(Debug, Clone)]
pub(crate) enum RequestHeaderPolicy {
    /// `request_headers` contained `*`.
    Asterisk {
        /// Whether `authorization` was also listed explicitly alongside `*`
        /// (meaningful because `*` alone never covers `authorization` under
        /// Fetch once credentials are involved).
        allow_authorization: bool,
    },
    /// An explicit, validated set.
    Discrete(HeaderNameSet),
}

/// The immutable, precomputed result of [`build`]. Cheap to share: every
/// field is either `Copy` or an owned, never-mutated value.
#[derive(Debug, Clone)]
pub struct CompiledCors {
    pub(crate) allow_any_origin: bool,
    pub(crate) tree: OriginTree,
    pub(crate) allow_any_method: bool,
    pub(crate) methods: Vec<Box<str>>,
    pub(crate) request_headers: RequestHeaderPolicy,
    pub(crate) response_headers: Vec<Box<str>>,
    pub(crate) allow_any_response_header: bool,
    pub(crate) expose_headers_value: Option<String>,
    pub(crate) max_age_value: Option<String>,
    pub(crate) preflight_success_status: u16,
    pub(crate) credentialed: bool,
    pub(crate) tolerate_insecure_origins: bool,
    pub(crate) tolerate_public_suffix_subdomains: bool,
}

/// Validates and compiles `policy` using the built-in, dependency-free
/// [`PublicSuffixOracle`] and [`HostValidator`].
pub fn build(policy: &CorsPolicy) -> Result<CompiledCors, CorsConfigErrors> {
    build_with(policy, &BuiltinPublicSuffixOracle, &StrictDnsValidator)
}

/// Like [`build`], with caller-supplied oracles — e.g. a real public-suffix
/// list or full IDNA host validation.
pub fn build_with(
    policy: &CorsPolicy,
    psl: &dyn PublicSuffixOracle,
    host_validator: &dyn HostValidator,
) -> Result<CompiledCors, CorsConfigErrors> {
    let mut errors = Vec::new();

    let (allow_any_origin, parsed_patterns) =
        validate_origins(policy, host_validator, &mut errors);
    let (allow_any_method, methods) = validate_methods(policy, &mut errors);
    let request_headers = validate_request_headers(policy, &mut errors);
    let max_age_value = validate_max_age(policy, &mut errors);
    let (response_headers, allow_any_response_header, expose_headers_value) =
        validate_response_headers(policy, &mut errors);
    let preflight_success_status = validate_preflight_status(policy, &mut errors);

    cross_field_checks(
        policy,
        allow_any_origin,
        allow_any_response_header,
        &parsed_patterns,
        psl,
        &mut errors,
    );

    if !errors.is_empty() {
        #[cfg(feature = "logger")]
        tracing::warn!(error_count = errors.len(), "cors policy failed validation");
        return Err(CorsConfigErrors::new(errors));
    }

    #[cfg(feature = "logger")]
    tracing::debug!(
        allow_any_origin,
        allow_any_method,
        credentialed = policy.credentialed,
        "cors policy compiled"
    );

    let mut tree = OriginTree::new();
    if !allow_any_origin {
        for pattern in &parsed_patterns {
            tree.insert_pattern(pattern);
        }
    }

    Ok(CompiledCors {
        allow_any_origin,
        tree,
        allow_any_method,
        methods,
        request_headers,
        response_headers,
        allow_any_response_header,
        expose_headers_value,
        max_age_value,
        preflight_success_status: preflight_success_status as u16,
        credentialed: policy.credentialed,
        tolerate_insecure_origins: policy.tolerate_insecure_origins,
        tolerate_public_suffix_subdomains: policy.tolerate_public_suffix_subdomains,
    })
}

fn validate_origins(
    policy: &CorsPolicy,
    host_validator: &dyn HostValidator,
    errors: &mut Vec<CorsConfigError>,
) -> (bool, Vec<OriginPattern>) {
    if policy.origins.is_empty() {
        errors.push(CorsConfigError::UnacceptableOriginPattern {
            value: String::new(),
            reason: OriginPatternReason::Missing,
        });
        return (false, Vec::new());
    }

    let has_wildcard = policy.origins.iter().any(|o| o == "*");
    let discrete: Vec<&String> = policy.origins.iter().filter(|o| *o != "*").collect();

    if has_wildcard {
        for extra in &discrete {
            errors.push(CorsConfigError::UnacceptableOriginPattern {
                value: (*extra).clone(),
                reason: OriginPatternReason::Prohibited,
            });
        }
        return (true, Vec::new());
    }

    let mut parsed = Vec::with_capacity(discrete.len());
    for text in &discrete {
        match parse_pattern_with(text, host_validator) {
            Ok(pattern) => parsed.push(pattern),
            Err(_) => errors.push(CorsConfigError::UnacceptableOriginPattern {
                value: (*text).clone(),
                reason: OriginPatternReason::Invalid,
            }),
        }
    }
    (false, parsed)
}

fn is_loopback_or_localhost(pattern: &OriginPattern) -> bool {
    match pattern.kind() {
        PatternKind::LoopbackIp => true,
        PatternKind::ExactDomain | PatternKind::WildcardSubdomains => {
            pattern.host() == "localhost" || pattern.host().ends_with(".localhost")
        }
        PatternKind::NonLoopbackIp => false,
    }
}

fn cross_field_checks(
    policy: &CorsPolicy,
    allow_any_origin: bool,
    allow_any_response_header: bool,
    parsed_patterns: &[OriginPattern],
    psl: &dyn PublicSuffixOracle,
    errors: &mut Vec<CorsConfigError>,
) {
    if allow_any_origin && policy.credentialed {
        errors.push(CorsConfigError::IncompatibleOriginPattern {
            value: "*".to_string(),
            reason: IncompatibleReason::Credentialed,
        });
    }

    for pattern in parsed_patterns {
        if policy.credentialed
            && pattern.scheme() == "http"
            && !is_loopback_or_localhost(pattern)
            && !policy.tolerate_insecure_origins
        {
            errors.push(CorsConfigError::IncompatibleOriginPattern {
                value: pattern.to_pattern_string(),
                reason: IncompatibleReason::Credentialed,
            });
        }

        if matches!(pattern.kind(), PatternKind::WildcardSubdomains)
            && psl.is_public_suffix(pattern.host())
            && !policy.tolerate_public_suffix_subdomains
        {
            errors.push(CorsConfigError::IncompatibleOriginPattern {
                value: pattern.to_pattern_string(),
                reason: IncompatibleReason::PublicSuffix,
            });
        }
    }

    if allow_any_response_header && policy.credentialed {
        errors.push(CorsConfigError::IncompatibleWildcardResponseHeaderName);
    }
}

fn validate_methods(policy: &CorsPolicy, errors: &mut Vec<CorsConfigError>) -> (bool, Vec<Box<str>>) {
    let mut allow_any = false;
    let mut discrete: Vec<Box<str>> = Vec::new();

    for raw in &policy.methods {
        if raw == "*" {
            allow_any = true;
            continue;
        }
        if !is_valid_token(raw) {
            errors.push(CorsConfigError::UnacceptableMethod {
                value: raw.clone(),
                reason: MethodReason::Invalid,
            });
            continue;
        }
        if FORBIDDEN_METHODS.iter().any(|f| raw.eq_ignore_ascii_case(f)) {
            errors.push(CorsConfigError::UnacceptableMethod {
                value: raw.clone(),
                reason: MethodReason::Forbidden,
            });
            continue;
        }
        let normalized = if WELL_KNOWN_METHODS.iter().any(|m| raw.eq_ignore_ascii_case(m)) {
            raw.to_ascii_uppercase()
        } else {
            raw.clone()
        };
        if SAFELISTED_METHODS.contains(&normalized.as_str()) {
            continue;
        }
        if let Err(i) = discrete.binary_search_by(|existing: &Box<str>| existing.as_ref().cmp(normalized.as_str())) {
            discrete.insert(i, normalized.into_boxed_str());
        }
    }

    // `*` alongside discrete entries collapses to allow-any; the discrete
    // entries are then redundant and are dropped rather than rejected,
    // mirroring how safelisted methods are silently dropped just above.
    if allow_any {
        discrete.clear();
    }

    (allow_any, discrete)
}

fn validate_request_headers(policy: &CorsPolicy, errors: &mut Vec<CorsConfigError>) -> RequestHeaderPolicy {
    let mut has_wildcard = false;
    let mut allow_authorization = false;
    let mut set = HeaderNameSet::new();

    for raw in &policy.request_headers {
        if raw == "*" {
            has_wildcard = true;
            continue;
        }
        let lower = raw.to_ascii_lowercase();
        if lower.eq_ignore_ascii_case("authorization") {
            allow_authorization = true;
        }
        if !is_valid_token(&lower) {
            errors.push(CorsConfigError::UnacceptableHeaderName {
                value: raw.clone(),
                direction: HeaderDirection::Request,
                reason: HeaderReason::Invalid,
            });
            continue;
        }
        if FORBIDDEN_REQUEST_HEADERS.contains(&lower.as_str())
            || FORBIDDEN_REQUEST_HEADER_PREFIXES.iter().any(|p| lower.starts_with(p))
        {
            errors.push(CorsConfigError::UnacceptableHeaderName {
                value: raw.clone(),
                direction: HeaderDirection::Request,
                reason: HeaderReason::Forbidden,
            });
            continue;
        }
        if lower.starts_with(PROHIBITED_REQUEST_HEADER_PREFIX) {
            errors.push(CorsConfigError::UnacceptableHeaderName {
                value: raw.clone(),
                direction: HeaderDirection::Request,
                reason: HeaderReason::Prohibited,
            });
            continue;
        }
        let _ = set.insert(&lower);
    }

    if has_wildcard {
        RequestHeaderPolicy::Asterisk { allow_authorization }
    } else {
        RequestHeaderPolicy::Discrete(set)
    }
}

fn validate_response_headers(
    policy: &CorsPolicy,
    errors: &mut Vec<CorsConfigError>,
) -> (Vec<Box<str>>, bool, Option<String>) {
    let mut allow_any = false;
    let mut discrete: Vec<Box<str>> = Vec::new();

    for raw in &policy.response_headers {
        if raw == "*" {
            allow_any = true;
            continue;
        }
        let lower = raw.to_ascii_lowercase();
        if !is_valid_token(&lower) {
            errors.push(CorsConfigError::UnacceptableHeaderName {
                value: raw.clone(),
                direction: HeaderDirection::Response,
                reason: HeaderReason::Invalid,
            });
            continue;
        }
        if SAFELISTED_RESPONSE_HEADERS.contains(&lower.as_str()) {
            continue;
        }
        if FORBIDDEN_RESPONSE_HEADERS.contains(&lower.as_str()) {
            errors.push(CorsConfigError::UnacceptableHeaderName {
                value: raw.clone(),
                direction: HeaderDirection::Response,
                reason: HeaderReason::Forbidden,
            });
            continue;
        }
        if lower.starts_with(PROHIBITED_RESPONSE_HEADER_PREFIX) || lower == "origin" {
            errors.push(CorsConfigError::UnacceptableHeaderName {
                value: raw.clone(),
                direction: HeaderDirection::Response,
                reason: HeaderReason::Prohibited,
            });
            continue;
        }
        if let Err(i) = discrete.binary_search_by(|existing: &Box<str>| existing.as_ref().cmp(lower.as_str())) {
            discrete.insert(i, lower.into_boxed_str());
        }
    }

    let expose_value = if allow_any {
        Some("*".to_string())
    } else if discrete.is_empty() {
        None
    } else {
        Some(discrete.join(","))
    };

    (discrete, allow_any, expose_value)
}

/// The number of seconds a preflight response is cacheable when a policy
/// leaves `max_age_seconds` at its `0` ("default") sentinel.
const MAX_AGE_DEFAULT_SECONDS: i64 = 5;

fn validate_max_age(policy: &CorsPolicy, errors: &mut Vec<CorsConfigError>) -> Option<String> {
    let v = policy.max_age_seconds;
    if v < MAX_AGE_DISABLE || v > MAX_AGE_MAX {
        errors.push(CorsConfigError::MaxAgeOutOfBounds { value: v });
        return None;
    }
    if v == MAX_AGE_DEFAULT {
        Some(MAX_AGE_DEFAULT_SECONDS.to_string())
    } else if v == MAX_AGE_DISABLE {
        Some("0".to_string())
    } else {
        Some(v.to_string())
    }
}

fn validate_preflight_status(policy: &CorsPolicy, errors: &mut Vec<CorsConfigError>) -> i64 {
    let v = policy.preflight_success_status;
    if v == PREFLIGHT_STATUS_DEFAULT {
        return 204;
    }
    if !(PREFLIGHT_STATUS_MIN..=PREFLIGHT_STATUS_MAX).contains(&v) {
        errors.push(CorsConfigError::PreflightSuccessStatusOutOfBounds { value: v });
        return 204;
    }
    v
}

/// Reconstructs a canonical, normalized [`CorsPolicy`] from a compiled
/// configuration (the `config()` readback of spec §4.F). Enumeration order
/// of `origins` follows the tree's stable DFS order (see
/// [`crate::tree::OriginTree::elems`]) — documented as stable, not as any
/// externally meaningful total order.
pub(crate) fn readback(compiled: &CompiledCors) -> CorsPolicy {
    let origins = if compiled.allow_any_origin {
        vec!["*".to_string()]
    } else {
        compiled
            .tree
            .elems()
            .into_iter()
            .map(|e| {
                let host = if e.wildcard_subdomains {
                    format!("*.{}", e.host)
                } else {
                    e.host
                };
                let host = if host.contains(':') && !host.starts_with('[') {
                    format!("[{host}]")
                } else {
                    host
                };
                match e.port {
                    None => format!("{}://{}", e.scheme, host),
                    Some(None) => format!("{}://{}:*", e.scheme, host),
                    Some(Some(p)) => format!("{}://{}:{}", e.scheme, host, p),
                }
            })
            .collect()
    };

    let methods = if compiled.allow_any_method {
        vec!["*".to_string()]
    } else {
        compiled.methods.iter().map(|m| m.to_string()).collect()
    };

    let request_headers = match &compiled.request_headers {
        RequestHeaderPolicy::Asterisk { allow_authorization } => {
            let mut v = vec!["*".to_string()];
            if *allow_authorization {
                v.push("authorization".to_string());
            }
            v
        }
        RequestHeaderPolicy::Discrete(set) => set.iter().map(str::to_string).collect(),
    };

    let response_headers = if compiled.allow_any_response_header {
        vec!["*".to_string()]
    } else {
        compiled.response_headers.iter().map(|h| h.to_string()).collect()
    };

    CorsPolicy {
        origins,
        credentialed: compiled.credentialed,
        methods,
        request_headers,
        response_headers,
        max_age_seconds: match &compiled.max_age_value {
            None => 0,
            Some(s) if s == "0" => -1,
            Some(s) => s.parse().unwrap_or(0),
        },
        preflight_success_status: compiled.preflight_success_status as i64,
        tolerate_insecure_origins: compiled.tolerate_insecure_origins,
        tolerate_public_suffix_subdomains: compiled.tolerate_public_suffix_subdomains,
    }
}
