//! Parsing for origin *patterns* (the strict, admin-authored side of a
//! policy's `origins` list) and for the `Origin` header of an incoming
//! request (the lenient, browser-authored side).
//!
//! The two parsers intentionally diverge in strictness: a pattern is
//! something an operator wrote by hand and gets validated hard at
//! configuration time, while an `Origin` header is produced by a browser's
//! own serializer and is trusted not to need re-validating to the same
//! degree — see spec §4.B.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Sentinel port value meaning "any port" (pre-offset, see [`crate::tree`]).
pub const WILDCARD_PORT: i32 = -1;

/// Maximum length, in bytes, of a scheme token.
const MAX_SCHEME_LEN: usize = 64;
/// Maximum length, in bytes, of the `host[:port]` portion of an `Origin`
/// header value (253 for the host plus `:` plus up to 5 digits).
const MAX_HOSTPORT_LEN: usize = 253 + 1 + 5;

/// Oracle answering whether a domain is its own effective top-level domain
/// (a "public suffix" — a domain under which any party may register a
/// subdomain, e.g. `com`, `github.io`).
///
/// The default implementation recognizes a small, hand-maintained set of
/// widely-known public suffixes. It is not a substitute for the real
/// Mozilla Public Suffix List; callers with stricter requirements should
/// supply their own oracle (e.g. backed by the `publicsuffix` crate).
pub trait PublicSuffixOracle {
    /// Reports whether `domain` (lowercase ASCII, no trailing dot) equals
    /// its own public suffix.
    fn is_public_suffix(&self, domain: &str) -> bool;
}

/// A small, dependency-free [`PublicSuffixOracle`] covering the handful of
/// suffixes most likely to appear in real-world wildcard-subdomain
/// misconfigurations.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPublicSuffixOracle;

const BUILTIN_PUBLIC_SUFFIXES: &[&str] = &[
    "com", "org", "net", "edu", "gov", "io", "dev", "app",
    "co", "co.uk", "org.uk", "gov.uk",
    "github.io", "gitlab.io", "pages.dev", "vercel.app", "netlify.app",
    "herokuapp.com", "s3.amazonaws.com", "blogspot.com", "web.app",
];

impl PublicSuffixOracle for BuiltinPublicSuffixOracle {
    fn is_public_suffix(&self, domain: &str) -> bool {
        BUILTIN_PUBLIC_SUFFIXES.iter().any(|s| *s == domain)
    }
}

/// Validator for DNS host syntax under strict ASCII rules (the "IDNA/ASCII
/// host validator" external collaborator of spec §1).
pub trait HostValidator {
    /// Reports whether every label of `domain` is a valid DNS label.
    fn is_valid_host(&self, domain: &str) -> bool;
}

/// The default [`HostValidator`]: each label is 1-63 bytes, ASCII
/// alphanumeric or `-`, and does not start or end with `-`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictDnsValidator;

impl HostValidator for StrictDnsValidator {
    fn is_valid_host(&self, domain: &str) -> bool {
        let trimmed = domain.strip_suffix('.').unwrap_or(domain);
        if trimmed.is_empty() {
            return false;
        }
        trimmed.split('.').all(|label| is_valid_dns_label(label))
    }
}

fn is_valid_dns_label(label: &str) -> bool {
    if label.is_empty() || label.len() > 63 {
        return false;
    }
    let bytes = label.as_bytes();
    if bytes[0] == b'-' || bytes[bytes.len() - 1] == b'-' {
        return false;
    }
    bytes
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'-')
}

/// The shape of a parsed origin pattern's host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternKind {
    /// A single fully-qualified domain, e.g. `example.com`.
    ExactDomain,
    /// `*.` followed by a domain; matches one or more subdomain labels.
    WildcardSubdomains,
    /// A loopback address: IPv4 `127.0.0.0/8`, or IPv6 `::1`.
    LoopbackIp,
    /// Any other literal IPv4 or IPv6 address.
    NonLoopbackIp,
}

/// A port requirement in a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSpec {
    /// No port was specified; matches only the scheme's implicit port.
    Absent,
    /// An explicit port number.
    Exact(u16),
    /// `*`: matches any port.
    Wildcard,
}

/// A parsed, validated origin pattern (spec §3 "Origin-pattern").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPattern {
    pub(crate) scheme: String,
    pub(crate) kind: PatternKind,
    /// For `ExactDomain`/`WildcardSubdomains`: the domain, without a `*.`
    /// prefix. For the IP kinds: the canonical textual address.
    pub(crate) host: String,
    pub(crate) port: PortSpec,
}

impl OriginPattern {
    /// The pattern's scheme (always lowercase ASCII).
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The pattern's host classification.
    pub fn kind(&self) -> &PatternKind {
        &self.kind
    }

    /// The pattern's host text (see field docs on [`OriginPattern`]).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The pattern's port requirement.
    pub fn port(&self) -> PortSpec {
        self.port
    }

    /// Whether this pattern's host is an IPv4 or IPv6 literal.
    pub fn is_ip(&self) -> bool {
        matches!(self.kind, PatternKind::LoopbackIp | PatternKind::NonLoopbackIp)
    }

    /// Reconstructs the canonical `scheme://host[:port]` text for this
    /// pattern (used by `config()` readback).
    pub fn to_pattern_string(&self) -> String {
        let host_part = match self.kind {
            PatternKind::WildcardSubdomains => format!("*.{}", self.host),
            PatternKind::NonLoopbackIp | PatternKind::LoopbackIp if self.host.contains(':') => {
                format!("[{}]", self.host)
            }
            _ => self.host.clone(),
        };
        match self.port {
            PortSpec::Absent => format!("{}://{}", self.scheme, host_part),
            PortSpec::Exact(p) => format!("{}://{}:{}", self.scheme, host_part, p),
            PortSpec::Wildcard => format!("{}://{}:*", self.scheme, host_part),
        }
    }
}

/// Why [`parse_pattern`] rejected a candidate pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternParseError {
    /// Scheme is empty, too long, not lowercase-ASCII-token shaped, or `file`.
    InvalidScheme,
    /// Host is empty, non-ASCII, contains whitespace, has empty labels,
    /// fails DNS label grammar, or is an invalid/disallowed IP literal.
    InvalidHost,
    /// An explicit port equal to the scheme's default port (80 for `http`,
    /// 443 for `https`) was given.
    DefaultPort,
    /// The pattern contains a path, query, fragment, userinfo, or embedded
    /// whitespace, or is the literal string `null`.
    Malformed,
    /// The pattern text exceeds the length bound.
    TooLong,
}

/// Parses and strictly validates an origin-pattern string (spec §4.B
/// `parse_pattern`).
pub fn parse_pattern(text: &str) -> Result<OriginPattern, PatternParseError> {
    parse_pattern_with(text, &StrictDnsValidator)
}

/// Like [`parse_pattern`], but with a caller-supplied [`HostValidator`] for
/// the exact-domain / wildcard-subdomains case.
pub fn parse_pattern_with(
    text: &str,
    host_validator: &dyn HostValidator,
) -> Result<OriginPattern, PatternParseError> {
    if text.len() > 512 || text == "null" {
        return Err(PatternParseError::Malformed);
    }
    if text.bytes().any(|b| b.is_ascii_whitespace()) {
        return Err(PatternParseError::Malformed);
    }
    let (scheme, rest) = split_scheme(text).ok_or(PatternParseError::Malformed)?;
    validate_scheme(scheme)?;
    if rest.bytes().any(|b| matches!(b, b'/' | b'?' | b'#' | b'@')) {
        return Err(PatternParseError::Malformed);
    }

    let (host_raw, port_raw) = split_host_port(rest).ok_or(PatternParseError::InvalidHost)?;
    let port = parse_port_spec(port_raw).ok_or(PatternParseError::InvalidHost)?;

    if let PortSpec::Exact(p) = port {
        let default_port = match scheme {
            "http" => Some(80),
            "https" => Some(443),
            _ => None,
        };
        if Some(p) == default_port {
            return Err(PatternParseError::DefaultPort);
        }
    }

    let (kind, host) = classify_host(host_raw, host_validator)?;

    if matches!(kind, PatternKind::LoopbackIp | PatternKind::NonLoopbackIp)
        && matches!(port, PortSpec::Wildcard)
    {
        return Err(PatternParseError::InvalidHost);
    }

    Ok(OriginPattern {
        scheme: scheme.to_string(),
        kind,
        host,
        port,
    })
}

fn split_scheme(text: &str) -> Option<(&str, &str)> {
    let idx = text.find("://")?;
    Some((&text[..idx], &text[idx + 3..]))
}

fn validate_scheme(scheme: &str) -> Result<(), PatternParseError> {
    if scheme.is_empty() || scheme.len() > MAX_SCHEME_LEN {
        return Err(PatternParseError::InvalidScheme);
    }
    if scheme.eq_ignore_ascii_case("file") {
        return Err(PatternParseError::InvalidScheme);
    }
    let bytes = scheme.as_bytes();
    if !bytes[0].is_ascii_lowercase() {
        return Err(PatternParseError::InvalidScheme);
    }
    if !bytes
        .iter()
        .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'+' | b'.' | b'-' | b'_'))
    {
        return Err(PatternParseError::InvalidScheme);
    }
    Ok(())
}

/// Splits `rest` (the text after `scheme://`) into `(host, port)`, honoring
/// `[...]` bracket notation for IPv6 hosts.
fn split_host_port(rest: &str) -> Option<(&str, Option<&str>)> {
    if let Some(inner) = rest.strip_prefix('[') {
        let close = inner.find(']')?;
        let host = &inner[..close];
        let tail = &inner[close + 1..];
        if tail.is_empty() {
            return Some((host, None));
        }
        let port = tail.strip_prefix(':')?;
        return Some((host, Some(port)));
    }
    match rest.rfind(':') {
        None => Some((rest, None)),
        Some(idx) => {
            let host = &rest[..idx];
            let port = &rest[idx + 1..];
            // An unbracketed host with more than one ':' is ambiguous with a
            // bare (unbracketed) IPv6 literal and is rejected rather than
            // guessed at.
            if host.contains(':') {
                return None;
            }
            Some((host, Some(port)))
        }
    }
}

fn parse_port_spec(port_raw: Option<&str>) -> Option<PortSpec> {
    match port_raw {
        None => Some(PortSpec::Absent),
        Some("*") => Some(PortSpec::Wildcard),
        Some(digits) => parse_port_number(digits).map(PortSpec::Exact),
    }
}

/// Parses a decimal port number per spec §4.B: first digit `1..9`,
/// subsequent digits up to five total, result in `[1, 65535]`.
pub fn parse_port_number(digits: &str) -> Option<u16> {
    if digits.is_empty() || digits.len() > 5 {
        return None;
    }
    let bytes = digits.as_bytes();
    if !(b'1'..=b'9').contains(&bytes[0]) {
        return None;
    }
    if !bytes[1..].iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|&p| p <= 65535).map(|p| p as u16)
}

fn classify_host(
    host_raw: &str,
    host_validator: &dyn HostValidator,
) -> Result<(PatternKind, String), PatternParseError> {
    if host_raw.is_empty() {
        return Err(PatternParseError::InvalidHost);
    }
    if host_raw.contains(':') {
        return classify_ipv6(host_raw);
    }
    if looks_like_ipv4(host_raw) {
        return classify_ipv4(host_raw);
    }
    classify_domain(host_raw, host_validator)
}

/// Heuristic from spec §4.B: if the rightmost non-empty label begins with a
/// digit, assume IPv4 — no real TLD starts with a digit.
fn looks_like_ipv4(host: &str) -> bool {
    host.split('.')
        .filter(|l| !l.is_empty())
        .next_back()
        .and_then(|l| l.bytes().next())
        .is_some_and(|b| b.is_ascii_digit())
}

fn classify_ipv4(host: &str) -> Result<(PatternKind, String), PatternParseError> {
    let addr: Ipv4Addr = host.parse().map_err(|_| PatternParseError::InvalidHost)?;
    if addr.to_string() != host {
        // Rejects leading zeros, non-dotted-quad shorthand, etc.
        return Err(PatternParseError::InvalidHost);
    }
    let kind = if addr.octets()[0] == 127 {
        PatternKind::LoopbackIp
    } else {
        PatternKind::NonLoopbackIp
    };
    Ok((kind, host.to_string()))
}

fn classify_ipv6(host: &str) -> Result<(PatternKind, String), PatternParseError> {
    if host.contains('%') {
        return Err(PatternParseError::InvalidHost); // zoned
    }
    let addr: Ipv6Addr = host.parse().map_err(|_| PatternParseError::InvalidHost)?;
    if addr.to_ipv4_mapped().is_some() || is_ipv4_compatible(&addr) {
        return Err(PatternParseError::InvalidHost);
    }
    if addr.to_string() != host {
        // Rejects uncompressed / non-canonical textual forms.
        return Err(PatternParseError::InvalidHost);
    }
    let kind = if addr.is_loopback() {
        PatternKind::LoopbackIp
    } else {
        PatternKind::NonLoopbackIp
    };
    Ok((kind, host.to_string()))
}

/// The deprecated `::a.b.c.d` IPv4-compatible form: top 96 bits zero, but
/// not the unspecified (`::`) or loopback (`::1`) address.
fn is_ipv4_compatible(addr: &Ipv6Addr) -> bool {
    let segs = addr.segments();
    segs[0..5] == [0, 0, 0, 0, 0] && segs[5] == 0 && segs[6..8] != [0, 0] && segs[6..8] != [0, 1]
}

fn classify_domain(
    host_raw: &str,
    host_validator: &dyn HostValidator,
) -> Result<(PatternKind, String), PatternParseError> {
    if host_raw.bytes().any(|b| !b.is_ascii()) {
        return Err(PatternParseError::InvalidHost);
    }
    if host_raw.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(PatternParseError::InvalidHost);
    }

    if let Some(base) = host_raw.strip_prefix("*.") {
        if base.is_empty() || base.starts_with('.') {
            return Err(PatternParseError::InvalidHost);
        }
        validate_labels(base)?;
        if !host_validator.is_valid_host(base) {
            return Err(PatternParseError::InvalidHost);
        }
        return Ok((PatternKind::WildcardSubdomains, base.to_string()));
    }

    validate_labels(host_raw)?;
    if !host_validator.is_valid_host(host_raw) {
        return Err(PatternParseError::InvalidHost);
    }
    Ok((PatternKind::ExactDomain, host_raw.to_string()))
}

/// Rejects leading/trailing/doubled empty labels, tolerating a single
/// trailing dot (an absolute FQDN).
fn validate_labels(host: &str) -> Result<(), PatternParseError> {
    if host.starts_with('.') {
        return Err(PatternParseError::InvalidHost);
    }
    let trimmed = host.strip_suffix('.').unwrap_or(host);
    if trimmed.is_empty() || trimmed.split('.').any(|label| label.is_empty()) {
        return Err(PatternParseError::InvalidHost);
    }
    Ok(())
}

/// A parsed `Origin` header: `(scheme, host, port)`, per spec §3 "Origin".
///
/// Unlike [`OriginPattern`], `host` is trusted verbatim from the request (a
/// conforming browser serializes it correctly) rather than re-validated to
/// DNS-label strictness — see spec §4.B.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub(crate) scheme: String,
    pub(crate) host: String,
    pub(crate) port: Option<u16>,
}

impl Origin {
    /// The origin's scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The origin's host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The origin's explicit port, if any.
    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

/// Why [`parse_origin`] rejected a candidate `Origin` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginParseError {
    /// Missing `scheme://`, empty host, or an invalid scheme token.
    Malformed,
    /// A non-numeric or out-of-range port.
    InvalidPort,
    /// The value exceeds the length bound.
    TooLong,
}

/// Parses an `Origin` header value leniently (spec §4.B `parse_origin`):
/// validates scheme grammar and numeric port, but trusts the host.
pub fn parse_origin(text: &str) -> Result<Origin, OriginParseError> {
    let (scheme, rest) = split_scheme(text).ok_or(OriginParseError::Malformed)?;
    if scheme.is_empty() || scheme.len() > MAX_SCHEME_LEN {
        return Err(OriginParseError::Malformed);
    }
    if !scheme.bytes().all(|b| {
        b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'+' | b'.' | b'-' | b'_')
    }) {
        return Err(OriginParseError::Malformed);
    }
    if rest.is_empty() || rest.len() > MAX_HOSTPORT_LEN {
        return Err(OriginParseError::TooLong);
    }

    let (host, port) = if let Some(inner) = rest.strip_prefix('[') {
        let close = inner.find(']').ok_or(OriginParseError::Malformed)?;
        let host = &inner[..close];
        let tail = &inner[close + 1..];
        let port = match tail.strip_prefix(':') {
            Some(digits) => Some(parse_port_number(digits).ok_or(OriginParseError::InvalidPort)?),
            None if tail.is_empty() => None,
            None => return Err(OriginParseError::Malformed),
        };
        (host, port)
    } else {
        match rest.rfind(':') {
            Some(idx) if !rest[..idx].contains(':') => {
                let host = &rest[..idx];
                let port = parse_port_number(&rest[idx + 1..]).ok_or(OriginParseError::InvalidPort)?;
                (host, Some(port))
            }
            _ => (rest, None),
        }
    };

    if host.is_empty() {
        return Err(OriginParseError::Malformed);
    }

    Ok(Origin {
        scheme: scheme.to_string(),
        host: host.to_string(),
        port,
    })
}
