use std::fmt::Display;

/// The direction a header name was rejected for: the set of headers a client
/// is permitted to send (`Access-Control-Request-Headers`) or the set a
/// server is permitted to expose (`Access-Control-Expose-Headers`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderDirection {
    /// Rejected while validating `request_headers`.
    Request,
    /// Rejected while validating `response_headers`.
    Response,
}

impl Display for HeaderDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderDirection::Request => write!(f, "request"),
            HeaderDirection::Response => write!(f, "response"),
        }
    }
}

/// Why an origin pattern was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginPatternReason {
    /// The `origins` list was empty.
    Missing,
    /// The pattern failed to parse (bad scheme, bad host, default port, etc.).
    Invalid,
    /// The pattern is syntactically parseable but structurally disallowed
    /// (e.g. `*` mixed with discrete patterns).
    Prohibited,
}

impl Display for OriginPatternReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginPatternReason::Missing => write!(f, "missing"),
            OriginPatternReason::Invalid => write!(f, "invalid"),
            OriginPatternReason::Prohibited => write!(f, "prohibited"),
        }
    }
}

/// Why a method name was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodReason {
    /// Not a valid HTTP method token.
    Invalid,
    /// A method Fetch forbids clients from ever sending (`CONNECT`, `TRACE`, `TRACK`).
    Forbidden,
}

impl Display for MethodReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodReason::Invalid => write!(f, "invalid"),
            MethodReason::Forbidden => write!(f, "forbidden"),
        }
    }
}

/// Why a header name was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderReason {
    /// Not a valid RFC 9110 field-name token.
    Invalid,
    /// A header Fetch forbids in this direction.
    Forbidden,
    /// A header that is nonsensical in this direction (`Access-Control-*` in
    /// a request list, `Origin` in a response list).
    Prohibited,
}

impl Display for HeaderReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderReason::Invalid => write!(f, "invalid"),
            HeaderReason::Forbidden => write!(f, "forbidden"),
            HeaderReason::Prohibited => write!(f, "prohibited"),
        }
    }
}

/// Why two otherwise-valid settings are mutually incompatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncompatibleReason {
    /// Conflicts with `credentialed = true`.
    Credentialed,
    /// A subdomain-of-public-suffix pattern without the matching tolerance flag.
    PublicSuffix,
}

impl Display for IncompatibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncompatibleReason::Credentialed => write!(f, "credentialed"),
            IncompatibleReason::PublicSuffix => write!(f, "psl"),
        }
    }
}

/// A single configuration problem found while compiling a [`CorsPolicy`](crate::config::CorsPolicy).
///
/// `build` and `reconfigure` never stop at the first problem: every
/// applicable variant is collected into a [`CorsConfigErrors`] so a caller
/// can report (or programmatically act on) every violation at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsConfigError {
    /// An origin pattern could not be accepted.
    UnacceptableOriginPattern {
        /// The offending pattern text (empty for `Missing`).
        value: String,
        /// Why it was rejected.
        reason: OriginPatternReason,
    },
    /// A method name could not be accepted.
    UnacceptableMethod {
        /// The offending method text.
        value: String,
        /// Why it was rejected.
        reason: MethodReason,
    },
    /// A header name could not be accepted.
    UnacceptableHeaderName {
        /// The offending header name.
        value: String,
        /// Whether this was found in `request_headers` or `response_headers`.
        direction: HeaderDirection,
        /// Why it was rejected.
        reason: HeaderReason,
    },
    /// `max_age_seconds` fell outside `[-1, 86_400]`.
    MaxAgeOutOfBounds {
        /// The offending value.
        value: i64,
    },
    /// `preflight_success_status` was non-zero and outside `[200, 299]`.
    PreflightSuccessStatusOutOfBounds {
        /// The offending value.
        value: i64,
    },
    /// An origin pattern is valid in isolation but incompatible with another
    /// policy field.
    IncompatibleOriginPattern {
        /// The offending pattern text.
        value: String,
        /// Why it's incompatible.
        reason: IncompatibleReason,
    },
    /// `*` appeared in `response_headers` alongside `credentialed = true`.
    IncompatibleWildcardResponseHeaderName,
}

impl Display for CorsConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorsConfigError::UnacceptableOriginPattern { value, reason } => {
                write!(f, "unacceptable origin pattern '{value}': {reason}")
            }
            CorsConfigError::UnacceptableMethod { value, reason } => {
                write!(f, "unacceptable method '{value}': {reason}")
            }
            CorsConfigError::UnacceptableHeaderName {
                value,
                direction,
                reason,
            } => write!(
                f,
                "unacceptable {direction} header name '{value}': {reason}"
            ),
            CorsConfigError::MaxAgeOutOfBounds { value } => write!(
                f,
                "max_age_seconds {value} out of bounds (default=5, max=86400, disable=-1)"
            ),
            CorsConfigError::PreflightSuccessStatusOutOfBounds { value } => write!(
                f,
                "preflight_success_status {value} out of bounds (default=204, min=200, max=299)"
            ),
            CorsConfigError::IncompatibleOriginPattern { value, reason } => write!(
                f,
                "origin pattern '{value}' incompatible with current policy: {reason}"
            ),
            CorsConfigError::IncompatibleWildcardResponseHeaderName => write!(
                f,
                "'*' response header name is incompatible with credentialed access"
            ),
        }
    }
}

impl std::error::Error for CorsConfigError {}

/// The joined collection of every [`CorsConfigError`] found while compiling a
/// policy.
///
/// Always non-empty: `build`/`reconfigure` only ever construct one of these
/// when at least one problem was found, and return `Ok` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfigErrors(pub(crate) Vec<CorsConfigError>);

impl CorsConfigErrors {
    pub(crate) fn new(errors: Vec<CorsConfigError>) -> Self {
        debug_assert!(!errors.is_empty());
        Self(errors)
    }

    /// Returns the individual errors as a slice, for programmatic inspection.
    pub fn as_slice(&self) -> &[CorsConfigError] {
        &self.0
    }

    /// Returns the number of problems found.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` — this type is never constructed empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for CorsConfigErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{joined}")
    }
}

impl std::error::Error for CorsConfigErrors {}

impl IntoIterator for CorsConfigErrors {
    type Item = CorsConfigError;
    type IntoIter = std::vec::IntoIter<CorsConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CorsConfigErrors {
    type Item = &'a CorsConfigError;
    type IntoIter = std::slice::Iter<'a, CorsConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
