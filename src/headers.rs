//! Case-insensitive, sorted, duplicate-free sets of HTTP header names, with a
//! single-pass, allocation-free "is this comma-separated list a subset"
//! check used to validate `Access-Control-Request-Headers`.

/// Upper bound on how many bytes of optional whitespace (`SP`/`HTAB`) are
/// tolerated around a single element of an `Access-Control-Request-Headers`
/// value before [`HeaderNameSet::subsumes`] gives up and fails the check.
/// Bounds the cost of an adversarial header value built from runs of spaces.
pub const MAX_ACRH_WHITESPACE_RUN: usize = 8;

/// Upper bound on how many empty elements (from doubled commas, e.g.
/// `"a,,b"`) a single `subsumes` call will silently ignore.
pub const MAX_ACRH_EMPTY_ELEMENTS: usize = 16;

/// A case-insensitive, sorted, duplicate-free set of HTTP header names.
///
/// Names are stored lowercase. All mutation goes through [`insert`](Self::insert),
/// which validates the RFC 9110 `field-name` token grammar, so a `HeaderNameSet`
/// can never contain a malformed name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderNameSet {
    names: Vec<Box<str>>,
}

/// Why a candidate header name was rejected by [`HeaderNameSet::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderNameError {
    /// Empty, or contains a byte outside the RFC 9110 `tchar` set.
    InvalidToken,
}

fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

pub(crate) fn is_valid_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_tchar)
}

/// Orders `lower` (already-lowercase, as stored in [`HeaderNameSet`]) against
/// `other` (arbitrary case) the way a lowercased comparison would, without
/// allocating a lowercased copy of `other`.
fn cmp_ascii_case_insensitive(lower: &str, other: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let mut a = lower.bytes();
    let mut b = other.bytes();
    loop {
        match (a.next(), b.next()) {
            (Some(x), Some(y)) => match x.cmp(&y.to_ascii_lowercase()) {
                Ordering::Equal => continue,
                neq => return neq,
            },
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
        }
    }
}

impl HeaderNameSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self { names: Vec::new() }
    }

    /// Creates an empty set with room for `capacity` names before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            names: Vec::with_capacity(capacity),
        }
    }

    /// Validates `name` as an RFC 9110 field-name, folds it to lowercase, and
    /// inserts it if not already present. Insertion keeps the backing vector
    /// sorted, so membership tests stay `O(log n)`.
    pub fn insert(&mut self, name: &str) -> Result<(), HeaderNameError> {
        if !is_valid_token(name) {
            return Err(HeaderNameError::InvalidToken);
        }
        let lower = name.to_ascii_lowercase();
        match self.names.binary_search_by(|existing| existing.as_ref().cmp(lower.as_str())) {
            Ok(_) => {}
            Err(idx) => self.names.insert(idx, lower.into_boxed_str()),
        }
        Ok(())
    }

    /// Reports whether `name` (compared case-insensitively) is a member.
    ///
    /// Names are stored lowercase already, so this compares `name` against
    /// each candidate byte-by-byte during the binary search instead of
    /// allocating a lowercased copy.
    pub fn contains(&self, name: &str) -> bool {
        self.names
            .binary_search_by(|existing| cmp_ascii_case_insensitive(existing, name))
            .is_ok()
    }

    /// Number of names in the set.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the set has no names.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates the set in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|b| b.as_ref())
    }

    /// Renders the set as a single comma-joined string with no spaces
    /// (e.g. `"accept,content-type"`), suitable for direct use as a header
    /// value.
    pub fn as_joined_string(&self) -> String {
        self.names.join(",")
    }

    /// Reports whether every non-empty, whitespace-trimmed, comma-separated
    /// element of `acrh_value` is present in this set.
    ///
    /// `acrh_value` is the (already newline-joined, if the request carried
    /// more than one `Access-Control-Request-Headers` line) raw header
    /// value. The check is single-pass and allocates nothing: it walks the
    /// string once, trimming `SP`/`HTAB` from each comma-delimited element
    /// and comparing case-insensitively without building an intermediate
    /// `Vec`.
    ///
    /// A bounded amount of sloppiness is tolerated (see [`MAX_ACRH_WHITESPACE_RUN`]
    /// and [`MAX_ACRH_EMPTY_ELEMENTS`]) so that ordinary browser-generated
    /// values (extra spaces, a stray trailing comma) pass, but pathological
    /// inputs — a header value that is mostly whitespace or empty elements —
    /// fail fast rather than forcing a full scan per element. Any non-token
    /// byte remaining inside an element after trimming also fails the check.
    pub fn subsumes(&self, acrh_value: &str) -> bool {
        let mut empty_elements = 0usize;
        for raw_element in acrh_value.split(',') {
            let element = trim_ows(raw_element);
            if element.is_empty() {
                empty_elements += 1;
                if empty_elements > MAX_ACRH_EMPTY_ELEMENTS {
                    return false;
                }
                continue;
            }
            if !is_valid_token(element) {
                return false;
            }
            if !self.contains(element) {
                return false;
            }
        }
        true
    }
}

/// Trims leading/trailing `SP`/`HTAB` (optional whitespace, RFC 9110 `OWS`),
/// bounded by [`MAX_ACRH_WHITESPACE_RUN`] on each side. A run longer than the
/// bound is left untrimmed, which in turn fails the `tchar` check in
/// [`HeaderNameSet::subsumes`] — an adversarial all-whitespace element is
/// rejected in constant time rather than scanned to completion.
fn trim_ows(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut start = 0;
    while start < bytes.len() && start < MAX_ACRH_WHITESPACE_RUN && is_ows(bytes[start]) {
        start += 1;
    }
    let mut end = bytes.len();
    let mut trimmed_from_end = 0;
    while end > start && trimmed_from_end < MAX_ACRH_WHITESPACE_RUN && is_ows(bytes[end - 1]) {
        end -= 1;
        trimmed_from_end += 1;
    }
    &s[start..end]
}

fn is_ows(b: u8) -> bool {
    b == b' ' || b == b'\t'
}
