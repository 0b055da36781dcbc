//! The request-side external collaborator interface (spec §1 "Request
//! source"): method plus case-insensitive, multi-valued header lookup.

/// Read-only view of an incoming request, as needed by [`crate::middleware::Cors::wrap`].
///
/// Implementations must compare header names case-insensitively, matching
/// `hyper::HeaderMap`'s own lookup semantics — this crate ships an adapter
/// over exactly that type (see [`HyperCorsRequest`]) so most callers never
/// implement this trait by hand.
pub trait CorsRequest {
    /// The request's HTTP method, as sent on the wire (not normalized).
    fn method(&self) -> &str;

    /// The first value of `header_name`, if present.
    fn header(&self, header_name: &str) -> Option<&str>;

    /// All values of `header_name`, in wire order. Most requests carry at
    /// most one `Access-Control-Request-Headers` line, but the Fetch
    /// standard permits more than one, and this crate's own header-set
    /// logic expects them joined.
    ///
    /// Deliberately has no default body: a naive default in terms of
    /// [`header`](Self::header) can only ever return the first value, which
    /// silently drops any additional lines a real multi-valued header source
    /// carries. Every implementor must supply a genuine multi-value lookup.
    fn header_all(&self, header_name: &str) -> Vec<&str>;
}

/// Adapter over `hyper::Method` + `hyper::HeaderMap` — the vocabulary this
/// crate's teacher already depends on for exactly this purpose.
#[derive(Debug, Clone, Copy)]
pub struct HyperCorsRequest<'a> {
    method: &'a hyper::Method,
    headers: &'a hyper::HeaderMap,
}

impl<'a> HyperCorsRequest<'a> {
    /// Wraps a method and header map borrowed from an in-flight request.
    pub fn new(method: &'a hyper::Method, headers: &'a hyper::HeaderMap) -> Self {
        Self { method, headers }
    }
}

impl CorsRequest for HyperCorsRequest<'_> {
    fn method(&self) -> &str {
        self.method.as_str()
    }

    fn header(&self, header_name: &str) -> Option<&str> {
        self.headers.get(header_name).and_then(|v| v.to_str().ok())
    }

    fn header_all(&self, header_name: &str) -> Vec<&str> {
        self.headers
            .get_all(header_name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }
}
