//! The response-side external collaborator interface (spec §1 "a way to
//! compose response headers"), grounded in the teacher crate's
//! `ResponseHeaders` wrapper (`res/response_headers/mod.rs`): a thin,
//! header-name-aware facade rather than exposing a raw map directly.

/// Write-only view of an outgoing response's headers, as needed by
/// [`crate::middleware::Cors::wrap`].
///
/// `set` replaces any existing value; `append` adds an additional line
/// (used only for `Vary`, per spec §4.E's "the middleware never sets the
/// same CORS header twice; `Vary` is the only response header it *adds*
/// rather than sets").
pub trait CorsResponse {
    /// Sets `header_name` to `value`, replacing any prior value.
    fn set(&mut self, header_name: &str, value: &str);

    /// Appends `value` as an additional line of `header_name`.
    fn append(&mut self, header_name: &str, value: &str);
}

/// Adapter over `hyper::HeaderMap`.
#[derive(Debug)]
pub struct HyperCorsResponse<'a> {
    headers: &'a mut hyper::HeaderMap,
}

impl<'a> HyperCorsResponse<'a> {
    /// Wraps a header map borrowed from an in-flight response.
    pub fn new(headers: &'a mut hyper::HeaderMap) -> Self {
        Self { headers }
    }
}

impl CorsResponse for HyperCorsResponse<'_> {
    fn set(&mut self, header_name: &str, value: &str) {
        if let (Ok(name), Ok(val)) = (
            hyper::header::HeaderName::from_bytes(header_name.as_bytes()),
            hyper::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, val);
        }
    }

    fn append(&mut self, header_name: &str, value: &str) {
        if let (Ok(name), Ok(val)) = (
            hyper::header::HeaderName::from_bytes(header_name.as_bytes()),
            hyper::header::HeaderValue::from_str(value),
        ) {
            self.headers.append(name, val);
        }
    }
}
