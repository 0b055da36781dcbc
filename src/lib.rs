//! A framework-agnostic Cross-Origin Resource Sharing (CORS) middleware
//! core: a validated, immutable configuration compiled from an operator's
//! [`CorsPolicy`], an origin-pattern radix tree fast enough to sit on every
//! request, and a [`Cors`] handle that can be reconfigured at runtime
//! without blocking in-flight requests.
//!
//! ```no_run
//! use corsica::{Cors, CorsPolicy};
//!
//! let policy = CorsPolicy::builder()
//!     .origin("https://example.com")
//!     .method("GET")
//!     .credentialed(true)
//!     .finish();
//! let cors = Cors::new(policy).expect("valid policy");
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod headers;
pub mod middleware;
pub mod origin;
pub mod request;
pub mod response;
pub mod tree;

#[cfg(test)]
mod tests;

pub use config::{CompiledCors, CorsPolicy, CorsPolicyBuilder};
pub use error::{CorsConfigError, CorsConfigErrors};
pub use middleware::{Cors, Decision};
pub use request::{CorsRequest, HyperCorsRequest};
pub use response::{CorsResponse, HyperCorsResponse};
