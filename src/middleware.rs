//! The request classifier & responder (spec §4.E), and the atomically
//! reconfigurable handle that owns a compiled configuration (spec §4.F).
//!
//! The handle is thread-oblivious by construction: [`Cors::wrap`] loads its
//! configuration snapshot exactly once via [`arc_swap::ArcSwapOption`] (the
//! same hot-swappable-immutable-config primitive `agentgateway`'s `arc.rs`
//! reaches for) and never blocks, never suspends, and never touches a lock.

use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;

use crate::config::{self, CompiledCors, CorsPolicy, RequestHeaderPolicy};
use crate::error::CorsConfigErrors;
use crate::origin::parse_origin;
use crate::request::CorsRequest;
use crate::response::CorsResponse;

const HEADER_ORIGIN: &str = "Origin";
const HEADER_ACRM: &str = "Access-Control-Request-Method";
const HEADER_ACRH: &str = "Access-Control-Request-Headers";
const HEADER_VARY: &str = "Vary";
const HEADER_ACAO: &str = "Access-Control-Allow-Origin";
const HEADER_ACAC: &str = "Access-Control-Allow-Credentials";
const HEADER_ACAM: &str = "Access-Control-Allow-Methods";
const HEADER_ACAH: &str = "Access-Control-Allow-Headers";
const HEADER_ACEH: &str = "Access-Control-Expose-Headers";
const HEADER_ACMA: &str = "Access-Control-Max-Age";

const VARY_ORIGIN_ONLY: &str = "Origin";

const SAFELISTED_METHODS: &[&str] = &["GET", "HEAD", "POST"];

const NON_DEBUG_FAILURE_STATUS: u16 = 403;

/// Fixed fallback status for a debug-mode preflight that has no precomputed
/// `Access-Control-Allow-Headers` value to fall back to — never the
/// configurable `preflight_success_status`.
const DEBUG_NO_ACAH_FALLBACK_STATUS: u16 = 204;

/// What a caller must do after [`Cors::wrap`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Response headers (if any) are staged; proceed to the wrapped handler.
    Continue,
    /// A preflight response is complete; short-circuit with this status and
    /// do **not** invoke the wrapped handler.
    Respond(u16),
}

/// An atomically-reconfigurable CORS middleware handle.
///
/// A zero-initialized (`Default`) handle has never been configured and is a
/// valid passthrough: [`Cors::wrap`] leaves the response untouched and
/// always returns [`Decision::Continue`].
pub struct Cors {
    compiled: ArcSwapOption<CompiledCors>,
    debug: AtomicBool,
}

impl Cors {
    /// Validates `policy` and builds a configured handle.
    pub fn new(policy: CorsPolicy) -> Result<Self, CorsConfigErrors> {
        let compiled = config::build(&policy)?;
        Ok(Self {
            compiled: ArcSwapOption::from_pointee(compiled),
            debug: AtomicBool::new(false),
        })
    }

    /// Applies `req`/`res` against the current configuration snapshot and
    /// reports what the caller must do next.
    ///
    /// Loads the configuration exactly once; a concurrent [`Cors::reconfigure`]
    /// call cannot cause this invocation to observe a mix of old and new
    /// settings (spec §5).
    pub fn wrap<Req: CorsRequest, Res: CorsResponse>(&self, req: &Req, res: &mut Res) -> Decision {
        let Some(compiled) = self.compiled.load_full() else {
            return Decision::Continue;
        };
        let debug = self.debug.load(Ordering::Relaxed);
        decide(&compiled, debug, req, res)
    }

    /// Validates `policy` and, on success, atomically swaps it in. On
    /// failure the handle is left unchanged and the errors are returned.
    /// The debug flag is untouched either way.
    pub fn reconfigure(&self, policy: CorsPolicy) -> Result<(), CorsConfigErrors> {
        let compiled = config::build(&policy)?;
        self.compiled.store(Some(std::sync::Arc::new(compiled)));
        #[cfg(feature = "logger")]
        tracing::info!("cors configuration swapped in");
        Ok(())
    }

    /// Sets debug mode (see [`Cors::debug`]).
    pub fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    /// In debug mode, a failed preflight still emits its staged headers and
    /// a 2xx status rather than a bare 403, so the browser's own CORS check
    /// produces a precise console error instead of a silent network failure.
    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Reconstructs a canonical, normalized policy from the current
    /// configuration. `None` if the handle has never been configured.
    pub fn config(&self) -> Option<CorsPolicy> {
        self.compiled.load_full().map(|c| config::readback(&c))
    }
}

impl Default for Cors {
    fn default() -> Self {
        Self {
            compiled: ArcSwapOption::empty(),
            debug: AtomicBool::new(false),
        }
    }
}

fn decide<Req: CorsRequest, Res: CorsResponse>(
    compiled: &CompiledCors,
    debug: bool,
    req: &Req,
    res: &mut Res,
) -> Decision {
    let is_options = req.method().eq_ignore_ascii_case("OPTIONS");
    let origin = req.header(HEADER_ORIGIN);
    let acrm = req.header(HEADER_ACRM);

    match (origin, is_options, acrm) {
        (None, _, _) => {
            handle_non_cors(compiled, is_options, res);
            Decision::Continue
        }
        (Some(origin_value), true, Some(acrm_value)) => {
            handle_preflight(compiled, debug, origin_value, acrm_value, req, res)
        }
        (Some(origin_value), is_options, _) => {
            handle_actual(compiled, is_options, origin_value, res);
            Decision::Continue
        }
    }
}

fn handle_non_cors<Res: CorsResponse>(compiled: &CompiledCors, is_options: bool, res: &mut Res) {
    if is_options {
        res.append(HEADER_VARY, config::PREFLIGHT_VARY_VALUE);
    } else if !compiled.allow_any_origin {
        res.append(HEADER_VARY, VARY_ORIGIN_ONLY);
    } else {
        res.set(HEADER_ACAO, "*");
        if let Some(value) = &compiled.expose_headers_value {
            res.set(HEADER_ACEH, value);
        }
    }
}

fn handle_actual<Res: CorsResponse>(
    compiled: &CompiledCors,
    is_options: bool,
    origin_value: &str,
    res: &mut Res,
) {
    res.append(
        HEADER_VARY,
        if is_options {
            config::PREFLIGHT_VARY_VALUE
        } else {
            VARY_ORIGIN_ONLY
        },
    );

    if compiled.allow_any_origin {
        res.set(HEADER_ACAO, "*");
        if let Some(value) = &compiled.expose_headers_value {
            res.set(HEADER_ACEH, value);
        }
        return;
    }

    let Ok(origin) = parse_origin(origin_value) else {
        return;
    };
    if !compiled.tree.contains(origin.scheme(), origin.host(), origin.port()) {
        return;
    }

    res.set(HEADER_ACAO, origin_value);
    if compiled.credentialed {
        res.set(HEADER_ACAC, "true");
    }
    if let Some(value) = &compiled.expose_headers_value {
        res.set(HEADER_ACEH, value);
    }
}

/// Staged response-header writes, committed only if the whole preflight
/// succeeds (or, in debug mode, on whatever partial progress was made
/// before failure).
type StagedHeaders = Vec<(&'static str, String)>;

fn commit<Res: CorsResponse>(res: &mut Res, staged: &StagedHeaders) {
    for (name, value) in staged {
        res.set(name, value);
    }
}

fn fail_preflight<Res: CorsResponse>(
    compiled: &CompiledCors,
    debug: bool,
    staged: &StagedHeaders,
    res: &mut Res,
) -> Decision {
    if debug {
        #[cfg(feature = "logger")]
        tracing::debug!("preflight rejected; debug mode emitting diagnostics");
        commit(res, staged);
        Decision::Respond(compiled.preflight_success_status)
    } else {
        #[cfg(feature = "logger")]
        tracing::debug!("preflight rejected");
        Decision::Respond(NON_DEBUG_FAILURE_STATUS)
    }
}

fn handle_preflight<Req: CorsRequest, Res: CorsResponse>(
    compiled: &CompiledCors,
    debug: bool,
    origin_value: &str,
    acrm_value: &str,
    req: &Req,
    res: &mut Res,
) -> Decision {
    res.append(HEADER_VARY, config::PREFLIGHT_VARY_VALUE);
    let mut staged: StagedHeaders = Vec::new();

    // Step a: origin.
    let origin_ok = if compiled.allow_any_origin {
        staged.push((HEADER_ACAO, "*".to_string()));
        true
    } else {
        match parse_origin(origin_value) {
            Ok(origin) if compiled.tree.contains(origin.scheme(), origin.host(), origin.port()) => {
                staged.push((HEADER_ACAO, origin_value.to_string()));
                if compiled.credentialed {
                    staged.push((HEADER_ACAC, "true".to_string()));
                }
                true
            }
            _ => false,
        }
    };
    if !origin_ok {
        return fail_preflight(compiled, debug, &staged, res);
    }

    // Step b: method.
    let acrm_is_safelisted = SAFELISTED_METHODS.iter().any(|m| acrm_value.eq_ignore_ascii_case(m));
    if !acrm_is_safelisted {
        let method_ok = if compiled.allow_any_method {
            let value = if compiled.credentialed { acrm_value.to_string() } else { "*".to_string() };
            staged.push((HEADER_ACAM, value));
            true
        } else if compiled
            .methods
            .iter()
            .any(|m| m.as_ref().eq_ignore_ascii_case(acrm_value))
        {
            staged.push((HEADER_ACAM, acrm_value.to_string()));
            true
        } else {
            false
        };
        if !method_ok {
            return fail_preflight(compiled, debug, &staged, res);
        }
    }

    // Step c: request headers, only evaluated if the request carries any.
    let acrh_lines = req.header_all(HEADER_ACRH);
    if !acrh_lines.is_empty() {
        let acrh_joined = acrh_lines.join(",");
        match &compiled.request_headers {
            RequestHeaderPolicy::Asterisk { allow_authorization } => {
                let value = if compiled.credentialed {
                    acrh_joined.clone()
                } else if *allow_authorization {
                    "*, authorization".to_string()
                } else {
                    "*".to_string()
                };
                staged.push((HEADER_ACAH, value));
            }
            RequestHeaderPolicy::Discrete(set) => {
                if set.subsumes(&acrh_joined) {
                    staged.push((HEADER_ACAH, acrh_joined));
                } else if debug {
                    commit(res, &staged);
                    if !set.is_empty() {
                        res.set(HEADER_ACAH, &set.as_joined_string());
                        return Decision::Respond(compiled.preflight_success_status);
                    }
                    return Decision::Respond(DEBUG_NO_ACAH_FALLBACK_STATUS);
                } else {
                    return fail_preflight(compiled, debug, &staged, res);
                }
            }
        }
    }

    commit(res, &staged);
    if let Some(value) = &compiled.max_age_value {
        res.set(HEADER_ACMA, value);
    }
    Decision::Respond(compiled.preflight_success_status)
}
