//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions, in-memory store)
//! 5. Security headers (CSP, etc.)
//! 6. Rate limiting on login and enrollment posts (governor)
//!
//! The role gate is not a layer: handlers opt in with the [`RequireAdmin`]
//! and [`RequireBusiness`] extractors.

pub mod gate;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use gate::{
    Denial, GateRejection, OptionalIdentity, RequireAdmin, RequireBusiness, SignedIn,
    clear_current_identity, evaluate_gate, set_current_identity,
};
pub use rate_limit::{auth_rate_limiter, enrollment_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
