//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (`x-request-id`, recorded on the span and Sentry scope)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! Credential endpoints (login, registration, password reset) additionally
//! carry a per-IP rate limit as a route layer.
//!
//! Authorization is not a layer: handlers declare the role they need with
//! an [`Authorized`] extractor.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{
    AdminOnly, AnyUser, Authorized, MaybeUser, RolePolicy, Staff, clear_current_user,
    set_current_user,
};
pub use rate_limit::auth_rate_limiter;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use session::{SESSION_COOKIE_NAME, create_session_layer};
