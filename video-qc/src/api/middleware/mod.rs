//! API middleware.
//!
//! User bearer-token auth for owner endpoints and shared-secret or worker-token
//! auth for internal endpoints.

pub mod auth;
pub mod jwt_auth;

pub use auth::{
    Caller, INTERNAL_SECRET_HEADER, InternalSecretAuth, internal_auth_middleware,
    internal_or_worker_auth_middleware,
};
pub use jwt_auth::{JwtAuthError, user_auth_middleware};
