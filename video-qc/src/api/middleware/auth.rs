//! Internal authentication middleware.
//!
//! Service-to-service endpoints accept a shared secret header. The progress
//! webhook additionally accepts the worker token minted for the run.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::jwt_auth::extract_bearer_token;
use crate::api::error::ApiError;
use crate::api::jwt::Claims;
use crate::api::server::AppState;

/// Header carrying the internal shared secret.
pub const INTERNAL_SECRET_HEADER: &str = "X-Internal-Secret";

/// Who passed internal authentication.
#[derive(Debug, Clone)]
pub enum Caller {
    /// Presented the shared secret.
    Internal,
    /// Presented a worker token; `sub` is the project it may report on.
    Worker(Claims),
}

impl Caller {
    /// Whether this caller may act on `project_id`.
    pub fn may_access(&self, project_id: &str) -> bool {
        match self {
            Caller::Internal => true,
            Caller::Worker(claims) => claims.sub == project_id,
        }
    }
}

/// Shared-secret checker.
#[derive(Clone)]
pub struct InternalSecretAuth {
    secret: Arc<str>,
}

impl InternalSecretAuth {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Arc::from(secret.into()),
        }
    }

    /// Constant-time comparison against the configured secret.
    pub fn is_valid(&self, candidate: &str) -> bool {
        if self.secret.is_empty() || candidate.len() != self.secret.len() {
            return false;
        }
        candidate
            .bytes()
            .zip(self.secret.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for InternalSecretAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalSecretAuth").finish_non_exhaustive()
    }
}

fn secret_matches(state: &AppState, request: &Request) -> Option<bool> {
    request
        .headers()
        .get(INTERNAL_SECRET_HEADER)
        .map(|v| v.to_str().is_ok_and(|s| state.internal_auth.is_valid(s)))
}

/// Requires the internal secret header.
pub async fn internal_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match secret_matches(&state, &request) {
        Some(true) => {
            request.extensions_mut().insert(Caller::Internal);
            Ok(next.run(request).await)
        }
        Some(false) => {
            tracing::warn!("Invalid internal secret provided");
            Err(ApiError::unauthorized("Invalid internal secret"))
        }
        None => Err(ApiError::unauthorized("Missing internal secret")),
    }
}

/// Accepts the internal secret header or a worker bearer token.
pub async fn internal_or_worker_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = match secret_matches(&state, &request) {
        Some(true) => Caller::Internal,
        Some(false) => {
            tracing::warn!("Invalid internal secret provided");
            return Err(ApiError::unauthorized("Invalid internal secret"));
        }
        None => {
            let token = extract_bearer_token(request.headers())
                .map_err(|_| ApiError::unauthorized("Missing internal secret or worker token"))?;
            let claims = state
                .jwt_service
                .validate_token(token)
                .map_err(|e| ApiError::unauthorized(format!("Invalid worker token: {}", e)))?;
            if !claims.is_worker() {
                return Err(ApiError::forbidden("Token is not a worker token"));
            }
            Caller::Worker(claims)
        }
    };

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
