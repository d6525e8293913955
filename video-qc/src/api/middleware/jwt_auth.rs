//! JWT authentication middleware.
//!
//! Provides user bearer-token authentication for the owner-facing endpoints.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::error::ApiError;
use crate::api::jwt::JwtError;
use crate::api::server::AppState;

/// JWT authentication error response.
#[derive(Debug)]
pub enum JwtAuthError {
    /// Missing Authorization header
    MissingToken,
    /// Invalid token format (not Bearer)
    InvalidFormat,
    /// Token validation failed
    InvalidToken(JwtError),
    /// A worker token was presented on a user endpoint
    WorkerToken,
}

impl IntoResponse for JwtAuthError {
    fn into_response(self) -> Response {
        let error = match self {
            JwtAuthError::MissingToken => ApiError::unauthorized("Missing authorization token"),
            JwtAuthError::InvalidFormat => ApiError::unauthorized("Invalid token format"),
            JwtAuthError::InvalidToken(JwtError::TokenExpired) => {
                ApiError::unauthorized("Token has expired")
            }
            JwtAuthError::InvalidToken(_) => ApiError::unauthorized("Invalid token"),
            JwtAuthError::WorkerToken => {
                ApiError::forbidden("Worker tokens cannot access this endpoint")
            }
        };
        error.into_response()
    }
}

/// Extract Bearer token from the Authorization header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, JwtAuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(JwtAuthError::MissingToken)?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| JwtAuthError::InvalidFormat)?;

    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(JwtAuthError::InvalidFormat)
}

/// Validates the user bearer token and injects its claims into request extensions.
pub async fn user_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, JwtAuthError> {
    let token = extract_bearer_token(request.headers())?;

    let claims = state
        .jwt_service
        .validate_token(token)
        .map_err(JwtAuthError::InvalidToken)?;
    if claims.is_worker() {
        return Err(JwtAuthError::WorkerToken);
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
