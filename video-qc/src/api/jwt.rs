//! JWT authentication service.
//!
//! Validates end-user bearer tokens and mints short-lived worker tokens that
//! a QC worker presents back on the progress webhook.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::config::AuthConfig;

/// Role carried by worker tokens.
pub const WORKER_ROLE: &str = "qc-worker";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Owner id for users, project id for workers.
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    /// Expiration timestamp (Unix)
    pub exp: u64,
    /// Issued at timestamp (Unix)
    pub iat: u64,
}

impl Claims {
    pub fn is_worker(&self) -> bool {
        self.roles.iter().any(|r| r == WORKER_ROLE)
    }
}

/// JWT service error types.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
    #[error("Token validation failed: {0}")]
    TokenValidation(String),
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token")]
    InvalidToken,
}

/// JWT service for token generation and validation.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    worker_token_ttl_secs: u64,
}

impl JwtService {
    pub fn new(secret: &str, issuer: &str, audience: &str, worker_token_ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            worker_token_ttl_secs,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        info!(
            "JWT service initialized (issuer: {}, audience: {}, worker token ttl: {}s)",
            config.jwt_issuer, config.jwt_audience, config.worker_token_ttl_secs
        );
        Self::new(
            &config.jwt_secret,
            &config.jwt_issuer,
            &config.jwt_audience,
            config.worker_token_ttl_secs,
        )
    }

    fn now() -> Result<u64, JwtError> {
        Ok(SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))?
            .as_secs())
    }

    /// Sign a token for `subject` valid for `ttl_secs`.
    pub fn generate_token(
        &self,
        subject: &str,
        roles: Vec<String>,
        ttl_secs: u64,
    ) -> Result<String, JwtError> {
        let now = Self::now()?;
        let claims = Claims {
            sub: subject.to_string(),
            roles,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: now + ttl_secs,
            iat: now,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }

    /// Token scoped to reporting progress for `project_id`.
    pub fn generate_worker_token(&self, project_id: &str) -> Result<String, JwtError> {
        self.generate_token(
            project_id,
            vec![WORKER_ROLE.to_string()],
            self.worker_token_ttl_secs,
        )
    }

    /// Validate a JWT token and extract claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidToken,
                _ => JwtError::TokenValidation(e.to_string()),
            })
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("worker_token_ttl_secs", &self.worker_token_ttl_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> JwtService {
        JwtService::new(
            "test-secret-key-32-chars-long!!",
            "test-issuer",
            "test-audience",
            600,
        )
    }

    #[test]
    fn test_worker_token_is_scoped_to_project() {
        let service = create_test_service();
        let token = service.generate_worker_token("project-9").unwrap();

        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "project-9");
        assert!(claims.is_worker());
        assert_eq!(claims.exp - claims.iat, 600);
    }

    #[test]
    fn test_user_token_is_not_worker() {
        let service = create_test_service();
        let token = service
            .generate_token("owner-1", vec!["user".to_string()], 3600)
            .unwrap();
        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "owner-1");
        assert!(!claims.is_worker());
    }

    #[test]
    fn test_invalid_token() {
        let service = create_test_service();
        let result = service.validate_token("invalid.token.here");

        assert!(matches!(
            result,
            Err(JwtError::InvalidToken) | Err(JwtError::TokenValidation(_))
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let service1 = JwtService::new("secret1-32-chars-long-key!!!!!", "issuer", "audience", 60);
        let service2 = JwtService::new("secret2-32-chars-long-key!!!!!", "issuer", "audience", 60);

        let token = service1.generate_worker_token("p1").unwrap();
        assert!(matches!(
            service2.validate_token(&token),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let service1 = JwtService::new("shared-secret-32-chars-long!!!!", "issuer", "a", 60);
        let service2 = JwtService::new("shared-secret-32-chars-long!!!!", "issuer", "b", 60);

        let token = service1.generate_worker_token("p1").unwrap();
        assert!(service2.validate_token(&token).is_err());
    }
}
