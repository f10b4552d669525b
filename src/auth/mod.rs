//! Verified caller identity.
//!
//! Tokens are minted by the identity provider with `{id, email, role}`
//! claims. Handlers receive a [`Caller`] and the engine trusts its fields
//! as given.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::Role;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<Claims> for Caller {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            role: claims.role,
        }
    }
}

#[derive(Clone)]
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
}

impl TokenVerifier {
    pub fn new(secret: &str, token_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl,
        }
    }

    pub fn issue(&self, id: Uuid, email: &str, role: Role) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            id,
            email: email.to_string(),
            role,
            exp: (now + self.token_ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| AppError::Internal(format!("token generation failed: {err}")))
    }

    pub fn verify(&self, token: &str) -> Result<Caller, AppError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| Caller::from(data.claims))
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AppError::Unauthorized("token expired".to_string()),
                _ => AppError::Unauthorized("invalid token".to_string()),
            })
    }
}

fn bearer(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ").map(str::trim)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("authorization required".to_string()))?;

        let token = bearer(header)
            .ok_or_else(|| AppError::Unauthorized("expected a bearer token".to_string()))?;

        state.tokens.verify(token).inspect_err(|err| {
            warn!(uri = %parts.uri, error = %err, "rejected caller token");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_to_the_same_caller() {
        let tokens = TokenVerifier::new("test-secret", Duration::days(7));
        let id = Uuid::new_v4();

        let token = tokens.issue(id, "courier@example.com", Role::Courier).unwrap();
        let caller = tokens.verify(&token).unwrap();

        assert_eq!(caller.id, id);
        assert_eq!(caller.email, "courier@example.com");
        assert_eq!(caller.role, Role::Courier);
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let issuer = TokenVerifier::new("secret-a", Duration::days(7));
        let verifier = TokenVerifier::new("secret-b", Duration::days(7));

        let token = issuer.issue(Uuid::new_v4(), "a@example.com", Role::Owner).unwrap();
        assert!(matches!(verifier.verify(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = TokenVerifier::new("test-secret", Duration::hours(-2));
        let token = tokens.issue(Uuid::new_v4(), "u@example.com", Role::Customer).unwrap();

        match tokens.verify(&token) {
            Err(AppError::Unauthorized(message)) => assert_eq!(message, "token expired"),
            other => panic!("expected expiry rejection, got {other:?}"),
        }
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer("Bearer abc"), Some("abc"));
        assert_eq!(bearer("Basic abc"), None);
    }
}
