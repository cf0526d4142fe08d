use crate::{errors::ServiceError, AppState};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// JWT claims. The identity provider is an external collaborator; the
/// backend trusts the subject and admin flag it signed unconditionally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Whether the user may call administrative endpoints
    #[serde(default)]
    pub is_admin: bool,
    /// Issued at time
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

/// Authenticated caller identity extracted from a Bearer token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub is_admin: bool,
}

/// Authenticated caller that has been verified to be an administrator.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

/// Token issuing and validation service.
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: u64,
}

impl AuthService {
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs,
        }
    }

    /// Issues a signed token for the given user.
    pub fn generate_token(&self, user_id: Uuid, is_admin: bool) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            is_admin,
            iat: now,
            exp: now + self.expiration_secs as i64,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::AuthError(format!("Failed to issue token: {}", e)))
    }

    /// Validates a token and returns the caller identity it encodes.
    pub fn validate_token(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| ServiceError::AuthError(format!("Invalid token: {}", e)))?;

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ServiceError::AuthError("Invalid subject claim".to_string()))?;

        Ok(AuthUser {
            user_id,
            is_admin: data.claims.is_admin,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = Arc::<AppState>::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("Missing authorization header".into()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("Expected bearer token".into()))?
            .trim();

        state.auth.validate_token(token)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ServiceError::Forbidden("Administrator access required".into()));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new("test_secret_key_for_testing_purposes_only_32chars", 3600)
    }

    #[test]
    fn token_round_trip() {
        let svc = service();
        let user_id = Uuid::new_v4();

        let token = svc.generate_token(user_id, false).unwrap();
        let user = svc.validate_token(&token).unwrap();

        assert_eq!(user.user_id, user_id);
        assert!(!user.is_admin);
    }

    #[test]
    fn admin_flag_survives_round_trip() {
        let svc = service();
        let token = svc.generate_token(Uuid::new_v4(), true).unwrap();
        assert!(svc.validate_token(&token).unwrap().is_admin);
    }

    #[test]
    fn garbage_token_is_rejected() {
        let svc = service();
        assert!(svc.validate_token("not.a.token").is_err());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let svc = service();
        let other = AuthService::new("another_secret_key_long_enough_for_validation_x", 3600);
        let token = other.generate_token(Uuid::new_v4(), false).unwrap();
        assert!(svc.validate_token(&token).is_err());
    }
}
