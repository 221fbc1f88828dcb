//! Authentication utilities
//!
//! Provides:
//! - Access token verification against the identity provider's secret
//! - Token extraction from the session cookie or a bearer header
//! - Cache keys derived from tokens

use crate::db::models::Role;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Who the identity provider says the caller is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: Option<String>,
}

/// Boundary to the hosted identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve an access token to the identity it was issued for
    async fn identify(&self, token: &str) -> Result<Identity>;
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (profile ID)
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Role hint set by the provider; the profile row stays authoritative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Mint a token (local development and tests)
    pub fn generate_token(&self, user_id: Uuid, email: &str, role: Option<Role>) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            email: Some(email.to_string()),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            role: role.map(|r| {
                serde_json::to_value(r)
                    .ok()
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_default()
            }),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        let mut validation = Validation::default();
        // Provider tokens carry an audience we do not pin
        validation.validate_aud = false;

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }
}

#[async_trait]
impl IdentityProvider for JwtManager {
    async fn identify(&self, token: &str) -> Result<Identity> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        Ok(Identity {
            user_id,
            email: claims.email,
        })
    }
}

/// Token from the session cookie value or an `Authorization` header
pub fn extract_token<'a>(cookie: Option<&'a str>, authorization: Option<&'a str>) -> Option<&'a str> {
    cookie
        .filter(|c| !c.is_empty())
        .or_else(|| authorization.and_then(extract_bearer))
}

/// Extract the token from a `Bearer` authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Hash a session token for use as a cache key
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_session_token() {
        let hash = hash_session_token("token-a");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_session_token("token-a"));
        assert_ne!(hash, hash_session_token("token-b"));
        assert!(!hash.contains("token"));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
        assert_eq!(extract_bearer("Bearer "), None);
    }

    #[test]
    fn test_cookie_wins_over_header() {
        assert_eq!(extract_token(Some("c"), Some("Bearer h")), Some("c"));
        assert_eq!(extract_token(Some(""), Some("Bearer h")), Some("h"));
        assert_eq!(extract_token(None, None), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);
        let user_id = Uuid::new_v4();

        let token = manager
            .generate_token(user_id, "a@example.com", Some(Role::Mentor))
            .unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email.as_deref(), Some("a@example.com"));
        assert_eq!(claims.role.as_deref(), Some("mentor"));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = JwtManager::new("one", 3600)
            .generate_token(Uuid::new_v4(), "a@example.com", None)
            .unwrap();

        let err = JwtManager::new("two", 3600).validate_token(&token).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[tokio::test]
    async fn test_identify() {
        let manager = JwtManager::new("secret", 3600);
        let user_id = Uuid::new_v4();
        let token = manager.generate_token(user_id, "b@example.com", None).unwrap();

        let identity = manager.identify(&token).await.unwrap();
        assert_eq!(identity.user_id, user_id);
        assert!(manager.identify("garbage").await.is_err());
    }
}
