use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::AppConfig, error::ApiError, models::User};

/// TokenSubject
///
/// The identity embedded in a token. Only the id and username are carried;
/// the password hash and email never leave the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSubject {
    pub id: Uuid,
    pub username: String,
}

/// Claims
///
/// Payload signed into every bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user: TokenSubject,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
    /// Expiration Time (exp), `iat + ttl`.
    pub exp: usize,
}

/// TokenService
///
/// Issues and verifies HS256 tokens. Stateless: verification recomputes the
/// signature and checks expiry, nothing is looked up.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: u64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl_secs)
    }

    /// issue
    ///
    /// Signs a token for `user` that expires `ttl_secs` from now.
    pub fn issue(&self, user: &User) -> Result<String, ApiError> {
        let now = Utc::now().timestamp().max(0) as usize;
        let claims = Claims {
            user: TokenSubject {
                id: user.id,
                username: user.username.clone(),
            },
            iat: now,
            exp: now.saturating_add(usize::try_from(self.ttl_secs).unwrap_or(usize::MAX)),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("token signing failed: {:?}", e);
            ApiError::Internal("failed to sign token".to_string())
        })
    }

    /// verify
    ///
    /// Returns the embedded identity, or `InvalidToken` on signature mismatch,
    /// malformed input or elapsed expiry.
    pub fn verify(&self, token: &str) -> Result<TokenSubject, ApiError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.user)
            .map_err(|e| {
                tracing::debug!(kind = ?e.kind(), "token rejected");
                ApiError::InvalidToken
            })
    }
}
