use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use uuid::Uuid;

use crate::{error::ApiError, token::TokenService};

/// AuthUser
///
/// The resolved identity of an authenticated request, taken straight from the
/// token claim. No store lookup happens; handlers use `id` as the ownership key.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// extract_bearer_token
///
/// Pulls the token out of an `authorization: <scheme> <token>` header. Any scheme
/// is accepted; the token itself is not validated here.
///
/// The header must split on a single space into exactly two parts with a
/// non-empty token. Anything else (absent, not valid ASCII, no token, extra
/// spaces or trailing segments) fails with `AuthRejected`.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::AuthRejected)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_scheme), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(ApiError::AuthRejected),
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Access guard: the bearer token must be present (`AuthRejected`, 403).
/// 2. Token verification: signature and expiry (`InvalidToken`, 403).
///
/// Both rejections respond with a bare 403 before any handler or store code runs.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).inspect_err(|_| {
            tracing::debug!(uri = %parts.uri, "rejected request without bearer token");
        })?;

        let tokens = TokenService::from_ref(state);
        let subject = tokens.verify(token)?;

        Ok(AuthUser {
            id: subject.id,
            username: subject.username,
        })
    }
}
