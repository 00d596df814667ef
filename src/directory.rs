use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::{
    error::ApiError,
    models::User,
    repository::RepositoryState,
    token::TokenService,
};

/// UserDirectory
///
/// Registration and credential checks. Passwords are bcrypt-hashed before they
/// reach the store and compared with `bcrypt::verify`, never by equality.
#[derive(Clone)]
pub struct UserDirectory {
    repo: RepositoryState,
    tokens: TokenService,
    bcrypt_cost: u32,
    // Hash checked when the username is unknown, so both login failures cost one bcrypt verify.
    dummy_hash: Arc<OnceCell<String>>,
}

impl UserDirectory {
    pub fn new(repo: RepositoryState, tokens: TokenService, bcrypt_cost: u32) -> Self {
        Self {
            repo,
            tokens,
            bcrypt_cost,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// register
    ///
    /// Stores a new account. Fails with `DuplicateKey` when the username or email
    /// is taken and `Validation` when a field is blank.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<User, ApiError> {
        for (field, value) in [("username", username), ("password", password), ("email", email)] {
            if value.trim().is_empty() {
                return Err(ApiError::Validation(format!(
                    "{field}: Path `{field}` is required."
                )));
            }
        }

        let password_hash = self.hash_password(password).await?;
        let user = self.repo.create_user(username, email, &password_hash).await?;

        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// authenticate
    ///
    /// Looks the user up by username, checks the password against the stored hash
    /// and issues a token on success. An unknown username and a wrong password
    /// both yield `InvalidCredentials` after the same bcrypt work.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let Some(user) = self.repo.find_user_by_username(username).await? else {
            let dummy = self
                .dummy_hash
                .get_or_try_init(|| self.hash_password("geopost-unknown-user"))
                .await?;
            self.verify_password(password, dummy).await?;
            tracing::debug!(username, "login for unknown user");
            return Err(ApiError::InvalidCredentials);
        };

        if !self.verify_password(password, &user.password_hash).await? {
            tracing::debug!(user_id = %user.id, "login with wrong password");
            return Err(ApiError::InvalidCredentials);
        }

        let token = self.tokens.issue(&user)?;
        tracing::info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    // bcrypt is CPU-bound; keep it off the async workers.
    async fn hash_password(&self, password: &str) -> Result<String, ApiError> {
        let password = password.to_owned();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .map_err(|e| ApiError::Internal(format!("failed to hash password: {e}")))
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, ApiError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        // A hash that bcrypt cannot parse never matches.
        Ok(verified.unwrap_or(false))
    }
}
