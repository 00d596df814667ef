use crate::error::RepositoryError;
use crate::models::{NewPost, Post, PostChanges, User};
use async_trait::async_trait;
use sqlx::{PgPool, types::Json};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Repository Trait
///
/// The persistence contract for users and posts. Handlers and the user directory
/// only see this trait, so the Postgres store can be swapped for the in-memory
/// one (or a test double) without touching request handling.
///
/// Every post operation except `create_post` is scoped by `(id, created_by)`:
/// a post owned by someone else behaves exactly like a missing one.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    // Fails with `DuplicateKey` when the username or email is already taken.
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, RepositoryError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    // --- Posts (owner-scoped) ---
    async fn create_post(&self, post: NewPost, owner_id: Uuid) -> Result<Post, RepositoryError>;
    async fn list_posts_by_owner(&self, owner_id: Uuid) -> Result<Vec<Post>, RepositoryError>;
    // `None` when no post matches both id and owner.
    async fn update_post(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: PostChanges,
    ) -> Result<Option<Post>, RepositoryError>;
    // `false` when no post matches both id and owner.
    async fn delete_post(&self, id: Uuid, owner_id: Uuid) -> Result<bool, RepositoryError>;
}

/// RepositoryState
///
/// The shared handle stored in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by Postgres. Geolocation is kept as a JSONB document so the
/// stored shape matches the wire shape.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Converts a driver error and logs it once. Unique violations are caller
/// mistakes and stay at `debug`; everything else is a store failure.
fn store_error(op: &str, err: sqlx::Error) -> RepositoryError {
    let mapped = RepositoryError::from(err);
    match &mapped {
        RepositoryError::DuplicateKey(key) => {
            tracing::debug!(op, key = %key, "unique key rejected write")
        }
        RepositoryError::Database(msg) => tracing::error!(op, error = %msg, "store error"),
    }
    mapped
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("create_user", e))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("find_user_by_username", e))
    }

    /// create_post
    ///
    /// Inserts the post with `created_by = owner_id` and `active = true`.
    async fn create_post(&self, post: NewPost, owner_id: Uuid) -> Result<Post, RepositoryError> {
        sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, title, body, created_by, active, geolocation)
            VALUES ($1, $2, $3, $4, true, $5)
            RETURNING id, title, body, created_by, active, geolocation
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post.title)
        .bind(post.body)
        .bind(owner_id)
        .bind(Json(post.geolocation))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("create_post", e))
    }

    /// list_posts_by_owner
    ///
    /// All posts created by `owner_id`, in insertion order. `active` is not filtered.
    async fn list_posts_by_owner(&self, owner_id: Uuid) -> Result<Vec<Post>, RepositoryError> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, body, created_by, active, geolocation
            FROM posts
            WHERE created_by = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("list_posts_by_owner", e))
    }

    /// update_post
    ///
    /// Owner-only partial update. `COALESCE` keeps columns whose change is `None`.
    async fn update_post(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: PostChanges,
    ) -> Result<Option<Post>, RepositoryError> {
        sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET title = COALESCE($3, title),
                body = COALESCE($4, body),
                geolocation = COALESCE($5, geolocation)
            WHERE id = $1 AND created_by = $2
            RETURNING id, title, body, created_by, active, geolocation
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(changes.title)
        .bind(changes.body)
        .bind(changes.geolocation.map(Json))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("update_post", e))
    }

    /// delete_post
    ///
    /// Owner-only delete; `rows_affected == 0` covers both "missing" and "not yours".
    async fn delete_post(&self, id: Uuid, owner_id: Uuid) -> Result<bool, RepositoryError> {
        sqlx::query("DELETE FROM posts WHERE id = $1 AND created_by = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| store_error("delete_post", e))
    }
}

/// InMemoryRepository
///
/// `Repository` kept in process memory. Enforces the same unique keys and owner
/// scoping as the Postgres schema; used by the test suites.
#[derive(Default)]
pub struct InMemoryRepository {
    users: RwLock<Vec<User>>,
    posts: RwLock<Vec<Post>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;

        if users.iter().any(|u| u.username == username) {
            return Err(RepositoryError::DuplicateKey(format!(
                "username `{username}` already exists"
            )));
        }
        if users.iter().any(|u| u.email == email) {
            return Err(RepositoryError::DuplicateKey(format!(
                "email `{email}` already exists"
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_post(&self, post: NewPost, owner_id: Uuid) -> Result<Post, RepositoryError> {
        let post = Post {
            id: Uuid::new_v4(),
            title: post.title,
            body: post.body,
            created_by: owner_id,
            active: true,
            geolocation: post.geolocation,
        };
        self.posts.write().await.push(post.clone());
        Ok(post)
    }

    async fn list_posts_by_owner(&self, owner_id: Uuid) -> Result<Vec<Post>, RepositoryError> {
        let posts = self.posts.read().await;
        Ok(posts
            .iter()
            .filter(|p| p.created_by == owner_id)
            .cloned()
            .collect())
    }

    async fn update_post(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: PostChanges,
    ) -> Result<Option<Post>, RepositoryError> {
        let mut posts = self.posts.write().await;
        let Some(post) = posts
            .iter_mut()
            .find(|p| p.id == id && p.created_by == owner_id)
        else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(body) = changes.body {
            post.body = body;
        }
        if let Some(geolocation) = changes.geolocation {
            post.geolocation = geolocation;
        }
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: Uuid, owner_id: Uuid) -> Result<bool, RepositoryError> {
        let mut posts = self.posts.write().await;
        let before = posts.len();
        posts.retain(|p| !(p.id == id && p.created_by == owner_id));
        Ok(posts.len() < before)
    }
}
