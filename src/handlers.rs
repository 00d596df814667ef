use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{
        LoginRequest, MessageResponse, PostListResponse, PostPayload, PostResponse,
        RegisterUserRequest, TokenResponse, UserResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use uuid::Uuid;

/// Unwraps a JSON body, turning a parse failure into a 400 validation error
/// carrying the same `{ success: false, message }` envelope as other errors.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

/// A path id that is not a UUID cannot name any post, so it is reported the
/// same way as a post the caller does not own.
fn parse_post_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFoundOrForbidden)
}

// --- Handlers ---

/// register_user
///
/// [Public Route] Creates an account with a unique username and email.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 200, description = "Registered", body = UserResponse),
        (status = 400, description = "Missing field", body = MessageResponse),
        (status = 409, description = "Username or email taken", body = MessageResponse)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let req = json_body(payload)?;
    let user = state
        .directory
        .register(&req.username, &req.password, &req.email)
        .await?;

    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}

/// login
///
/// [Public Route] Exchanges a username and password for a bearer token.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid username or password", body = MessageResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let req = json_body(payload)?;
    let token = state
        .directory
        .authenticate(&req.username, &req.password)
        .await?;

    Ok(Json(TokenResponse {
        success: true,
        token,
    }))
}

/// create_post
///
/// [Authenticated Route] Creates a post owned by the caller. The owner comes from
/// the token, never from the body.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = PostPayload,
    responses(
        (status = 200, description = "Created", body = PostResponse),
        (status = 400, description = "Validation failed", body = MessageResponse),
        (status = 403, description = "Missing or invalid token")
    )
)]
pub async fn create_post(
    AuthUser { id, username }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<PostPayload>, JsonRejection>,
) -> Result<Json<PostResponse>, ApiError> {
    let new_post = json_body(payload)?.into_new_post()?;
    let post = state.repo.create_post(new_post, id).await?;

    tracing::debug!(post_id = %post.id, owner = %id, %username, "post created");
    Ok(Json(PostResponse {
        success: true,
        post,
    }))
}

/// list_posts
///
/// [Authenticated Route] Lists every post created by the caller.
#[utoipa::path(
    get,
    path = "/posts",
    responses(
        (status = 200, description = "My posts", body = PostListResponse),
        (status = 403, description = "Missing or invalid token")
    )
)]
pub async fn list_posts(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PostListResponse>, ApiError> {
    let posts = state.repo.list_posts_by_owner(id).await?;

    Ok(Json(PostListResponse {
        success: true,
        posts,
    }))
}

/// update_post
///
/// [Authenticated Route] Owner-only partial update.
///
/// *Authorization*: the repository matches on `(id, created_by)`. A post that does
/// not exist and a post owned by someone else both answer 404.
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = PostPayload,
    responses(
        (status = 200, description = "Updated", body = PostResponse),
        (status = 403, description = "Missing or invalid token"),
        (status = 404, description = "Not found or not owner", body = MessageResponse)
    )
)]
pub async fn update_post(
    AuthUser {
        id: user_id,
        username,
    }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PostPayload>, JsonRejection>,
) -> Result<Json<PostResponse>, ApiError> {
    let id = parse_post_id(&id)?;
    let changes = json_body(payload)?.into_changes()?;

    match state.repo.update_post(id, user_id, changes).await? {
        Some(post) => Ok(Json(PostResponse {
            success: true,
            post,
        })),
        None => {
            tracing::debug!(post_id = %id, %username, "update matched no owned post");
            Err(ApiError::NotFoundOrForbidden)
        }
    }
}

/// delete_post
///
/// [Authenticated Route] Owner-only delete, with the same 404 rule as `update_post`.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Missing or invalid token"),
        (status = 404, description = "Not found or not owner", body = MessageResponse)
    )
)]
pub async fn delete_post(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_post_id(&id)?;

    if state.repo.delete_post(id, user_id).await? {
        Ok(Json(MessageResponse {
            success: true,
            message: "Post deleted successfully".to_string(),
        }))
    } else {
        Err(ApiError::NotFoundOrForbidden)
    }
}
