use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the `auth_middleware` layer in `create_router`,
/// so a request without a valid token is rejected with 403 before any handler
/// (and therefore any store call) runs. Handlers additionally receive the
/// `AuthUser` whose `id` scopes every post operation.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/POST /posts
        // List the caller's posts, or create a new one owned by the caller.
        .route(
            "/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        // PUT/DELETE /posts/{id}
        // Owner-only. A post owned by someone else answers 404, like a missing one.
        .route(
            "/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
}
