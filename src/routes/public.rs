use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no token. Login is the only way to obtain one.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Creates an account; username and email must both be unused.
        .route("/register", post(handlers::register_user))
        // POST /login
        // Verifies credentials and returns a signed bearer token.
        .route("/login", post(handlers::login))
}
