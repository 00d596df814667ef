use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Services: token issuing, the access guard, the user directory and persistence.
pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod token;

// Route groups: public and token-protected.
pub mod routes;
use auth::AuthUser; // Identity resolved from the bearer token.
use routes::{authenticated, public};

// --- Public Re-exports ---

// Everything main.rs and the test suites need to build an `AppState`.

pub use config::AppConfig;
pub use directory::UserDirectory;
pub use error::ApiError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use token::TokenService;

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::create_post,
        handlers::list_posts, handlers::update_post, handlers::delete_post
    ),
    components(
        schemas(
            models::User, models::Post, models::Geolocation, models::GeoKind,
            models::RegisterUserRequest, models::LoginRequest, models::PostPayload,
            models::GeolocationPayload, models::UserResponse, models::TokenResponse,
            models::PostResponse, models::PostListResponse, models::MessageResponse,
        )
    ),
    tags(
        (name = "geopost", description = "Authenticated geotagged posts API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable state cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// User and post persistence.
    pub repo: RepositoryState,
    /// Token signing and verification, built from `config.jwt_secret`.
    pub tokens: TokenService,
    /// Registration and login over `repo` and `tokens`.
    pub directory: UserDirectory,
    /// Configuration the state was built from.
    pub config: AppConfig,
}

impl AppState {
    /// Wires the token service and user directory from `config` around `repo`.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let tokens = TokenService::from_config(&config);
        let directory = UserDirectory::new(repo.clone(), tokens.clone(), config.bcrypt_cost);
        Self {
            repo,
            tokens,
            directory,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors pull single components out of `AppState`. `AuthUser` only needs
// the `TokenService`.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

/// auth_middleware
///
/// Guards `authenticated_routes`. Extracting `AuthUser` runs the bearer-token
/// guard and token verification; either failure short-circuits with a bare 403.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles public and authenticated routes, the Swagger UI, request-id
/// correlation, tracing and CORS.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name used for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Swagger UI plus the OpenAPI JSON.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: health, register, login.
        .merge(public::public_routes())
        // Authenticated Routes: every /posts route sits behind `auth_middleware`.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID per incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, tagged with its id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// Span for one HTTP request, tagged with its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
