use geopost::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initialises logging, connects and migrates the store,
/// then serves HTTP until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading
    // Production panics here when DATABASE_URL or JWT_SECRET is missing.
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise debug for this crate and info for tower_http.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "geopost=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        // LOCAL: pretty, human-readable output.
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        // PROD: one JSON object per line.
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    if config.env == Env::Local && config.jwt_secret == geopost::config::LOCAL_JWT_SECRET {
        tracing::warn!("Using the built-in JWT secret; set JWT_SECRET outside local development");
    }

    // 4. Database Initialization (Postgres) and Migrations
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");

    // 5. Repository, shared behind an Arc.
    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 6. Unified State Assembly
    let port = config.port;
    let app = create_router(AppState::new(repo, config));

    // 7. Router and Server Startup
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Failed to bind {addr}: {e}"));

    tracing::info!("Listening on {}", addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    axum::serve(listener, app).await.expect("HTTP server error");
}
