use std::env;

/// AppConfig
///
/// Holds the service configuration. Loaded once at startup and shared read-only
/// through `AppState` (pulled into handlers and extractors via `FromRef`).
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string for the user/post store.
    pub db_url: String,
    // TCP port the HTTP listener binds to.
    pub port: u16,
    // Runtime environment marker. Controls log format and secret fallbacks.
    pub env: Env,
    // Shared HMAC secret used to sign and verify bearer tokens.
    pub jwt_secret: String,
    // Lifetime of an issued token, in seconds.
    pub token_ttl_secs: u64,
    // Work factor for bcrypt password hashing.
    pub bcrypt_cost: u32,
}

/// Env
///
/// Runtime context. `Local` keeps the historical defaults (port 2025, secret
/// `SECRETKEY`) so an unconfigured checkout behaves like the original deployment.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_PORT: u16 = 2025;
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 10_000;
pub const DEFAULT_DATABASE_URL: &str = "postgres://127.0.0.1:5432/practice";
pub const LOCAL_JWT_SECRET: &str = "SECRETKEY";

impl Default for AppConfig {
    /// Non-panicking configuration for tests. Uses the minimum bcrypt cost so
    /// registration-heavy tests stay fast.
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DATABASE_URL.to_string(),
            port: DEFAULT_PORT,
            env: Env::Local,
            jwt_secret: "geopost-test-secret-value-local".to_string(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            bcrypt_cost: 4,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics in `Env::Production` when `DATABASE_URL` or `JWT_SECRET` is missing,
    /// and in any environment when a numeric variable cannot be parsed.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        let port = parse_var("PORT", DEFAULT_PORT);
        let token_ttl_secs = parse_var("TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS);
        let bcrypt_cost = parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST);

        Self {
            db_url,
            port,
            env,
            jwt_secret,
            token_ttl_secs,
            bcrypt_cost,
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {name} is not a valid value: {raw}")),
        Err(_) => default,
    }
}
