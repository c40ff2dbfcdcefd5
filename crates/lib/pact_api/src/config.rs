//! API server configuration.

use pact_core::auth::jwt::resolve_jwt_secret;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3200").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Public base URL used in emailed links.
    pub public_base_url: String,
    /// Root directory for stored files.
    pub files_root: String,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable           | Default                                      |
    /// |--------------------|----------------------------------------------|
    /// | `BIND_ADDR`        | `127.0.0.1:3200`                             |
    /// | `DATABASE_URL`     | `postgres://localhost:5432/pact`             |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file      |
    /// | `PUBLIC_BASE_URL`  | `http://127.0.0.1:3200`                      |
    /// | `FILES_ROOT`       | `./data/files`                               |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3200".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/pact".into()),
            jwt_secret: resolve_jwt_secret(),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3200".into()),
            files_root: std::env::var("FILES_ROOT").unwrap_or_else(|_| "./data/files".into()),
        }
    }
}
