//! Database connection management.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Default connection pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Bounded wait for a pooled connection; a saturated pool fails closed
/// instead of queueing forever.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Open a connection pool against the given PostgreSQL URL.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(url)
        .await
}
