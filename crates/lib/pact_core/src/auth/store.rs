// @zen-component: AUTH-SessionStore
//
//! Keyed grant storage behind the token authority.
//!
//! Refresh, invite and registration tokens are only as alive as their record
//! here; deleting the record revokes the token regardless of its remaining
//! cryptographic validity. The store is an injected seam: production uses the
//! Postgres-backed implementation, tests and single-node dev setups use the
//! in-memory one.
//!
//! Neither backend has native TTL expiry, so both must be swept periodically
//! (`spawn_sweeper`). `get`/`take` additionally filter expired records, which
//! keeps the existence check correct between sweeps.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::jwt::GrantKind;
use crate::error::CoreResult;

/// How often the background sweeper runs.
pub const SWEEP_PERIOD: StdDuration = StdDuration::from_secs(60);

/// One live grant: who it belongs to, what it is for, and until when.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// User ID, or onboarding ID for registration grants.
    pub subject: Uuid,
    pub kind: GrantKind,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Keyed grant store with TTL semantics.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Record a grant under its `jti`.
    async fn put(&self, jti: &str, record: SessionRecord) -> CoreResult<()>;

    /// Fetch a live grant. Expired records read as absent.
    async fn get(&self, jti: &str) -> CoreResult<Option<SessionRecord>>;

    /// Atomically remove and return a live grant. This is the
    /// compare-and-delete rotation relies on: of two racing callers, exactly
    /// one gets the record.
    async fn take(&self, jti: &str) -> CoreResult<Option<SessionRecord>>;

    /// Remove a grant. Idempotent.
    async fn delete(&self, jti: &str) -> CoreResult<()>;

    /// Drop every expired record, returning how many were removed.
    async fn sweep(&self) -> CoreResult<u64>;
}

/// Process-local store. Grants do not survive a restart; suitable for tests
/// and single-node development only.
#[derive(Default)]
pub struct MemorySessionStore {
    grants: DashMap<String, SessionRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, jti: &str, record: SessionRecord) -> CoreResult<()> {
        self.grants.insert(jti.to_string(), record);
        Ok(())
    }

    async fn get(&self, jti: &str) -> CoreResult<Option<SessionRecord>> {
        Ok(self
            .grants
            .get(jti)
            .map(|r| r.clone())
            .filter(|r| !r.is_expired()))
    }

    async fn take(&self, jti: &str) -> CoreResult<Option<SessionRecord>> {
        Ok(self
            .grants
            .remove(jti)
            .map(|(_, r)| r)
            .filter(|r| !r.is_expired()))
    }

    async fn delete(&self, jti: &str) -> CoreResult<()> {
        self.grants.remove(jti);
        Ok(())
    }

    async fn sweep(&self) -> CoreResult<u64> {
        let before = self.grants.len();
        self.grants.retain(|_, r| !r.is_expired());
        Ok(before.saturating_sub(self.grants.len()) as u64)
    }
}

/// Durable store over the `auth_grants` table.
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn put(&self, jti: &str, record: SessionRecord) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO auth_grants (jti, subject, kind, expires_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (jti) DO UPDATE SET subject = $2, kind = $3, expires_at = $4",
        )
        .bind(jti)
        .bind(record.subject)
        .bind(record.kind.as_str())
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, jti: &str) -> CoreResult<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, (Uuid, String, DateTime<Utc>)>(
            "SELECT subject, kind, expires_at FROM auth_grants \
             WHERE jti = $1 AND expires_at > now()",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(|(subject, kind, expires_at)| {
            Some(SessionRecord {
                subject,
                kind: parse_kind(&kind)?,
                expires_at,
            })
        }))
    }

    async fn take(&self, jti: &str) -> CoreResult<Option<SessionRecord>> {
        // Single-statement delete-returning: the row goes to exactly one caller.
        let row = sqlx::query_as::<_, (Uuid, String, DateTime<Utc>)>(
            "DELETE FROM auth_grants \
             WHERE jti = $1 AND expires_at > now() \
             RETURNING subject, kind, expires_at",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(|(subject, kind, expires_at)| {
            Some(SessionRecord {
                subject,
                kind: parse_kind(&kind)?,
                expires_at,
            })
        }))
    }

    async fn delete(&self, jti: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM auth_grants WHERE jti = $1")
            .bind(jti)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn sweep(&self) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM auth_grants WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn parse_kind(kind: &str) -> Option<GrantKind> {
    match kind {
        "refresh" => Some(GrantKind::Refresh),
        "invite" => Some(GrantKind::Invite),
        "registration" => Some(GrantKind::Registration),
        other => {
            warn!(kind = other, "dropping grant with unknown kind");
            None
        }
    }
}

/// Spawn the periodic expiry sweep. Runs until the token is cancelled.
pub fn spawn_sweeper(
    store: Arc<dyn SessionStore>,
    period: StdDuration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The immediate first tick is fine: sweeping an empty store is a no-op.
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => match store.sweep().await {
                    Ok(0) => {}
                    Ok(n) => debug!(swept = n, "expired grants removed"),
                    Err(e) => warn!(error = %e, "grant sweep failed"),
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(kind: GrantKind, ttl_secs: i64) -> SessionRecord {
        SessionRecord {
            subject: Uuid::new_v4(),
            kind,
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemorySessionStore::new();
        store.put("a", record(GrantKind::Refresh, 60)).await.unwrap();
        assert!(store.get("a").await.unwrap().is_some());

        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());

        // Idempotent delete
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn expired_records_read_as_absent() {
        let store = MemorySessionStore::new();
        store.put("old", record(GrantKind::Invite, -5)).await.unwrap();
        assert!(store.get("old").await.unwrap().is_none());
        assert!(store.take("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn take_removes_exactly_once() {
        let store = MemorySessionStore::new();
        store.put("r", record(GrantKind::Refresh, 60)).await.unwrap();

        assert!(store.take("r").await.unwrap().is_some());
        assert!(store.take("r").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_drops_only_expired() {
        let store = MemorySessionStore::new();
        store.put("live", record(GrantKind::Refresh, 60)).await.unwrap();
        store.put("dead", record(GrantKind::Refresh, -1)).await.unwrap();

        assert_eq!(store.sweep().await.unwrap(), 1);
        assert!(store.get("live").await.unwrap().is_some());
    }
}
