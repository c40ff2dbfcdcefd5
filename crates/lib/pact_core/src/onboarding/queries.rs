//! Onboarding database queries (pool-level reads).
//!
//! Transactional writes live with the operations in the parent module.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::onboarding::PointOnboarding;
use crate::models::org::{Sector, Service};

const ONBOARDING_COLUMNS: &str = "id, sector_id, email, name, status, phone, vat_number, \
     address, signature_path, onboarding_expires_at, registration_jti, \
     registration_expires_at, gtc_point_id, created_at, updated_at";

/// Fetch an onboarding record by ID.
pub async fn get_onboarding(pool: &PgPool, id: Uuid) -> CoreResult<Option<PointOnboarding>> {
    let row = sqlx::query_as::<_, PointOnboarding>(&format!(
        "SELECT {ONBOARDING_COLUMNS} FROM point_onboardings WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Fetch an onboarding record by the hash of its opaque link token.
pub async fn find_by_token_hash(
    pool: &PgPool,
    token_hash: &str,
) -> CoreResult<Option<PointOnboarding>> {
    let row = sqlx::query_as::<_, PointOnboarding>(&format!(
        "SELECT {ONBOARDING_COLUMNS} FROM point_onboardings WHERE onboarding_token_hash = $1"
    ))
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// The record's currently selected service IDs.
pub async fn selected_service_ids(pool: &PgPool, onboarding_id: Uuid) -> CoreResult<Vec<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT service_id FROM onboarding_services WHERE onboarding_id = $1",
    )
    .bind(onboarding_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Fetch services by ID set. Unknown IDs are simply absent from the result.
pub async fn services_by_ids(pool: &PgPool, ids: &[Uuid]) -> CoreResult<Vec<Service>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, Service>(
        "SELECT id, code, name, sector_id, created_at FROM services WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetch a sector by ID.
pub async fn get_sector(pool: &PgPool, id: Uuid) -> CoreResult<Option<Sector>> {
    let row = sqlx::query_as::<_, Sector>(
        "SELECT id, name, created_at FROM sectors WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// List onboarding records for one sector, newest first.
pub async fn list_for_sector(pool: &PgPool, sector_id: Uuid) -> CoreResult<Vec<PointOnboarding>> {
    let rows = sqlx::query_as::<_, PointOnboarding>(&format!(
        "SELECT {ONBOARDING_COLUMNS} FROM point_onboardings \
         WHERE sector_id = $1 ORDER BY created_at DESC"
    ))
    .bind(sector_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
