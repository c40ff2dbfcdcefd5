//! Convention database queries (pool-level reads and inserts).
//!
//! Transactional writes live with the operations in the parent module.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::convention::{Convention, ConventionDocument};
use crate::uuid::uuidv7;

const CONVENTION_COLUMNS: &str =
    "id, gtc_point_id, sector_id, status, internal_sales_rep, created_at, updated_at";

const DOCUMENT_COLUMNS: &str = "id, convention_id, kind, stored_name, relative_path, \
     mime, size_bytes, checksum, uploaded_by, created_at";

/// Create a convention in NEW.
pub async fn insert_convention(
    pool: &PgPool,
    gtc_point_id: Uuid,
    sector_id: Uuid,
) -> CoreResult<Convention> {
    let row = sqlx::query_as::<_, Convention>(&format!(
        "INSERT INTO conventions (id, gtc_point_id, sector_id) \
         VALUES ($1, $2, $3) \
         RETURNING {CONVENTION_COLUMNS}"
    ))
    .bind(uuidv7())
    .bind(gtc_point_id)
    .bind(sector_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Fetch a convention by ID.
pub async fn get_convention(pool: &PgPool, id: Uuid) -> CoreResult<Option<Convention>> {
    let row = sqlx::query_as::<_, Convention>(&format!(
        "SELECT {CONVENTION_COLUMNS} FROM conventions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// List a convention's documents, oldest first.
pub async fn list_documents(
    pool: &PgPool,
    convention_id: Uuid,
) -> CoreResult<Vec<ConventionDocument>> {
    let rows = sqlx::query_as::<_, ConventionDocument>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM convention_documents \
         WHERE convention_id = $1 ORDER BY created_at ASC"
    ))
    .bind(convention_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// List conventions for one GTC point, newest first.
pub async fn list_for_point(pool: &PgPool, gtc_point_id: Uuid) -> CoreResult<Vec<Convention>> {
    let rows = sqlx::query_as::<_, Convention>(&format!(
        "SELECT {CONVENTION_COLUMNS} FROM conventions \
         WHERE gtc_point_id = $1 ORDER BY created_at DESC"
    ))
    .bind(gtc_point_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
