// @zen-component: CNV-Workflow
//
//! Convention workflow operations.
//!
//! Every operation that pairs a record mutation with a status change runs in
//! one transaction with an optimistic `WHERE status = …` guard, so racing
//! callers resolve to exactly one winner. Notifications are dispatched only
//! after commit and never fail the operation.

pub mod queries;
pub mod status;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::roles::{Role, require_role};
use crate::error::{CoreError, CoreResult};
use crate::files::{FileStore, FileUpload};
use crate::models::convention::{Convention, ConventionDocument, DocumentKind};
use crate::models::notification::NotificationKind;
use crate::models::user::Actor;
use crate::notify::{Dispatcher, NotifyInput};
use crate::notify::queries as recipients;
use crate::uuid::uuidv7;
use self::status::{ConventionAction, ConventionStatus, deletable, transition};

/// Admin decision on a convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Decline,
}

impl Decision {
    fn action(self) -> ConventionAction {
        match self {
            Self::Approve => ConventionAction::Approve,
            Self::Decline => ConventionAction::Decline,
        }
    }
}

/// PDF magic number.
const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Accepted MIME type for convention documents.
const PDF_MIME: &str = "application/pdf";

/// A convention document must declare and actually be a PDF.
pub fn is_pdf(bytes: &[u8], mime: &str) -> bool {
    bytes.len() >= PDF_MAGIC.len() && &bytes[..PDF_MAGIC.len()] == PDF_MAGIC && mime == PDF_MIME
}

/// Resolve which point/sector a new convention belongs to.
///
/// GTC_POINT actors always use their own affiliation; admins must say
/// explicitly which point they are acting for.
pub fn resolve_create_scope(
    actor: &Actor,
    gtc_point_id: Option<Uuid>,
    sector_id: Option<Uuid>,
) -> CoreResult<(Uuid, Uuid)> {
    match actor.role {
        Role::GtcPoint => {
            let point = actor
                .gtc_point_id
                .ok_or_else(|| CoreError::Conflict("user is not attached to a GTC Point".into()))?;
            let sector = actor
                .sector_id
                .ok_or_else(|| CoreError::Conflict("user is not attached to a sector".into()))?;
            Ok((point, sector))
        }
        Role::Admin => match (gtc_point_id, sector_id) {
            (Some(point), Some(sector)) => Ok((point, sector)),
            _ => Err(CoreError::Validation(
                "gtc_point_id and sector_id are required".into(),
            )),
        },
        other => Err(CoreError::Authorization(format!(
            "role {other} may not create conventions"
        ))),
    }
}

/// Create a convention in NEW for the resolved point/sector.
pub async fn create(
    pool: &PgPool,
    actor: &Actor,
    gtc_point_id: Option<Uuid>,
    sector_id: Option<Uuid>,
) -> CoreResult<Convention> {
    let (point, sector) = resolve_create_scope(actor, gtc_point_id, sector_id)?;
    let convention = queries::insert_convention(pool, point, sector).await?;
    info!(convention_id = %convention.id, gtc_point_id = %point, "convention created");
    Ok(convention)
}

/// Attach a signed PDF to a convention, advancing NEW→UPLOADED at most once.
///
/// Admins are notified only when the advance actually fired, so repeated
/// uploads do not re-announce the same convention.
pub async fn upload(
    pool: &PgPool,
    files: &dyn FileStore,
    dispatcher: &Dispatcher,
    actor: &Actor,
    convention_id: Uuid,
    upload: FileUpload,
) -> CoreResult<ConventionDocument> {
    let convention = queries::get_convention(pool, convention_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("convention {convention_id}")))?;
    authorize_on_point(actor, convention.gtc_point_id, "upload to")?;

    if transition(convention.status, ConventionAction::Upload).is_none() {
        return Err(CoreError::Conflict(format!(
            "convention is {} and upload-locked",
            convention.status
        )));
    }
    if !is_pdf(&upload.bytes, &upload.mime) {
        return Err(CoreError::Validation(
            "convention document must be a PDF".into(),
        ));
    }

    let stored = files.put(&upload).await?;

    // Document row and the conditional status advance commit or fail
    // together; the stored blob is reclaimed if they fail. The status is
    // re-read under a row lock so a concurrent decision cannot slip a
    // document into a finalized convention.
    let result: CoreResult<(ConventionDocument, bool)> = async {
        let mut tx = pool.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM conventions WHERE id = $1 FOR UPDATE",
        )
        .bind(convention_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("convention {convention_id}")))?;
        let status = ConventionStatus::try_from(status)?;
        if transition(status, ConventionAction::Upload).is_none() {
            return Err(CoreError::Conflict(format!(
                "convention is {status} and upload-locked"
            )));
        }

        let document = sqlx::query_as::<_, ConventionDocument>(
            "INSERT INTO convention_documents \
             (id, convention_id, kind, stored_name, relative_path, mime, size_bytes, checksum, uploaded_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id, convention_id, kind, stored_name, relative_path, mime, size_bytes, \
                       checksum, uploaded_by, created_at",
        )
        .bind(uuidv7())
        .bind(convention_id)
        .bind(DocumentKind::Signed.as_str())
        .bind(&stored.stored_name)
        .bind(&stored.relative_path)
        .bind(&stored.mime)
        .bind(stored.size_bytes)
        .bind(&stored.checksum)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let advanced = sqlx::query(
            "UPDATE conventions SET status = $1, updated_at = now() \
             WHERE id = $2 AND status = $3",
        )
        .bind(ConventionStatus::Uploaded.as_str())
        .bind(convention_id)
        .bind(ConventionStatus::New.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        tx.commit().await?;
        Ok((document, advanced))
    }
    .await;

    let (document, advanced) = match result {
        Ok(ok) => ok,
        Err(e) => {
            if let Err(remove_err) = files.remove(&stored.relative_path).await {
                warn!(path = %stored.relative_path, error = %remove_err, "orphaned blob cleanup failed");
            }
            return Err(e);
        }
    };

    if advanced {
        notify_admins_uploaded(pool, dispatcher, &convention).await;
    }
    Ok(document)
}

/// Finalize a convention. Valid from NEW or UPLOADED only; terminal records
/// cannot be re-decided.
pub async fn decide(
    pool: &PgPool,
    dispatcher: &Dispatcher,
    actor: &Actor,
    convention_id: Uuid,
    decision: Decision,
    internal_sales_rep: Option<String>,
) -> CoreResult<Convention> {
    require_role(&[Role::Admin], actor.role)?;

    let convention = queries::get_convention(pool, convention_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("convention {convention_id}")))?;
    let target = transition(convention.status, decision.action()).ok_or_else(|| {
        CoreError::Conflict(format!("convention is already {}", convention.status))
    })?;

    let updated = sqlx::query(
        "UPDATE conventions \
         SET status = $1, internal_sales_rep = COALESCE($2, internal_sales_rep), updated_at = now() \
         WHERE id = $3 AND status IN ($4, $5)",
    )
    .bind(target.as_str())
    .bind(internal_sales_rep.as_deref())
    .bind(convention_id)
    .bind(ConventionStatus::New.as_str())
    .bind(ConventionStatus::Uploaded.as_str())
    .execute(pool)
    .await?
    .rows_affected();
    if updated == 0 {
        // A concurrent decision got there first.
        return Err(CoreError::Conflict("convention was already decided".into()));
    }

    info!(%convention_id, status = %target, "convention decided");
    notify_point_decided(pool, dispatcher, &convention, target).await;

    queries::get_convention(pool, convention_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("convention {convention_id}")))
}

/// Delete a convention that never got anywhere (status NEW only).
///
/// Blob removal is best-effort; rows are removed in one transaction either way.
pub async fn remove(
    pool: &PgPool,
    files: &dyn FileStore,
    actor: &Actor,
    convention_id: Uuid,
) -> CoreResult<()> {
    let convention = queries::get_convention(pool, convention_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("convention {convention_id}")))?;
    authorize_on_point(actor, convention.gtc_point_id, "delete")?;

    if !deletable(convention.status) {
        return Err(CoreError::Conflict(format!(
            "convention is {} and can no longer be deleted",
            convention.status
        )));
    }

    for document in queries::list_documents(pool, convention_id).await? {
        if let Err(e) = files.remove(&document.relative_path).await {
            warn!(path = %document.relative_path, error = %e, "document blob removal failed");
        }
    }

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM convention_documents WHERE convention_id = $1")
        .bind(convention_id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM conventions WHERE id = $1 AND status = $2")
        .bind(convention_id)
        .bind(ConventionStatus::New.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if deleted == 0 {
        tx.rollback().await?;
        return Err(CoreError::Conflict(
            "convention changed state during deletion".into(),
        ));
    }
    tx.commit().await?;

    info!(%convention_id, "convention deleted");
    Ok(())
}

/// Admins may act on any convention; a GTC point only on its own.
fn authorize_on_point(actor: &Actor, gtc_point_id: Uuid, verb: &str) -> CoreResult<()> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::GtcPoint if actor.gtc_point_id == Some(gtc_point_id) => Ok(()),
        Role::GtcPoint => Err(CoreError::Authorization(format!(
            "may not {verb} another point's convention"
        ))),
        other => Err(CoreError::Authorization(format!(
            "role {other} may not {verb} conventions"
        ))),
    }
}

async fn notify_admins_uploaded(pool: &PgPool, dispatcher: &Dispatcher, convention: &Convention) {
    let admins = match recipients::admin_user_ids(pool).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, "admin recipient lookup failed");
            return;
        }
    };
    let input = NotifyInput::new(
        NotificationKind::ConventionUploaded,
        "Convention document uploaded",
        format!(
            "A signed convention document was uploaded for convention {}.",
            convention.id
        ),
    );
    dispatcher.notify_many(&admins, &input).await;
}

async fn notify_point_decided(
    pool: &PgPool,
    dispatcher: &Dispatcher,
    convention: &Convention,
    target: ConventionStatus,
) {
    let users = match recipients::point_user_ids(pool, convention.gtc_point_id).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, "point recipient lookup failed");
            return;
        }
    };
    let (kind, subject) = match target {
        ConventionStatus::Approved => (
            NotificationKind::ConventionApproved,
            "Convention approved",
        ),
        _ => (NotificationKind::ConventionDeclined, "Convention declined"),
    };
    let input = NotifyInput::new(
        kind,
        subject,
        format!("Convention {} has been {}.", convention.id, target),
    );
    dispatcher.notify_many(&users, &input).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role, point: Option<Uuid>, sector: Option<Uuid>) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            role,
            sector_id: sector,
            gtc_point_id: point,
        }
    }

    #[test]
    fn pdf_check_requires_magic_and_mime() {
        assert!(is_pdf(b"%PDF-1.4 ...", "application/pdf"));
        assert!(!is_pdf(b"%PDF-1.4 ...", "application/octet-stream"));
        assert!(!is_pdf(b"PK\x03\x04zip", "application/pdf"));
        assert!(!is_pdf(b"%PD", "application/pdf"));
        assert!(!is_pdf(b"", "application/pdf"));
    }

    #[test]
    fn point_actor_uses_its_own_affiliation() {
        let point = Uuid::new_v4();
        let sector = Uuid::new_v4();
        let actor = actor(Role::GtcPoint, Some(point), Some(sector));

        // Explicit ids from a point actor are ignored, not honored.
        let (p, s) = resolve_create_scope(&actor, Some(Uuid::new_v4()), None).unwrap();
        assert_eq!((p, s), (point, sector));
    }

    #[test]
    fn unaffiliated_point_actor_conflicts() {
        let err = resolve_create_scope(&actor(Role::GtcPoint, None, None), None, None).unwrap_err();
        match err {
            CoreError::Conflict(msg) => {
                assert_eq!(msg, "user is not attached to a GTC Point");
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn admin_must_supply_both_ids() {
        let admin = actor(Role::Admin, None, None);
        assert!(matches!(
            resolve_create_scope(&admin, Some(Uuid::new_v4()), None),
            Err(CoreError::Validation(_))
        ));
        assert!(
            resolve_create_scope(&admin, Some(Uuid::new_v4()), Some(Uuid::new_v4())).is_ok()
        );
    }

    #[test]
    fn other_roles_may_not_create() {
        for role in [Role::SectorOwner, Role::External] {
            assert!(matches!(
                resolve_create_scope(&actor(role, None, None), None, None),
                Err(CoreError::Authorization(_))
            ));
        }
    }

    #[test]
    fn ownership_gate_on_point_operations() {
        let point = Uuid::new_v4();
        assert!(authorize_on_point(&actor(Role::Admin, None, None), point, "x").is_ok());
        assert!(
            authorize_on_point(&actor(Role::GtcPoint, Some(point), None), point, "x").is_ok()
        );
        assert!(matches!(
            authorize_on_point(&actor(Role::GtcPoint, Some(Uuid::new_v4()), None), point, "x"),
            Err(CoreError::Authorization(_))
        ));
        assert!(matches!(
            authorize_on_point(&actor(Role::SectorOwner, None, None), point, "x"),
            Err(CoreError::Authorization(_))
        ));
    }
}
