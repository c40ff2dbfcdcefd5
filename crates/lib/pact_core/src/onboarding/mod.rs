// @zen-component: ONB-Workflow
//
//! Onboarding workflow operations.
//!
//! A prospective point travels DRAFT → SUBMITTED → APPROVED → COMPLETED (or
//! DECLINED). Approval materializes the GTC point and issues the registration
//! grant; completion creates the login-capable user. Service/sector linkage
//! is checked strictly when the link is created and re-checked leniently at
//! approval, because a reference valid at submission may have drifted.

pub mod queries;
pub mod status;

use chrono::{Duration, Utc};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::auth::roles::{Role, require_role};
use crate::auth::tokens::TokenAuthority;
use crate::error::{CoreError, CoreResult};
use crate::files::StoredFile;
use crate::models::notification::NotificationKind;
use crate::models::onboarding::{PointOnboarding, SubmissionFields};
use crate::models::org::Service;
use crate::models::user::{Actor, User};
use crate::notify::queries as recipients;
use crate::notify::{Dispatcher, NotifyInput};
use crate::uuid::uuidv7;
use self::status::{OnboardingAction, OnboardingStatus, transition};

/// Onboarding link lifetime: 7 days.
const LINK_TTL_DAYS: i64 = 7;

/// Outcome of an approval, including which service selections survived the
/// re-validation.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub onboarding: PointOnboarding,
    pub gtc_point_id: Uuid,
    pub enabled_service_ids: Vec<Uuid>,
    pub dropped_service_ids: Vec<Uuid>,
}

/// Generate an opaque link token (64 alphanumeric chars).
fn generate_link_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// SHA-256 hash a link token for storage.
fn hash_link_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Split requested service IDs into those that exist and belong to `sector_id`
/// and those that do not (unknown, or attached to another sector).
pub fn partition_by_sector(
    requested: &[Uuid],
    services: &[Service],
    sector_id: Uuid,
) -> (Vec<Uuid>, Vec<Uuid>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for &id in requested {
        match services.iter().find(|s| s.id == id) {
            Some(service) if service.sector_id == sector_id => valid.push(id),
            _ => invalid.push(id),
        }
    }
    (valid, invalid)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Create an onboarding link for a prospective point.
///
/// Strict service validation: any requested service outside the sector fails
/// the whole call before anything is written.
pub async fn create_link(
    pool: &PgPool,
    dispatcher: &Dispatcher,
    actor: &Actor,
    sector_id: Uuid,
    email: &str,
    name: &str,
    service_ids: &[Uuid],
    base_url: &str,
) -> CoreResult<PointOnboarding> {
    require_role(&[Role::Admin], actor.role)?;
    if email.is_empty() || !email.contains('@') {
        return Err(CoreError::Validation("a valid email is required".into()));
    }
    if name.is_empty() {
        return Err(CoreError::Validation("a name is required".into()));
    }
    let sector = queries::get_sector(pool, sector_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("sector {sector_id}")))?;

    let services = queries::services_by_ids(pool, service_ids).await?;
    let (selected, invalid) = partition_by_sector(service_ids, &services, sector_id);
    if !invalid.is_empty() {
        return Err(CoreError::Validation(format!(
            "services do not belong to sector {}: {invalid:?}",
            sector.name
        )));
    }

    let token = generate_link_token();
    let expires_at = Utc::now() + Duration::days(LINK_TTL_DAYS);

    let mut tx = pool.begin().await?;
    let onboarding = sqlx::query_as::<_, PointOnboarding>(
        "INSERT INTO point_onboardings \
         (id, sector_id, email, name, onboarding_token_hash, onboarding_expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, sector_id, email, name, status, phone, vat_number, address, \
                   signature_path, onboarding_expires_at, registration_jti, \
                   registration_expires_at, gtc_point_id, created_at, updated_at",
    )
    .bind(uuidv7())
    .bind(sector_id)
    .bind(email)
    .bind(name)
    .bind(hash_link_token(&token))
    .bind(expires_at)
    .fetch_one(&mut *tx)
    .await?;
    replace_selected_services(&mut tx, onboarding.id, &selected).await?;
    tx.commit().await?;

    info!(onboarding_id = %onboarding.id, sector = %sector.name, "onboarding link created");
    dispatcher.send_email(
        email,
        &format!("Invitation to join the {} network", sector.name),
        &format!(
            "<p>Hello {name},</p>\
             <p>You have been invited to join as a GTC point. \
             Complete your onboarding here: <a href=\"{0}\">{0}</a></p>\
             <p>The link expires in {LINK_TTL_DAYS} days.</p>",
            onboarding_link(base_url, &token)
        ),
    );
    Ok(onboarding)
}

/// Applicant submission through the onboarding link.
///
/// When a service selection is submitted it fully replaces the previous one.
pub async fn submit(
    pool: &PgPool,
    dispatcher: &Dispatcher,
    token: &str,
    fields: &SubmissionFields,
    selected_service_ids: Option<&[Uuid]>,
    signature: Option<&StoredFile>,
    base_url: &str,
) -> CoreResult<PointOnboarding> {
    let onboarding = queries::find_by_token_hash(pool, &hash_link_token(token))
        .await?
        .ok_or_else(|| CoreError::NotFound("onboarding link".into()))?;
    let expires_at = onboarding
        .onboarding_expires_at
        .ok_or_else(|| CoreError::NotFound("onboarding link".into()))?;
    if expires_at <= Utc::now() {
        return Err(CoreError::ExpiredToken);
    }
    transition(onboarding.status, OnboardingAction::Submit).ok_or_else(|| {
        CoreError::Conflict(format!("onboarding is already {}", onboarding.status))
    })?;

    let mut tx = pool.begin().await?;
    let updated = sqlx::query(
        "UPDATE point_onboardings \
         SET status = $1, phone = $2, vat_number = $3, address = $4, \
             signature_path = COALESCE($5, signature_path), updated_at = now() \
         WHERE id = $6 AND status = $7",
    )
    .bind(OnboardingStatus::Submitted.as_str())
    .bind(fields.phone.as_deref())
    .bind(fields.vat_number.as_deref())
    .bind(fields.address.as_deref())
    .bind(signature.map(|s| s.relative_path.as_str()))
    .bind(onboarding.id)
    .bind(OnboardingStatus::Draft.as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if updated == 0 {
        tx.rollback().await?;
        return Err(CoreError::Conflict("onboarding was already submitted".into()));
    }
    if let Some(selected) = selected_service_ids {
        replace_selected_services(&mut tx, onboarding.id, selected).await?;
    }
    tx.commit().await?;

    info!(onboarding_id = %onboarding.id, "onboarding submitted");
    let reviewers = review_recipients(pool, onboarding.sector_id).await;
    let input = NotifyInput::new(
        NotificationKind::OnboardingSubmitted,
        "Onboarding submitted for review",
        format!(
            "{} ({}) submitted their onboarding. Review it here: {}",
            onboarding.name,
            onboarding.email,
            review_link(base_url, onboarding.id)
        ),
    );
    dispatcher.notify_many(&reviewers, &input).await;

    queries::get_onboarding(pool, onboarding.id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("onboarding {}", onboarding.id)))
}

/// Approve a submitted onboarding: materialize the GTC point, enable the
/// still-valid service selections, and issue the registration grant.
///
/// Selections whose service has drifted to another sector since submission
/// are dropped with a warning instead of failing the approval.
pub async fn approve(
    pool: &PgPool,
    dispatcher: &Dispatcher,
    authority: &TokenAuthority,
    actor: &Actor,
    onboarding_id: Uuid,
    base_url: &str,
) -> CoreResult<ApprovalOutcome> {
    require_role(&[Role::Admin], actor.role)?;

    let onboarding = queries::get_onboarding(pool, onboarding_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("onboarding {onboarding_id}")))?;
    transition(onboarding.status, OnboardingAction::Approve).ok_or_else(|| {
        CoreError::Conflict(format!("onboarding is {}", onboarding.status))
    })?;

    let requested = queries::selected_service_ids(pool, onboarding_id).await?;
    let services = queries::services_by_ids(pool, &requested).await?;
    let (enabled, dropped) = partition_by_sector(&requested, &services, onboarding.sector_id);
    for service_id in &dropped {
        warn!(
            %onboarding_id,
            %service_id,
            "selected service no longer belongs to the sector, dropping"
        );
    }

    let grant = authority.issue_registration(onboarding_id).await?;

    let result: CoreResult<Uuid> = async {
        let mut tx = pool.begin().await?;

        // Idempotent materialization keyed by the applicant's email. The
        // state guard, not this upsert, is what blocks re-approval.
        let gtc_point_id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO gtc_points (name, email, sector_id) VALUES ($1, $2, $3) \
             ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name, sector_id = EXCLUDED.sector_id \
             RETURNING id",
        )
        .bind(&onboarding.name)
        .bind(&onboarding.email)
        .bind(onboarding.sector_id)
        .fetch_one(&mut *tx)
        .await?;

        for service_id in &enabled {
            sqlx::query(
                "INSERT INTO gtc_point_services (gtc_point_id, service_id, status) \
                 VALUES ($1, $2, 'ENABLED') \
                 ON CONFLICT (gtc_point_id, service_id) DO UPDATE SET status = 'ENABLED'",
            )
            .bind(gtc_point_id)
            .bind(service_id)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query(
            "UPDATE point_onboardings \
             SET status = $1, gtc_point_id = $2, registration_jti = $3, \
                 registration_expires_at = $4, updated_at = now() \
             WHERE id = $5 AND status = $6",
        )
        .bind(OnboardingStatus::Approved.as_str())
        .bind(gtc_point_id)
        .bind(&grant.jti)
        .bind(grant.expires_at)
        .bind(onboarding_id)
        .bind(OnboardingStatus::Submitted.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            tx.rollback().await?;
            return Err(CoreError::Conflict(
                "onboarding was already decided".into(),
            ));
        }

        tx.commit().await?;
        Ok(gtc_point_id)
    }
    .await;

    let gtc_point_id = match result {
        Ok(id) => id,
        Err(e) => {
            // The grant was never handed out; reclaim it early.
            if let Err(revoke_err) = authority.revoke_registration(&grant.jti).await {
                warn!(error = %revoke_err, "failed to reclaim unused registration grant");
            }
            return Err(e);
        }
    };

    info!(%onboarding_id, %gtc_point_id, enabled = enabled.len(), "onboarding approved");

    dispatcher.send_email(
        &onboarding.email,
        "Your onboarding has been approved",
        &format!(
            "<p>Hello {},</p>\
             <p>Your onboarding was approved. Create your account here: \
             <a href=\"{1}\">{1}</a></p>",
            onboarding.name,
            registration_link(base_url, &grant.token)
        ),
    );

    let enabled_codes: Vec<&str> = services
        .iter()
        .filter(|s| enabled.contains(&s.id))
        .map(|s| s.code.as_str())
        .collect();
    let reviewers = review_recipients(pool, onboarding.sector_id).await;
    let input = NotifyInput::new(
        NotificationKind::OnboardingApproved,
        "Onboarding approved",
        format!(
            "{} ({}) was approved. Enabled services: {}.",
            onboarding.name,
            onboarding.email,
            if enabled_codes.is_empty() {
                "none".to_string()
            } else {
                enabled_codes.join(", ")
            }
        ),
    );
    dispatcher.notify_many(&reviewers, &input).await;

    let onboarding = queries::get_onboarding(pool, onboarding_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("onboarding {onboarding_id}")))?;
    Ok(ApprovalOutcome {
        onboarding,
        gtc_point_id,
        enabled_service_ids: enabled,
        dropped_service_ids: dropped,
    })
}

/// Decline a submitted onboarding.
pub async fn decline(
    pool: &PgPool,
    dispatcher: &Dispatcher,
    actor: &Actor,
    onboarding_id: Uuid,
) -> CoreResult<PointOnboarding> {
    require_role(&[Role::Admin], actor.role)?;

    let onboarding = queries::get_onboarding(pool, onboarding_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("onboarding {onboarding_id}")))?;
    transition(onboarding.status, OnboardingAction::Decline).ok_or_else(|| {
        CoreError::Conflict(format!("onboarding is {}", onboarding.status))
    })?;

    let updated = sqlx::query(
        "UPDATE point_onboardings SET status = $1, updated_at = now() \
         WHERE id = $2 AND status = $3",
    )
    .bind(OnboardingStatus::Declined.as_str())
    .bind(onboarding_id)
    .bind(OnboardingStatus::Submitted.as_str())
    .execute(pool)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(CoreError::Conflict("onboarding was already decided".into()));
    }

    info!(%onboarding_id, "onboarding declined");
    dispatcher.send_email(
        &onboarding.email,
        "About your onboarding request",
        &format!(
            "<p>Hello {},</p><p>We are sorry: your onboarding request was declined.</p>",
            onboarding.name
        ),
    );
    let reviewers = review_recipients(pool, onboarding.sector_id).await;
    let input = NotifyInput::new(
        NotificationKind::OnboardingDeclined,
        "Onboarding declined",
        format!("{} ({}) was declined.", onboarding.name, onboarding.email),
    );
    dispatcher.notify_many(&reviewers, &input).await;

    queries::get_onboarding(pool, onboarding_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("onboarding {onboarding_id}")))
}

/// Final step: the applicant redeems the registration grant and becomes a
/// login-capable GTC_POINT user bound to the materialized point.
pub async fn complete_registration(
    pool: &PgPool,
    dispatcher: &Dispatcher,
    authority: &TokenAuthority,
    token: &str,
    password: &str,
) -> CoreResult<User> {
    let claims = authority.verify_registration(token).await?;

    let onboarding = queries::get_onboarding(pool, claims.sub)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("onboarding {}", claims.sub)))?;
    transition(onboarding.status, OnboardingAction::CompleteRegistration).ok_or_else(|| {
        CoreError::Conflict(format!("onboarding is {}", onboarding.status))
    })?;
    // A re-issued grant supersedes older tokens even while they verify.
    if onboarding.registration_jti.as_deref() != Some(claims.jti.as_str()) {
        return Err(CoreError::RevokedToken);
    }
    let gtc_point_id = onboarding.gtc_point_id.ok_or_else(|| {
        CoreError::Internal("approved onboarding has no materialized point".into())
    })?;

    if password.len() < 8 {
        return Err(CoreError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    let password_hash = hash_password(password)?;

    let mut tx = pool.begin().await?;
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (email, name, password_hash, role, sector_id, gtc_point_id) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, email, name, role, sector_id, gtc_point_id, created_at",
    )
    .bind(&onboarding.email)
    .bind(&onboarding.name)
    .bind(&password_hash)
    .bind(Role::GtcPoint.as_str())
    .bind(onboarding.sector_id)
    .bind(gtc_point_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_unique(e, "email already registered"))?;

    let updated = sqlx::query(
        "UPDATE point_onboardings SET status = $1, updated_at = now() \
         WHERE id = $2 AND status = $3",
    )
    .bind(OnboardingStatus::Completed.as_str())
    .bind(onboarding.id)
    .bind(OnboardingStatus::Approved.as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if updated == 0 {
        tx.rollback().await?;
        return Err(CoreError::Conflict(
            "onboarding registration was already completed".into(),
        ));
    }
    tx.commit().await?;

    // Single use: the grant dies with the registration.
    if let Err(e) = authority.revoke_registration(&claims.jti).await {
        warn!(error = %e, "failed to revoke redeemed registration grant");
    }

    info!(onboarding_id = %onboarding.id, user_id = %user.id, "registration completed");

    let welcome = NotifyInput::new(
        NotificationKind::Welcome,
        "Welcome aboard",
        format!("Welcome, {}! Your GTC point account is ready.", onboarding.name),
    );
    if let Err(e) = dispatcher.notify_one(user.id, &welcome).await {
        warn!(error = %e, "welcome notification failed");
    }
    let reviewers = review_recipients(pool, onboarding.sector_id).await;
    let input = NotifyInput::new(
        NotificationKind::OnboardingCompleted,
        "Onboarding completed",
        format!("{} ({}) completed registration.", onboarding.name, onboarding.email),
    );
    dispatcher.notify_many(&reviewers, &input).await;

    Ok(user)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Full replace of the selection set.
async fn replace_selected_services(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    onboarding_id: Uuid,
    service_ids: &[Uuid],
) -> CoreResult<()> {
    sqlx::query("DELETE FROM onboarding_services WHERE onboarding_id = $1")
        .bind(onboarding_id)
        .execute(&mut **tx)
        .await?;
    for service_id in service_ids {
        sqlx::query(
            "INSERT INTO onboarding_services (onboarding_id, service_id) VALUES ($1, $2)",
        )
        .bind(onboarding_id)
        .bind(service_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Admins plus the sector's owners.
async fn review_recipients(pool: &PgPool, sector_id: Uuid) -> Vec<Uuid> {
    let mut ids = match recipients::admin_user_ids(pool).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, "admin recipient lookup failed");
            Vec::new()
        }
    };
    match recipients::sector_owner_ids(pool, sector_id).await {
        Ok(owners) => ids.extend(owners),
        Err(e) => warn!(error = %e, "sector owner recipient lookup failed"),
    }
    ids.dedup();
    ids
}

fn onboarding_link(base_url: &str, token: &str) -> String {
    format!("{}/onboarding/{token}", base_url.trim_end_matches('/'))
}

fn registration_link(base_url: &str, token: &str) -> String {
    format!("{}/register/{token}", base_url.trim_end_matches('/'))
}

fn review_link(base_url: &str, onboarding_id: Uuid) -> String {
    format!("{}/admin/onboardings/{onboarding_id}", base_url.trim_end_matches('/'))
}

fn map_unique(e: sqlx::Error, msg: &str) -> CoreError {
    if let sqlx::Error::Database(db) = &e
        && db.code().as_deref() == Some("23505")
    {
        return CoreError::Conflict(msg.into());
    }
    CoreError::Db(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn service(sector_id: Uuid) -> Service {
        Service {
            id: Uuid::new_v4(),
            code: "SVC".into(),
            name: "Service".into(),
            sector_id,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn partition_keeps_matching_sector_only() {
        let sector = Uuid::new_v4();
        let other = Uuid::new_v4();
        let in_sector = service(sector);
        let elsewhere = service(other);
        let unknown = Uuid::new_v4();

        let requested = vec![in_sector.id, elsewhere.id, unknown];
        let services = vec![in_sector.clone(), elsewhere];
        let (valid, invalid) = partition_by_sector(&requested, &services, sector);

        assert_eq!(valid, vec![in_sector.id]);
        assert_eq!(invalid.len(), 2);
    }

    #[test]
    fn partition_of_empty_request_is_empty() {
        let (valid, invalid) = partition_by_sector(&[], &[], Uuid::new_v4());
        assert!(valid.is_empty());
        assert!(invalid.is_empty());
    }

    #[test]
    fn link_tokens_are_long_random_and_hash_stably() {
        let a = generate_link_token();
        let b = generate_link_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);

        assert_eq!(hash_link_token(&a), hash_link_token(&a));
        assert_ne!(hash_link_token(&a), hash_link_token(&b));
        assert_eq!(hash_link_token(&a).len(), 64);
    }

    #[test]
    fn links_are_rooted_at_the_base_url() {
        assert_eq!(
            onboarding_link("https://pact.example.it/", "tok"),
            "https://pact.example.it/onboarding/tok"
        );
        assert_eq!(
            registration_link("https://pact.example.it", "tok"),
            "https://pact.example.it/register/tok"
        );
        let id = Uuid::new_v4();
        assert_eq!(
            review_link("https://pact.example.it", id),
            format!("https://pact.example.it/admin/onboardings/{id}")
        );
    }
}
