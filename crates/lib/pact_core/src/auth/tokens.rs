// @zen-component: AUTH-TokenAuthority
//
//! Issuance, verification, rotation and revocation of credentials.
//!
//! Access tokens are pure signatures with no server-side state. Refresh, invite
//! and registration tokens are grants: each carries a `jti` that must still
//! exist in the session store at verification time, so revocation works
//! independently of the token's cryptographic validity.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::auth::jwt::{
    self, AccessClaims, GrantClaims, GrantKind, generate_access_token, generate_grant_token,
    verify_access_token,
};
use crate::auth::roles::Role;
use crate::auth::store::{SessionRecord, SessionStore};
use crate::error::{CoreError, CoreResult};
use crate::uuid::uuidv7;

/// Default access token lifetime: 15 minutes.
const ACCESS_TTL_MINS: i64 = 15;

/// Default grant lifetimes: 7 days.
const GRANT_TTL_DAYS: i64 = 7;

/// Credential lifetimes, overridable for tests.
#[derive(Debug, Clone, Copy)]
pub struct TokenTtls {
    pub access: Duration,
    pub refresh: Duration,
    pub invite: Duration,
    pub registration: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            access: Duration::minutes(ACCESS_TTL_MINS),
            refresh: Duration::days(GRANT_TTL_DAYS),
            invite: Duration::days(GRANT_TTL_DAYS),
            registration: Duration::days(GRANT_TTL_DAYS),
        }
    }
}

/// A freshly issued grant token plus its store coordinates.
#[derive(Debug, Clone)]
pub struct IssuedGrant {
    pub token: String,
    pub jti: String,
    pub subject: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies every credential the system hands out.
#[derive(Clone)]
pub struct TokenAuthority {
    store: Arc<dyn SessionStore>,
    secret: Vec<u8>,
    ttls: TokenTtls,
}

impl TokenAuthority {
    pub fn new(store: Arc<dyn SessionStore>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            store,
            secret: secret.into(),
            ttls: TokenTtls::default(),
        }
    }

    pub fn with_ttls(mut self, ttls: TokenTtls) -> Self {
        self.ttls = ttls;
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Access tokens
    // -----------------------------------------------------------------------

    /// Sign a short-lived access token. No side effects.
    pub fn issue_access(&self, user_id: Uuid, email: &str, role: Role) -> CoreResult<String> {
        generate_access_token(user_id, email, role, self.ttls.access, &self.secret)
    }

    /// Signature + expiry check only.
    pub fn verify_access(&self, token: &str) -> CoreResult<AccessClaims> {
        verify_access_token(token, &self.secret)
    }

    // -----------------------------------------------------------------------
    // Refresh grants
    // -----------------------------------------------------------------------

    /// Issue a refresh token and record its grant.
    pub async fn issue_refresh(&self, user_id: Uuid) -> CoreResult<IssuedGrant> {
        self.issue_grant(user_id, GrantKind::Refresh, self.ttls.refresh)
            .await
    }

    /// Verify a refresh token against signature, expiry and the live grant.
    /// A missing or expired grant fails with `RevokedToken` even when the
    /// signature is still valid.
    pub async fn verify_refresh(&self, token: &str) -> CoreResult<GrantClaims> {
        self.verify_grant(token, GrantKind::Refresh).await
    }

    /// Rotate a refresh token: the old grant is atomically consumed
    /// (`take`), then a new one is issued. Of two concurrent rotations with
    /// the same token, exactly one obtains the grant; the other sees
    /// `RevokedToken`.
    pub async fn rotate(&self, token: &str) -> CoreResult<IssuedGrant> {
        let claims = self.decode_expecting(token, GrantKind::Refresh)?;
        let record = self
            .store
            .take(&claims.jti)
            .await?
            .ok_or(CoreError::RevokedToken)?;
        if record.kind != GrantKind::Refresh {
            return Err(kind_mismatch(GrantKind::Refresh, record.kind));
        }
        self.issue_refresh(record.subject).await
    }

    /// Drop a refresh grant. Idempotent.
    pub async fn revoke(&self, jti: &str) -> CoreResult<()> {
        self.store.delete(jti).await
    }

    // -----------------------------------------------------------------------
    // Invite grants
    // -----------------------------------------------------------------------

    /// Issue a single-purpose account-activation token.
    pub async fn issue_invite(&self, user_id: Uuid) -> CoreResult<IssuedGrant> {
        self.issue_grant(user_id, GrantKind::Invite, self.ttls.invite)
            .await
    }

    pub async fn verify_invite(&self, token: &str) -> CoreResult<GrantClaims> {
        self.verify_grant(token, GrantKind::Invite).await
    }

    pub async fn revoke_invite(&self, jti: &str) -> CoreResult<()> {
        self.store.delete(jti).await
    }

    // -----------------------------------------------------------------------
    // Registration grants (onboarding)
    // -----------------------------------------------------------------------

    /// Issue the token that unlocks registration for one onboarding record.
    /// The grant subject is the onboarding ID, not a user ID.
    pub async fn issue_registration(&self, onboarding_id: Uuid) -> CoreResult<IssuedGrant> {
        self.issue_grant(onboarding_id, GrantKind::Registration, self.ttls.registration)
            .await
    }

    pub async fn verify_registration(&self, token: &str) -> CoreResult<GrantClaims> {
        self.verify_grant(token, GrantKind::Registration).await
    }

    pub async fn revoke_registration(&self, jti: &str) -> CoreResult<()> {
        self.store.delete(jti).await
    }

    // -----------------------------------------------------------------------
    // Shared grant plumbing
    // -----------------------------------------------------------------------

    async fn issue_grant(
        &self,
        subject: Uuid,
        kind: GrantKind,
        ttl: Duration,
    ) -> CoreResult<IssuedGrant> {
        let jti = uuidv7().to_string();
        let expires_at = Utc::now() + ttl;
        let token = generate_grant_token(subject, &jti, kind, ttl, &self.secret)?;
        self.store
            .put(
                &jti,
                SessionRecord {
                    subject,
                    kind,
                    expires_at,
                },
            )
            .await?;
        Ok(IssuedGrant {
            token,
            jti,
            subject,
            expires_at,
        })
    }

    async fn verify_grant(&self, token: &str, expected: GrantKind) -> CoreResult<GrantClaims> {
        let claims = self.decode_expecting(token, expected)?;
        let record = self
            .store
            .get(&claims.jti)
            .await?
            .ok_or(CoreError::RevokedToken)?;
        if record.kind != expected {
            return Err(kind_mismatch(expected, record.kind));
        }
        Ok(claims)
    }

    fn decode_expecting(&self, token: &str, expected: GrantKind) -> CoreResult<GrantClaims> {
        let claims = jwt::decode_grant_token(token, &self.secret)?;
        if claims.kind != expected {
            return Err(kind_mismatch(expected, claims.kind));
        }
        Ok(claims)
    }
}

fn kind_mismatch(expected: GrantKind, actual: GrantKind) -> CoreError {
    CoreError::InvalidGrantKind {
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemorySessionStore;

    fn authority() -> TokenAuthority {
        TokenAuthority::new(Arc::new(MemorySessionStore::new()), "test-secret")
    }

    #[tokio::test]
    async fn refresh_round_trip() {
        let authority = authority();
        let user = Uuid::new_v4();

        let grant = authority.issue_refresh(user).await.unwrap();
        let claims = authority.verify_refresh(&grant.token).await.unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.jti, grant.jti);
    }

    #[tokio::test]
    async fn revoked_refresh_fails_despite_valid_signature() {
        let authority = authority();
        let grant = authority.issue_refresh(Uuid::new_v4()).await.unwrap();

        authority.revoke(&grant.jti).await.unwrap();
        assert!(matches!(
            authority.verify_refresh(&grant.token).await,
            Err(CoreError::RevokedToken)
        ));
    }

    #[tokio::test]
    async fn rotation_consumes_the_old_grant() {
        let authority = authority();
        let user = Uuid::new_v4();
        let old = authority.issue_refresh(user).await.unwrap();

        let new = authority.rotate(&old.token).await.unwrap();
        assert_ne!(new.jti, old.jti);
        assert!(authority.verify_refresh(&new.token).await.is_ok());

        // Old token is dead; a second rotation attempt with it fails.
        assert!(matches!(
            authority.verify_refresh(&old.token).await,
            Err(CoreError::RevokedToken)
        ));
        assert!(matches!(
            authority.rotate(&old.token).await,
            Err(CoreError::RevokedToken)
        ));
    }

    #[tokio::test]
    async fn invite_presented_as_refresh_is_a_kind_mismatch() {
        let authority = authority();
        let invite = authority.issue_invite(Uuid::new_v4()).await.unwrap();

        assert!(matches!(
            authority.verify_refresh(&invite.token).await,
            Err(CoreError::InvalidGrantKind { .. })
        ));
        // And the other way round.
        let refresh = authority.issue_refresh(Uuid::new_v4()).await.unwrap();
        assert!(matches!(
            authority.verify_invite(&refresh.token).await,
            Err(CoreError::InvalidGrantKind { .. })
        ));
    }

    #[tokio::test]
    async fn expired_store_record_reads_as_revoked() {
        let authority = authority();
        let grant = authority.issue_invite(Uuid::new_v4()).await.unwrap();

        // Age the backing record past its expiry; the signature stays valid.
        authority
            .store()
            .put(
                &grant.jti,
                SessionRecord {
                    subject: Uuid::new_v4(),
                    kind: GrantKind::Invite,
                    expires_at: Utc::now() - Duration::seconds(1),
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            authority.verify_invite(&grant.token).await,
            Err(CoreError::RevokedToken)
        ));
    }

    #[tokio::test]
    async fn registration_grant_subject_is_the_onboarding_id() {
        let authority = authority();
        let onboarding_id = Uuid::new_v4();

        let grant = authority.issue_registration(onboarding_id).await.unwrap();
        let claims = authority.verify_registration(&grant.token).await.unwrap();
        assert_eq!(claims.sub, onboarding_id);

        // Single-use: once revoked, verification fails.
        authority.revoke_registration(&claims.jti).await.unwrap();
        assert!(matches!(
            authority.verify_registration(&grant.token).await,
            Err(CoreError::RevokedToken)
        ));
    }
}
