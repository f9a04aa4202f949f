use anyhow::{Result, bail};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric, rngs::OsRng};
use tracing::error;
use uuid::Uuid;

use crate::{
    db::{
        Database,
        errors::is_unique_violation,
        share_link_repo::{
            CreateShareLinkParams, ReactivateShareLinkParams, ShareLinkRepositoryRef,
        },
    },
    ids::{DocumentId, MembershipId, WorkspaceId},
    roles::ShareLinkAccess,
};

/// Length of the opaque bearer token. 32 characters over a 62-symbol
/// alphabet gives just over 190 bits of entropy.
pub const SHARE_TOKEN_LENGTH: usize = 32;

/// A bearer-token capability granting a fixed access level to one document,
/// independent of membership. Tokens are unique forever, including across
/// revoked links; a revoked link is reactivated, never re-minted.
#[derive(Debug, Clone)]
pub struct ShareLinkRecord {
    pub id: String,
    pub document_id: DocumentId,
    pub workspace_id: WorkspaceId,
    pub token: String,
    pub access_level: ShareLinkAccess,
    pub password_hash: Option<String>,
    pub expires_at: Option<i64>,
    pub revoked_at: Option<i64>,
    pub created_by_membership_id: MembershipId,
    pub is_public: bool,
    pub created_at: i64,
}

impl ShareLinkRecord {
    /// Active means not revoked and not past its expiry. Expiry is derived
    /// at read time; it is never written back as a state transition.
    pub fn is_active(&self, now: i64) -> bool {
        self.revoked_at.is_none() && self.expires_at.is_none_or(|at| at > now)
    }

    pub fn requires_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewShareLink {
    pub document_id: String,
    pub workspace_id: String,
    pub created_by_membership_id: String,
    pub access_level: ShareLinkAccess,
    pub password_hash: Option<String>,
    pub expires_at: Option<i64>,
    pub is_public: bool,
}

#[derive(Clone)]
pub struct ShareLinkStore {
    repo: ShareLinkRepositoryRef,
}

impl ShareLinkStore {
    const TOKEN_CREATE_ATTEMPTS: usize = 3;

    pub fn new(database: &Database) -> Self {
        Self {
            repo: database.repositories().share_link_repo(),
        }
    }

    pub fn with_repo(repo: ShareLinkRepositoryRef) -> Self {
        Self { repo }
    }

    /// Mint a link with a fresh token. A token collision is only plausible
    /// under a broken random source, so retries are bounded and exhausting
    /// them is surfaced as a fault rather than a validation error.
    pub async fn create(&self, link: NewShareLink) -> Result<ShareLinkRecord> {
        for _ in 0..Self::TOKEN_CREATE_ATTEMPTS {
            let params = CreateShareLinkParams {
                id: Uuid::new_v4().to_string(),
                document_id: link.document_id.clone(),
                workspace_id: link.workspace_id.clone(),
                token: generate_share_token(),
                access_level: link.access_level,
                password_hash: link.password_hash.clone(),
                expires_at: link.expires_at,
                created_by_membership_id: link.created_by_membership_id.clone(),
                is_public: link.is_public,
                created_at: Utc::now().timestamp(),
            };

            match self.repo.insert(&params).await {
                Ok(record) => return Ok(record),
                Err(err) if is_unique_violation(&err) => continue,
                Err(err) => return Err(err),
            }
        }

        error!(
            document_id = %link.document_id,
            "exhausted share token generation attempts"
        );
        bail!("failed to generate a unique share token");
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<ShareLinkRecord>> {
        self.repo.find_by_token(token).await
    }

    pub async fn find_active_by_token(&self, token: &str) -> Result<Option<ShareLinkRecord>> {
        let now = Utc::now().timestamp();
        self.repo.find_active_by_token(token, now).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<ShareLinkRecord>> {
        self.repo.find_by_id(id).await
    }

    pub async fn find_latest_by_document(
        &self,
        document_id: &str,
    ) -> Result<Option<ShareLinkRecord>> {
        self.repo.find_latest_by_document(document_id).await
    }

    pub async fn list_by_document(&self, document_id: &str) -> Result<Vec<ShareLinkRecord>> {
        self.repo.list_by_document(document_id).await
    }

    /// Revoking an already-revoked link keeps the original revocation time.
    pub async fn revoke(&self, id: &str) -> Result<()> {
        let revoked_at = Utc::now().timestamp();
        self.repo.revoke(id, revoked_at).await
    }

    /// Clear the revocation marker and replace access level, password and
    /// expiry in one write. The token string is untouched, so references to
    /// a previously shared URL become valid again.
    pub async fn reactivate(
        &self,
        id: &str,
        params: &ReactivateShareLinkParams,
    ) -> Result<ShareLinkRecord> {
        self.repo.reactivate(id, params).await
    }

    pub async fn update_options(&self, id: &str, is_public: bool) -> Result<ShareLinkRecord> {
        self.repo.update_options(id, is_public).await
    }

    /// Active public links created by one membership, for profile surfacing.
    pub async fn find_public_by_membership(
        &self,
        membership_id: &str,
    ) -> Result<Vec<ShareLinkRecord>> {
        let now = Utc::now().timestamp();
        self.repo.find_public_by_membership(membership_id, now).await
    }
}

/// Opaque, URL-safe, case-sensitive, fixed-length bearer secret. Never log
/// the full value.
pub fn generate_share_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(SHARE_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
