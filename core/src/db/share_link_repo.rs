use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::{roles::ShareLinkAccess, share_link::ShareLinkRecord};

#[derive(Debug, Clone)]
pub struct CreateShareLinkParams {
    pub id: String,
    pub document_id: String,
    pub workspace_id: String,
    pub token: String,
    pub access_level: ShareLinkAccess,
    pub password_hash: Option<String>,
    pub expires_at: Option<i64>,
    pub created_by_membership_id: String,
    pub is_public: bool,
    pub created_at: i64,
}

/// Replacement state applied when a revoked link is brought back. The token
/// and document binding never change.
#[derive(Debug, Clone)]
pub struct ReactivateShareLinkParams {
    pub access_level: ShareLinkAccess,
    pub password_hash: Option<String>,
    pub expires_at: Option<i64>,
    pub is_public: bool,
}

#[async_trait]
pub trait ShareLinkRepository: Send + Sync {
    /// Fails with a uniqueness violation if the token already exists; the
    /// store layer owns retrying with a fresh token.
    async fn insert(&self, params: &CreateShareLinkParams) -> Result<ShareLinkRecord>;

    async fn find_by_token(&self, token: &str) -> Result<Option<ShareLinkRecord>>;

    /// Pre-filtered to links that are neither revoked nor expired at `now`.
    async fn find_active_by_token(&self, token: &str, now: i64)
    -> Result<Option<ShareLinkRecord>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<ShareLinkRecord>>;

    async fn find_latest_by_document(&self, document_id: &str)
    -> Result<Option<ShareLinkRecord>>;

    async fn list_by_document(&self, document_id: &str) -> Result<Vec<ShareLinkRecord>>;

    /// No-op on a link that already carries a revocation timestamp.
    async fn revoke(&self, id: &str, revoked_at: i64) -> Result<()>;

    async fn reactivate(
        &self,
        id: &str,
        params: &ReactivateShareLinkParams,
    ) -> Result<ShareLinkRecord>;

    async fn update_options(&self, id: &str, is_public: bool) -> Result<ShareLinkRecord>;

    async fn find_public_by_membership(
        &self,
        membership_id: &str,
        now: i64,
    ) -> Result<Vec<ShareLinkRecord>>;
}

pub type ShareLinkRepositoryRef = Arc<dyn ShareLinkRepository>;
