use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::{doc_permission::DocumentPermissionRecord, roles::DocumentRole};

#[async_trait]
pub trait DocPermissionRepository: Send + Sync {
    async fn list_by_document(&self, document_id: &str)
    -> Result<Vec<DocumentPermissionRecord>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<DocumentPermissionRecord>>;

    async fn find_by_document_and_principal(
        &self,
        document_id: &str,
        principal_id: &str,
    ) -> Result<Option<DocumentPermissionRecord>>;

    /// Atomic upsert keyed on (document, principal). When the row already
    /// exists its id is preserved and only the role changes; the returned
    /// record is whatever the store holds after the write.
    async fn upsert_membership_permission(
        &self,
        id: &str,
        document_id: &str,
        principal_id: &str,
        role: DocumentRole,
        created_at: i64,
    ) -> Result<DocumentPermissionRecord>;

    async fn delete(&self, id: &str) -> Result<()>;
}

pub type DocPermissionRepositoryRef = Arc<dyn DocPermissionRepository>;
