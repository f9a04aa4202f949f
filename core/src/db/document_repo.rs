use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::document::{DocumentRecord, WorkspaceAccessUpdate};

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Returns the row as stored, including soft-deleted documents. Callers
    /// that authorize against the document must filter `deleted_at`.
    async fn find_by_id(&self, id: &str) -> Result<Option<DocumentRecord>>;

    async fn insert(&self, record: &DocumentRecord) -> Result<()>;

    /// Applies only the fields present in the update and returns the
    /// resulting row.
    async fn update_workspace_access(
        &self,
        id: &str,
        update: &WorkspaceAccessUpdate,
        updated_at: i64,
    ) -> Result<DocumentRecord>;

    async fn soft_delete(&self, id: &str, deleted_at: i64) -> Result<()>;
}

pub type DocumentRepositoryRef = Arc<dyn DocumentRepository>;
