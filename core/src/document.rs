use anyhow::Result;
use chrono::Utc;

use crate::{
    db::{Database, document_repo::DocumentRepositoryRef},
    ids::{DocumentId, MembershipId, WorkspaceId},
    roles::DocumentRole,
};

/// Authorization-relevant view of a document row. Content, revisions and
/// storage keys are owned by collaborators outside this crate.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub workspace_id: WorkspaceId,
    pub owner_membership_id: MembershipId,
    pub title: Option<String>,
    pub public: bool,
    pub workspace_default_access: DocumentRole,
    pub workspace_editor_admins_only: bool,
    pub deleted_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DocumentRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceAccessUpdate {
    pub default_access: Option<DocumentRole>,
    pub editors_admin_only: Option<bool>,
}

impl WorkspaceAccessUpdate {
    pub fn is_empty(&self) -> bool {
        self.default_access.is_none() && self.editors_admin_only.is_none()
    }
}

#[derive(Clone)]
pub struct DocumentStore {
    repo: DocumentRepositoryRef,
}

impl DocumentStore {
    pub fn new(database: &Database) -> Self {
        Self {
            repo: database.repositories().document_repo(),
        }
    }

    pub fn with_repo(repo: DocumentRepositoryRef) -> Self {
        Self { repo }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<DocumentRecord>> {
        self.repo.find_by_id(id).await
    }

    /// Soft-deleted documents are not valid authorization targets; this is
    /// the lookup every permission path goes through.
    pub async fn find_active_by_id(&self, id: &str) -> Result<Option<DocumentRecord>> {
        Ok(self
            .repo
            .find_by_id(id)
            .await?
            .filter(|document| !document.is_deleted()))
    }

    pub async fn update_workspace_access(
        &self,
        id: &str,
        update: &WorkspaceAccessUpdate,
    ) -> Result<DocumentRecord> {
        let updated_at = Utc::now().timestamp();
        self.repo.update_workspace_access(id, update, updated_at).await
    }

    pub async fn insert(&self, record: &DocumentRecord) -> Result<()> {
        self.repo.insert(record).await
    }

    pub async fn soft_delete(&self, id: &str) -> Result<()> {
        let deleted_at = Utc::now().timestamp();
        self.repo.soft_delete(id, deleted_at).await
    }
}
