use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{Database, doc_permission_repo::DocPermissionRepositoryRef},
    ids::{DocumentId, MembershipId},
    roles::DocumentRole,
};

/// The subject of an explicit grant. Closed so that adding a new principal
/// kind (service accounts, groups) forces every match site to be revisited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "principalType", content = "principalId", rename_all = "lowercase")]
pub enum PermissionPrincipal {
    Membership(MembershipId),
}

impl PermissionPrincipal {
    pub fn type_str(&self) -> &'static str {
        match self {
            PermissionPrincipal::Membership(_) => "membership",
        }
    }

    pub fn id_str(&self) -> &str {
        match self {
            PermissionPrincipal::Membership(id) => id.as_str(),
        }
    }
}

/// One explicit grant row. At most one row exists per (document, principal);
/// re-granting overwrites the role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPermissionRecord {
    pub id: String,
    pub document_id: DocumentId,
    #[serde(flatten)]
    pub principal: PermissionPrincipal,
    pub role: DocumentRole,
    pub created_at: i64,
}

#[derive(Clone)]
pub struct DocumentPermissionStore {
    repo: DocPermissionRepositoryRef,
}

impl DocumentPermissionStore {
    pub fn new(database: &Database) -> Self {
        Self {
            repo: database.repositories().doc_permission_repo(),
        }
    }

    pub fn with_repo(repo: DocPermissionRepositoryRef) -> Self {
        Self { repo }
    }

    pub async fn list_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<DocumentPermissionRecord>> {
        self.repo.list_by_document(document_id).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<DocumentPermissionRecord>> {
        self.repo.find_by_id(id).await
    }

    pub async fn find_for_membership(
        &self,
        document_id: &str,
        membership_id: &str,
    ) -> Result<Option<DocumentPermissionRecord>> {
        self.repo
            .find_by_document_and_principal(document_id, membership_id)
            .await
    }

    /// Upsert keyed on (document, principal). Concurrent grants for the same
    /// principal serialize at the storage layer; last write wins and no
    /// duplicate rows are created.
    pub async fn upsert_membership_permission(
        &self,
        document_id: &str,
        membership_id: &str,
        role: DocumentRole,
    ) -> Result<DocumentPermissionRecord> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().timestamp();
        self.repo
            .upsert_membership_permission(&id, document_id, membership_id, role, created_at)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.repo.delete(id).await
    }
}
