use anyhow::Result;

use crate::{
    db::{Database, membership_repo::MembershipRepositoryRef},
    ids::{AccountId, MembershipId, WorkspaceId},
    roles::{MembershipStatus, WorkspaceRole},
};

/// An account's role-bearing presence within one workspace.
#[derive(Debug, Clone)]
pub struct MembershipRecord {
    pub id: MembershipId,
    pub workspace_id: WorkspaceId,
    pub account_id: AccountId,
    pub role: WorkspaceRole,
    pub status: MembershipStatus,
    pub display_name: Option<String>,
    pub created_at: i64,
}

impl MembershipRecord {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Resolves membership records for the access engine and the management
/// services. Membership lifecycle (invites, removal) lives outside this
/// crate; `upsert` exists as the seam those collaborators write through.
#[derive(Clone)]
pub struct MembershipDirectory {
    repo: MembershipRepositoryRef,
}

impl MembershipDirectory {
    pub fn new(database: &Database) -> Self {
        Self {
            repo: database.repositories().membership_repo(),
        }
    }

    pub fn with_repo(repo: MembershipRepositoryRef) -> Self {
        Self { repo }
    }

    pub async fn find_by_workspace_and_account(
        &self,
        workspace_id: &str,
        account_id: &str,
    ) -> Result<Option<MembershipRecord>> {
        self.repo
            .find_by_workspace_and_account(workspace_id, account_id)
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<MembershipRecord>> {
        self.repo.find_by_id(id).await
    }

    pub async fn list_by_workspace(&self, workspace_id: &str) -> Result<Vec<MembershipRecord>> {
        self.repo.list_by_workspace(workspace_id).await
    }

    pub async fn upsert(&self, record: &MembershipRecord) -> Result<()> {
        self.repo.upsert(record).await
    }
}
