use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::membership::MembershipRecord;

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn find_by_workspace_and_account(
        &self,
        workspace_id: &str,
        account_id: &str,
    ) -> Result<Option<MembershipRecord>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<MembershipRecord>>;

    async fn list_by_workspace(&self, workspace_id: &str) -> Result<Vec<MembershipRecord>>;

    async fn upsert(&self, record: &MembershipRecord) -> Result<()>;
}

pub type MembershipRepositoryRef = Arc<dyn MembershipRepository>;
