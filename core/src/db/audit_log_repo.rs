use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::ids::{MembershipId, WorkspaceId};

#[derive(Debug, Clone)]
pub struct AuditLogRecord {
    pub id: String,
    pub workspace_id: WorkspaceId,
    pub actor_type: String,
    pub actor_membership_id: Option<MembershipId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub metadata: Option<JsonValue>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct AuditLogQuery {
    pub workspace_id: String,
    pub entity_type: Option<String>,
    pub action: Option<String>,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub page: u32,
    pub page_size: u32,
}

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Append-only; audit rows are never updated or deleted.
    async fn insert(&self, record: &AuditLogRecord) -> Result<()>;

    /// Newest first, honoring the query filters. `limit`/`offset` are
    /// computed by the recorder from the page parameters.
    async fn list(
        &self,
        query: &AuditLogQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogRecord>>;
}

pub type AuditLogRepositoryRef = Arc<dyn AuditLogRepository>;
