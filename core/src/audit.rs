use anyhow::Result;
use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::warn;
use uuid::Uuid;

use crate::{
    db::{
        Database,
        audit_log_repo::{AuditLogQuery, AuditLogRecord, AuditLogRepositoryRef},
    },
    ids::{MembershipId, WorkspaceId},
};

/// Who performed an audited action. Closed so new actor kinds (external
/// collaborators, system jobs) extend every match site explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditActor {
    Membership(MembershipId),
}

impl AuditActor {
    pub fn type_str(&self) -> &'static str {
        match self {
            AuditActor::Membership(_) => "membership",
        }
    }

    pub fn membership_id(&self) -> Option<&MembershipId> {
        match self {
            AuditActor::Membership(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub workspace_id: WorkspaceId,
    pub actor: AuditActor,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Clone)]
pub struct AuditLogPage {
    pub logs: Vec<AuditLogRecord>,
    pub page: u32,
    pub page_size: u32,
    pub has_next_page: bool,
}

/// Append-only trail of permission-mutating actions. Records are written
/// after the state change they describe and are not transactional with it;
/// a lost record degrades observability, never correctness.
#[derive(Clone)]
pub struct AuditRecorder {
    repo: AuditLogRepositoryRef,
}

impl AuditRecorder {
    const MAX_PAGE_SIZE: u32 = 200;
    const DEFAULT_PAGE_SIZE: u32 = 50;

    pub fn new(database: &Database) -> Self {
        Self {
            repo: database.repositories().audit_log_repo(),
        }
    }

    pub fn with_repo(repo: AuditLogRepositoryRef) -> Self {
        Self { repo }
    }

    pub async fn record(&self, event: AuditEvent) -> Result<AuditLogRecord> {
        let record = AuditLogRecord {
            id: Uuid::new_v4().to_string(),
            workspace_id: event.workspace_id,
            actor_type: event.actor.type_str().to_owned(),
            actor_membership_id: event.actor.membership_id().cloned(),
            action: event.action,
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            metadata: event.metadata,
            created_at: Utc::now().timestamp(),
        };

        self.repo.insert(&record).await?;
        Ok(record)
    }

    /// Fire-and-forget variant used by the mutating services. The triggering
    /// operation has already committed; a failed audit write must not fail
    /// or roll it back.
    pub async fn record_best_effort(&self, event: AuditEvent) {
        let action = event.action.clone();
        if let Err(err) = self.record(event).await {
            warn!(?err, action = %action, "failed to append audit record");
        }
    }

    pub async fn list(&self, query: &AuditLogQuery) -> Result<AuditLogPage> {
        let page = query.page.max(1);
        let page_size = query.page_size.clamp(1, Self::MAX_PAGE_SIZE);

        let limit = i64::from(page_size) + 1;
        let offset = i64::from(page - 1) * i64::from(page_size);
        let mut logs = self.repo.list(query, limit, offset).await?;

        let has_next_page = logs.len() > page_size as usize;
        if has_next_page {
            logs.truncate(page_size as usize);
        }

        Ok(AuditLogPage {
            logs,
            page,
            page_size,
            has_next_page,
        })
    }
}

impl Default for AuditLogQuery {
    fn default() -> Self {
        Self {
            workspace_id: String::new(),
            entity_type: None,
            action: None,
            from: None,
            to: None,
            page: 1,
            page_size: AuditRecorder::DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::test_support::setup_database;

    fn event(action: &str) -> AuditEvent {
        AuditEvent {
            workspace_id: "ws".into(),
            actor: AuditActor::Membership("member-1".into()),
            action: action.to_owned(),
            entity_type: "document".to_owned(),
            entity_id: Some("doc-1".to_owned()),
            metadata: Some(json!({ "role": "viewer" })),
        }
    }

    #[tokio::test]
    async fn records_round_trip_with_metadata() {
        let (_dir, database) = setup_database().await;
        let recorder = AuditRecorder::new(&database);

        recorder
            .record(event("document_permission.granted"))
            .await
            .unwrap();

        let page = recorder
            .list(&AuditLogQuery {
                workspace_id: "ws".to_owned(),
                ..AuditLogQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(page.logs.len(), 1);
        let log = &page.logs[0];
        assert_eq!(log.actor_type, "membership");
        assert_eq!(
            log.actor_membership_id.as_ref().map(|id| id.as_str()),
            Some("member-1")
        );
        assert_eq!(log.metadata.as_ref().unwrap()["role"], "viewer");
    }

    #[tokio::test]
    async fn listing_paginates_with_a_lookahead_row() {
        let (_dir, database) = setup_database().await;
        let recorder = AuditRecorder::new(&database);

        for action in [
            "document_permission.granted",
            "document_permission.revoked",
            "share_link.created",
        ] {
            recorder.record(event(action)).await.unwrap();
        }

        let first = recorder
            .list(&AuditLogQuery {
                workspace_id: "ws".to_owned(),
                page_size: 2,
                ..AuditLogQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(first.logs.len(), 2);
        assert!(first.has_next_page);

        let second = recorder
            .list(&AuditLogQuery {
                workspace_id: "ws".to_owned(),
                page: 2,
                page_size: 2,
                ..AuditLogQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(second.logs.len(), 1);
        assert!(!second.has_next_page);

        let filtered = recorder
            .list(&AuditLogQuery {
                workspace_id: "ws".to_owned(),
                action: Some("share_link.created".to_owned()),
                ..AuditLogQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.logs.len(), 1);

        let elsewhere = recorder
            .list(&AuditLogQuery {
                workspace_id: "other".to_owned(),
                ..AuditLogQuery::default()
            })
            .await
            .unwrap();
        assert!(elsewhere.logs.is_empty());
    }
}
