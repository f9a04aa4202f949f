use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::db::audit_log_repo::{AuditLogQuery, AuditLogRecord, AuditLogRepository};

const AUDIT_LOG_COLUMNS: &str = "id, workspace_id, actor_type, actor_membership_id, action, \
     entity_type, entity_id, metadata, created_at";

pub struct SqliteAuditLogRepository {
    pool: Pool<Sqlite>,
}

impl SqliteAuditLogRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn map_audit_log(row: SqliteRow) -> Result<AuditLogRecord> {
    let metadata: Option<String> = row.get("metadata");
    let metadata = metadata
        .map(|raw| serde_json::from_str(&raw).context("malformed audit metadata"))
        .transpose()?;

    Ok(AuditLogRecord {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        actor_type: row.get("actor_type"),
        actor_membership_id: row.get("actor_membership_id"),
        action: row.get("action"),
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        metadata,
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl AuditLogRepository for SqliteAuditLogRepository {
    async fn insert(&self, record: &AuditLogRecord) -> Result<()> {
        let metadata = record
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("failed to encode audit metadata")?;

        sqlx::query(
            "INSERT INTO audit_logs \
                 (id, workspace_id, actor_type, actor_membership_id, action, \
                  entity_type, entity_id, metadata, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.workspace_id)
        .bind(&record.actor_type)
        .bind(&record.actor_membership_id)
        .bind(&record.action)
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(metadata)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(
        &self,
        query: &AuditLogQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {AUDIT_LOG_COLUMNS} FROM audit_logs \
             WHERE workspace_id = ? \
               AND (? IS NULL OR entity_type = ?) \
               AND (? IS NULL OR action = ?) \
               AND (? IS NULL OR created_at >= ?) \
               AND (? IS NULL OR created_at <= ?) \
             ORDER BY created_at DESC, id DESC \
             LIMIT ? OFFSET ?"
        ))
        .bind(&query.workspace_id)
        .bind(&query.entity_type)
        .bind(&query.entity_type)
        .bind(&query.action)
        .bind(&query.action)
        .bind(query.from)
        .bind(query.from)
        .bind(query.to)
        .bind(query.to)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_audit_log).collect()
    }
}
