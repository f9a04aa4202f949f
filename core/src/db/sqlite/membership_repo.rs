use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::membership_repo::MembershipRepository,
    membership::MembershipRecord,
    roles::{MembershipStatus, WorkspaceRole},
};

const MEMBERSHIP_COLUMNS: &str =
    "id, workspace_id, account_id, role, status, display_name, created_at";

pub struct SqliteMembershipRepository {
    pool: Pool<Sqlite>,
}

impl SqliteMembershipRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn map_membership(row: SqliteRow) -> MembershipRecord {
    let role: String = row.get("role");
    let status: String = row.get("status");

    MembershipRecord {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        account_id: row.get("account_id"),
        role: WorkspaceRole::parse_lossy(&role),
        status: MembershipStatus::parse_lossy(&status),
        display_name: row.get("display_name"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl MembershipRepository for SqliteMembershipRepository {
    async fn find_by_workspace_and_account(
        &self,
        workspace_id: &str,
        account_id: &str,
    ) -> Result<Option<MembershipRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
             WHERE workspace_id = ? AND account_id = ?"
        ))
        .bind(workspace_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_membership))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<MembershipRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_membership))
    }

    async fn list_by_workspace(&self, workspace_id: &str) -> Result<Vec<MembershipRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
             WHERE workspace_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(map_membership).collect())
    }

    async fn upsert(&self, record: &MembershipRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO memberships (id, workspace_id, account_id, role, status, display_name, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(workspace_id, account_id) \
             DO UPDATE SET role = excluded.role, status = excluded.status, \
                           display_name = excluded.display_name",
        )
        .bind(&record.id)
        .bind(&record.workspace_id)
        .bind(&record.account_id)
        .bind(record.role.as_str())
        .bind(record.status.as_str())
        .bind(&record.display_name)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
