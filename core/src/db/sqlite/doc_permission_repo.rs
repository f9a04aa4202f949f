use anyhow::{Result, bail};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::doc_permission_repo::DocPermissionRepository,
    doc_permission::{DocumentPermissionRecord, PermissionPrincipal},
    ids::MembershipId,
    roles::DocumentRole,
};

const PERMISSION_COLUMNS: &str =
    "id, document_id, principal_type, principal_id, role, created_at";

pub struct SqliteDocPermissionRepository {
    pool: Pool<Sqlite>,
}

impl SqliteDocPermissionRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn map_permission(row: SqliteRow) -> Result<DocumentPermissionRecord> {
    let principal_type: String = row.get("principal_type");
    let principal = match principal_type.as_str() {
        "membership" => {
            PermissionPrincipal::Membership(MembershipId::from(row.get::<String, _>("principal_id")))
        }
        other => bail!("unknown permission principal type: {other}"),
    };

    let role: String = row.get("role");

    Ok(DocumentPermissionRecord {
        id: row.get("id"),
        document_id: row.get("document_id"),
        principal,
        // A grant with an unrecognised role confers nothing.
        role: DocumentRole::parse(&role).unwrap_or(DocumentRole::None),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl DocPermissionRepository for SqliteDocPermissionRepository {
    async fn list_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<DocumentPermissionRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM document_permissions \
             WHERE document_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_permission).collect()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<DocumentPermissionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM document_permissions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_permission).transpose()
    }

    async fn find_by_document_and_principal(
        &self,
        document_id: &str,
        principal_id: &str,
    ) -> Result<Option<DocumentPermissionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM document_permissions \
             WHERE document_id = ? AND principal_id = ?"
        ))
        .bind(document_id)
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_permission).transpose()
    }

    async fn upsert_membership_permission(
        &self,
        id: &str,
        document_id: &str,
        principal_id: &str,
        role: DocumentRole,
        created_at: i64,
    ) -> Result<DocumentPermissionRecord> {
        sqlx::query(
            "INSERT INTO document_permissions \
                 (id, document_id, principal_type, principal_id, role, created_at) \
             VALUES (?, ?, 'membership', ?, ?, ?) \
             ON CONFLICT(document_id, principal_id) DO UPDATE SET role = excluded.role",
        )
        .bind(id)
        .bind(document_id)
        .bind(principal_id)
        .bind(role.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        match self
            .find_by_document_and_principal(document_id, principal_id)
            .await?
        {
            Some(permission) => Ok(permission),
            None => bail!("permission row missing immediately after upsert"),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM document_permissions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
