use anyhow::{Result, bail};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::document_repo::DocumentRepository,
    document::{DocumentRecord, WorkspaceAccessUpdate},
    roles::DocumentRole,
};

const DOCUMENT_COLUMNS: &str = "id, workspace_id, owner_membership_id, title, public, \
     workspace_default_access, workspace_editor_admins_only, deleted_at, created_at, updated_at";

pub struct SqliteDocumentRepository {
    pool: Pool<Sqlite>,
}

impl SqliteDocumentRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn map_document(row: SqliteRow) -> DocumentRecord {
    let default_access: String = row.get("workspace_default_access");

    DocumentRecord {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        owner_membership_id: row.get("owner_membership_id"),
        title: row.get("title"),
        public: row.get("public"),
        // Unknown stored values fall back to no inherited access.
        workspace_default_access: DocumentRole::parse(&default_access)
            .unwrap_or(DocumentRole::None),
        workspace_editor_admins_only: row.get("workspace_editor_admins_only"),
        deleted_at: row.get("deleted_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_document))
    }

    async fn insert(&self, record: &DocumentRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (id, workspace_id, owner_membership_id, title, public, \
             workspace_default_access, workspace_editor_admins_only, deleted_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.workspace_id)
        .bind(&record.owner_membership_id)
        .bind(&record.title)
        .bind(record.public)
        .bind(record.workspace_default_access.as_str())
        .bind(record.workspace_editor_admins_only)
        .bind(record.deleted_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_workspace_access(
        &self,
        id: &str,
        update: &WorkspaceAccessUpdate,
        updated_at: i64,
    ) -> Result<DocumentRecord> {
        sqlx::query(
            "UPDATE documents SET \
                 workspace_default_access = COALESCE(?, workspace_default_access), \
                 workspace_editor_admins_only = COALESCE(?, workspace_editor_admins_only), \
                 updated_at = ? \
             WHERE id = ?",
        )
        .bind(update.default_access.map(DocumentRole::as_str))
        .bind(update.editors_admin_only)
        .bind(updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        match self.find_by_id(id).await? {
            Some(document) => Ok(document),
            None => bail!("document {id} disappeared during workspace access update"),
        }
    }

    async fn soft_delete(&self, id: &str, deleted_at: i64) -> Result<()> {
        sqlx::query("UPDATE documents SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(deleted_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
