use anyhow::{Result, bail};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::share_link_repo::{
        CreateShareLinkParams, ReactivateShareLinkParams, ShareLinkRepository,
    },
    roles::ShareLinkAccess,
    share_link::ShareLinkRecord,
};

const SHARE_LINK_COLUMNS: &str = "id, document_id, workspace_id, token, access_level, \
     password_hash, expires_at, revoked_at, created_by_membership_id, is_public, created_at";

pub struct SqliteShareLinkRepository {
    pool: Pool<Sqlite>,
}

impl SqliteShareLinkRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<ShareLinkRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SHARE_LINK_COLUMNS} FROM share_links WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_share_link))
    }
}

fn map_share_link(row: SqliteRow) -> ShareLinkRecord {
    let access_level: String = row.get("access_level");

    ShareLinkRecord {
        id: row.get("id"),
        document_id: row.get("document_id"),
        workspace_id: row.get("workspace_id"),
        token: row.get("token"),
        access_level: ShareLinkAccess::parse_lossy(&access_level),
        password_hash: row.get("password_hash"),
        expires_at: row.get("expires_at"),
        revoked_at: row.get("revoked_at"),
        created_by_membership_id: row.get("created_by_membership_id"),
        is_public: row.get("is_public"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ShareLinkRepository for SqliteShareLinkRepository {
    async fn insert(&self, params: &CreateShareLinkParams) -> Result<ShareLinkRecord> {
        sqlx::query(
            "INSERT INTO share_links \
                 (id, document_id, workspace_id, token, access_level, password_hash, \
                  expires_at, revoked_at, created_by_membership_id, is_public, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)",
        )
        .bind(&params.id)
        .bind(&params.document_id)
        .bind(&params.workspace_id)
        .bind(&params.token)
        .bind(params.access_level.as_str())
        .bind(&params.password_hash)
        .bind(params.expires_at)
        .bind(&params.created_by_membership_id)
        .bind(params.is_public)
        .bind(params.created_at)
        .execute(&self.pool)
        .await?;

        Ok(ShareLinkRecord {
            id: params.id.clone(),
            document_id: params.document_id.as_str().into(),
            workspace_id: params.workspace_id.as_str().into(),
            token: params.token.clone(),
            access_level: params.access_level,
            password_hash: params.password_hash.clone(),
            expires_at: params.expires_at,
            revoked_at: None,
            created_by_membership_id: params.created_by_membership_id.as_str().into(),
            is_public: params.is_public,
            created_at: params.created_at,
        })
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ShareLinkRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SHARE_LINK_COLUMNS} FROM share_links WHERE token = ?"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_share_link))
    }

    async fn find_active_by_token(
        &self,
        token: &str,
        now: i64,
    ) -> Result<Option<ShareLinkRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SHARE_LINK_COLUMNS} FROM share_links \
             WHERE token = ? AND revoked_at IS NULL \
               AND (expires_at IS NULL OR expires_at > ?)"
        ))
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_share_link))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ShareLinkRecord>> {
        self.fetch_by_id(id).await
    }

    async fn find_latest_by_document(
        &self,
        document_id: &str,
    ) -> Result<Option<ShareLinkRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SHARE_LINK_COLUMNS} FROM share_links \
             WHERE document_id = ? ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_share_link))
    }

    async fn list_by_document(&self, document_id: &str) -> Result<Vec<ShareLinkRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SHARE_LINK_COLUMNS} FROM share_links \
             WHERE document_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(map_share_link).collect())
    }

    async fn revoke(&self, id: &str, revoked_at: i64) -> Result<()> {
        sqlx::query("UPDATE share_links SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL")
            .bind(revoked_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn reactivate(
        &self,
        id: &str,
        params: &ReactivateShareLinkParams,
    ) -> Result<ShareLinkRecord> {
        sqlx::query(
            "UPDATE share_links SET revoked_at = NULL, access_level = ?, \
                 password_hash = ?, expires_at = ?, is_public = ? \
             WHERE id = ?",
        )
        .bind(params.access_level.as_str())
        .bind(&params.password_hash)
        .bind(params.expires_at)
        .bind(params.is_public)
        .bind(id)
        .execute(&self.pool)
        .await?;

        match self.fetch_by_id(id).await? {
            Some(link) => Ok(link),
            None => bail!("share link {id} disappeared during reactivate"),
        }
    }

    async fn update_options(&self, id: &str, is_public: bool) -> Result<ShareLinkRecord> {
        sqlx::query("UPDATE share_links SET is_public = ? WHERE id = ?")
            .bind(is_public)
            .bind(id)
            .execute(&self.pool)
            .await?;

        match self.fetch_by_id(id).await? {
            Some(link) => Ok(link),
            None => bail!("share link {id} disappeared during options update"),
        }
    }

    async fn find_public_by_membership(
        &self,
        membership_id: &str,
        now: i64,
    ) -> Result<Vec<ShareLinkRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SHARE_LINK_COLUMNS} FROM share_links \
             WHERE created_by_membership_id = ? AND is_public = TRUE \
               AND revoked_at IS NULL AND (expires_at IS NULL OR expires_at > ?) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(membership_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(map_share_link).collect())
    }
}
