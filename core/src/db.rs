use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};

use self::{
    audit_log_repo::AuditLogRepositoryRef,
    doc_permission_repo::DocPermissionRepositoryRef,
    document_repo::DocumentRepositoryRef,
    membership_repo::MembershipRepositoryRef,
    share_link_repo::ShareLinkRepositoryRef,
    sqlite::{
        audit_log_repo::SqliteAuditLogRepository, connection as sqlite_connection,
        doc_permission_repo::SqliteDocPermissionRepository, document_repo::SqliteDocumentRepository,
        membership_repo::SqliteMembershipRepository, share_link_repo::SqliteShareLinkRepository,
    },
};
use crate::config::AppConfig;

pub mod audit_log_repo;
pub mod doc_permission_repo;
pub mod document_repo;
pub mod errors;
pub mod membership_repo;
pub mod share_link_repo;
pub mod sqlite;

#[derive(Clone)]
pub struct RepositoryRegistry {
    document_repo: DocumentRepositoryRef,
    membership_repo: MembershipRepositoryRef,
    doc_permission_repo: DocPermissionRepositoryRef,
    share_link_repo: ShareLinkRepositoryRef,
    audit_log_repo: AuditLogRepositoryRef,
}

impl RepositoryRegistry {
    pub fn new(
        document_repo: DocumentRepositoryRef,
        membership_repo: MembershipRepositoryRef,
        doc_permission_repo: DocPermissionRepositoryRef,
        share_link_repo: ShareLinkRepositoryRef,
        audit_log_repo: AuditLogRepositoryRef,
    ) -> Self {
        Self {
            document_repo,
            membership_repo,
            doc_permission_repo,
            share_link_repo,
            audit_log_repo,
        }
    }

    pub fn document_repo(&self) -> DocumentRepositoryRef {
        self.document_repo.clone()
    }

    pub fn membership_repo(&self) -> MembershipRepositoryRef {
        self.membership_repo.clone()
    }

    pub fn doc_permission_repo(&self) -> DocPermissionRepositoryRef {
        self.doc_permission_repo.clone()
    }

    pub fn share_link_repo(&self) -> ShareLinkRepositoryRef {
        self.share_link_repo.clone()
    }

    pub fn audit_log_repo(&self) -> AuditLogRepositoryRef {
        self.audit_log_repo.clone()
    }
}

#[derive(Clone)]
pub struct Database {
    pool: sqlite_connection::SqlitePool,
    path: PathBuf,
    repositories: Arc<RepositoryRegistry>,
}

impl Database {
    const SQLITE_FILE_NAME: &'static str = "vellum.db";

    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let (data_dir, db_file) = Self::resolve_database_paths(&config.database_path)?;
        fs::create_dir_all(&data_dir).with_context(|| {
            format!(
                "failed to create database directory: {}",
                data_dir.display()
            )
        })?;

        let pool =
            sqlite_connection::create_pool(&db_file, config.database_max_connections).await?;
        sqlite_connection::run_migrations(&pool).await?;

        let document_repo =
            Arc::new(SqliteDocumentRepository::new(pool.clone())) as DocumentRepositoryRef;
        let membership_repo =
            Arc::new(SqliteMembershipRepository::new(pool.clone())) as MembershipRepositoryRef;
        let doc_permission_repo = Arc::new(SqliteDocPermissionRepository::new(pool.clone()))
            as DocPermissionRepositoryRef;
        let share_link_repo =
            Arc::new(SqliteShareLinkRepository::new(pool.clone())) as ShareLinkRepositoryRef;
        let audit_log_repo =
            Arc::new(SqliteAuditLogRepository::new(pool.clone())) as AuditLogRepositoryRef;

        let repositories = Arc::new(RepositoryRegistry::new(
            document_repo,
            membership_repo,
            doc_permission_repo,
            share_link_repo,
            audit_log_repo,
        ));

        Ok(Self {
            pool,
            path: data_dir,
            repositories,
        })
    }

    pub fn pool(&self) -> &sqlite_connection::SqlitePool {
        &self.pool
    }

    pub fn database_path(&self) -> &PathBuf {
        &self.path
    }

    pub fn repositories(&self) -> Arc<RepositoryRegistry> {
        self.repositories.clone()
    }

    fn resolve_database_paths(path: &str) -> Result<(PathBuf, PathBuf)> {
        let resolved = Self::resolve_db_path(path)?;
        if resolved.extension().is_some() {
            let dir = if let Some(parent) = resolved.parent() {
                parent.to_path_buf()
            } else {
                std::env::current_dir().context("failed to obtain current directory")?
            };
            Ok((dir, resolved))
        } else {
            Ok((resolved.clone(), resolved.join(Self::SQLITE_FILE_NAME)))
        }
    }

    fn resolve_db_path(path: &str) -> Result<PathBuf> {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            Ok(path)
        } else {
            let cwd = std::env::current_dir().context("failed to obtain current directory")?;
            Ok(cwd.join(path))
        }
    }
}
