use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    db::Database,
    document::{DocumentRecord, DocumentStore},
    membership::{MembershipDirectory, MembershipRecord},
    roles::{DocumentRole, MembershipStatus, WorkspaceRole},
};

pub(crate) async fn setup_database() -> (TempDir, Database) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let mut config = AppConfig::default();
    config.database_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .into_owned();
    config.database_max_connections = 2;

    let database = Database::connect(&config).await.expect("connect database");
    (temp_dir, database)
}

pub(crate) async fn seed_membership(
    database: &Database,
    workspace_id: &str,
    account_id: &str,
    role: WorkspaceRole,
    status: MembershipStatus,
) -> MembershipRecord {
    let record = MembershipRecord {
        id: Uuid::new_v4().to_string().into(),
        workspace_id: workspace_id.into(),
        account_id: account_id.into(),
        role,
        status,
        display_name: None,
        created_at: Utc::now().timestamp(),
    };

    MembershipDirectory::new(database)
        .upsert(&record)
        .await
        .expect("seed membership");
    record
}

pub(crate) struct DocumentFixture {
    pub public: bool,
    pub default_access: DocumentRole,
    pub editors_admin_only: bool,
}

impl Default for DocumentFixture {
    fn default() -> Self {
        Self {
            public: false,
            default_access: DocumentRole::None,
            editors_admin_only: false,
        }
    }
}

pub(crate) async fn seed_document(
    database: &Database,
    workspace_id: &str,
    owner_membership_id: &str,
    fixture: DocumentFixture,
) -> DocumentRecord {
    let now = Utc::now().timestamp();
    let record = DocumentRecord {
        id: Uuid::new_v4().to_string().into(),
        workspace_id: workspace_id.into(),
        owner_membership_id: owner_membership_id.into(),
        title: Some("Test Document".to_owned()),
        public: fixture.public,
        workspace_default_access: fixture.default_access,
        workspace_editor_admins_only: fixture.editors_admin_only,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };

    DocumentStore::new(database)
        .insert(&record)
        .await
        .expect("seed document");
    record
}
