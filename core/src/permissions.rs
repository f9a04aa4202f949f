use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::{
    access::{AccessDecisionEngine, Actor},
    audit::{AuditActor, AuditEvent, AuditRecorder},
    db::Database,
    doc_permission::{DocumentPermissionRecord, DocumentPermissionStore},
    document::{DocumentRecord, DocumentStore, WorkspaceAccessUpdate},
    error::CoreError,
    ids::DocumentId,
    membership::MembershipDirectory,
    roles::DocumentRole,
};

#[derive(Debug, Clone)]
pub struct GrantPermissionInput {
    pub principal_id: String,
    pub role: DocumentRole,
}

/// What a caller may learn about a document's sharing state. The workspace
/// policy is included even for non-managers; it is not sensitive.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSummary {
    pub document_id: DocumentId,
    pub workspace_default_access: DocumentRole,
    pub workspace_editors_admin_only: bool,
    pub permissions: Vec<DocumentPermissionRecord>,
}

/// Manager-gated mutation of explicit grants and the workspace-default
/// policy. Every mutation lands an audit record after the write.
pub struct PermissionService {
    documents: DocumentStore,
    permissions: DocumentPermissionStore,
    memberships: MembershipDirectory,
    engine: Arc<AccessDecisionEngine>,
    audit: AuditRecorder,
}

impl PermissionService {
    pub fn new(
        documents: DocumentStore,
        permissions: DocumentPermissionStore,
        memberships: MembershipDirectory,
        engine: Arc<AccessDecisionEngine>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            documents,
            permissions,
            memberships,
            engine,
            audit,
        }
    }

    pub fn from_database(database: &Database) -> Self {
        Self::new(
            DocumentStore::new(database),
            DocumentPermissionStore::new(database),
            MembershipDirectory::new(database),
            Arc::new(AccessDecisionEngine::from_database(database)),
            AuditRecorder::new(database),
        )
    }

    /// Grant (or overwrite) an explicit role for a membership. Idempotent on
    /// repeated identical calls; there is never more than one row per
    /// (document, principal).
    pub async fn grant(
        &self,
        account_id: &str,
        workspace_id: &str,
        document_id: &str,
        input: GrantPermissionInput,
    ) -> Result<DocumentPermissionRecord, CoreError> {
        let document = self.get_document(document_id, workspace_id).await?;
        let actor = self.engine.require_manager(account_id, &document).await?;

        if input.role == DocumentRole::None {
            return Err(CoreError::validation(
                "role must be viewer, commenter or editor",
            ));
        }

        let target = match self.memberships.find_by_id(&input.principal_id).await? {
            // Cross-workspace and inactive principals both read as absent,
            // so the caller cannot probe for memberships elsewhere.
            Some(membership)
                if membership.workspace_id.as_str() == workspace_id
                    && membership.is_active() =>
            {
                membership
            }
            _ => return Err(CoreError::NotFound),
        };

        let permission = self
            .permissions
            .upsert_membership_permission(document_id, target.id.as_str(), input.role)
            .await?;

        self.audit
            .record_best_effort(AuditEvent {
                workspace_id: document.workspace_id.clone(),
                actor: AuditActor::Membership(actor.id.clone()),
                action: "document_permission.granted".to_owned(),
                entity_type: "document".to_owned(),
                entity_id: Some(document.id.to_string()),
                metadata: Some(json!({
                    "permissionId": permission.id,
                    "targetMembershipId": target.id,
                    "role": permission.role,
                })),
            })
            .await;

        Ok(permission)
    }

    pub async fn revoke(
        &self,
        account_id: &str,
        workspace_id: &str,
        document_id: &str,
        permission_id: &str,
    ) -> Result<(), CoreError> {
        let document = self.get_document(document_id, workspace_id).await?;
        let actor = self.engine.require_manager(account_id, &document).await?;

        let permission = match self.permissions.find_by_id(permission_id).await? {
            Some(permission) if permission.document_id.as_str() == document_id => permission,
            _ => return Err(CoreError::NotFound),
        };

        self.permissions.delete(&permission.id).await?;

        self.audit
            .record_best_effort(AuditEvent {
                workspace_id: document.workspace_id.clone(),
                actor: AuditActor::Membership(actor.id.clone()),
                action: "document_permission.revoked".to_owned(),
                entity_type: "document".to_owned(),
                entity_id: Some(document.id.to_string()),
                metadata: Some(json!({ "permissionId": permission.id })),
            })
            .await;

        Ok(())
    }

    /// Update the inherited-access policy. The audit record carries the
    /// resulting values, not the delta.
    pub async fn update_workspace_access(
        &self,
        account_id: &str,
        workspace_id: &str,
        document_id: &str,
        update: WorkspaceAccessUpdate,
    ) -> Result<DocumentRecord, CoreError> {
        if update.is_empty() {
            return Err(CoreError::validation("at least one field required"));
        }

        let document = self.get_document(document_id, workspace_id).await?;
        let actor = self.engine.require_manager(account_id, &document).await?;

        let updated = self
            .documents
            .update_workspace_access(document_id, &update)
            .await?;

        self.audit
            .record_best_effort(AuditEvent {
                workspace_id: updated.workspace_id.clone(),
                actor: AuditActor::Membership(actor.id.clone()),
                action: "document_permission.workspace_access_updated".to_owned(),
                entity_type: "document".to_owned(),
                entity_id: Some(updated.id.to_string()),
                metadata: Some(json!({
                    "defaultAccess": updated.workspace_default_access,
                    "editorAdminsOnly": updated.workspace_editor_admins_only,
                })),
            })
            .await;

        Ok(updated)
    }

    /// Full grant list; the management surface, so manager-only.
    pub async fn list_permissions(
        &self,
        account_id: &str,
        workspace_id: &str,
        document_id: &str,
    ) -> Result<PermissionSummary, CoreError> {
        let document = self.get_document(document_id, workspace_id).await?;
        self.engine.require_manager(account_id, &document).await?;

        let permissions = self.permissions.list_by_document(document_id).await?;
        Ok(build_summary(&document, permissions))
    }

    /// The "what can I do here" surface: same shape as the grant list, but
    /// open to any actor who can view the document.
    pub async fn summary(
        &self,
        actor: Actor<'_>,
        workspace_id: &str,
        document_id: &str,
    ) -> Result<PermissionSummary, CoreError> {
        let document = self.get_document(document_id, workspace_id).await?;

        self.engine
            .evaluate(actor, document_id, DocumentRole::Viewer)
            .await?
            .require()?;

        let permissions = self.permissions.list_by_document(document_id).await?;
        Ok(build_summary(&document, permissions))
    }

    async fn get_document(
        &self,
        document_id: &str,
        workspace_id: &str,
    ) -> Result<DocumentRecord, CoreError> {
        match self.documents.find_active_by_id(document_id).await? {
            Some(document) if document.workspace_id.as_str() == workspace_id => Ok(document),
            _ => Err(CoreError::NotFound),
        }
    }
}

fn build_summary(
    document: &DocumentRecord,
    permissions: Vec<DocumentPermissionRecord>,
) -> PermissionSummary {
    PermissionSummary {
        document_id: document.id.clone(),
        workspace_default_access: document.workspace_default_access,
        workspace_editors_admin_only: document.workspace_editor_admins_only,
        permissions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audit::AuditRecorder,
        db::audit_log_repo::AuditLogQuery,
        roles::{MembershipStatus, WorkspaceRole},
        test_support::{DocumentFixture, seed_document, seed_membership, setup_database},
    };

    #[tokio::test]
    async fn repeated_grants_upsert_a_single_row() {
        let (_dir, database) = setup_database().await;
        let owner = seed_membership(
            &database,
            "ws",
            "owner@acct",
            WorkspaceRole::Owner,
            MembershipStatus::Active,
        )
        .await;
        let member = seed_membership(
            &database,
            "ws",
            "member@acct",
            WorkspaceRole::Member,
            MembershipStatus::Active,
        )
        .await;
        let document = seed_document(
            &database,
            "ws",
            owner.id.as_str(),
            DocumentFixture::default(),
        )
        .await;

        let service = PermissionService::from_database(&database);
        let input = GrantPermissionInput {
            principal_id: member.id.to_string(),
            role: DocumentRole::Editor,
        };

        let first = service
            .grant("owner@acct", "ws", document.id.as_str(), input.clone())
            .await
            .unwrap();
        let second = service
            .grant("owner@acct", "ws", document.id.as_str(), input)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);

        let listed = service
            .list_permissions("owner@acct", "ws", document.id.as_str())
            .await
            .unwrap();
        assert_eq!(listed.permissions.len(), 1);
        assert_eq!(listed.permissions[0].role, DocumentRole::Editor);

        // Re-granting with another role overwrites in place.
        let downgraded = service
            .grant(
                "owner@acct",
                "ws",
                document.id.as_str(),
                GrantPermissionInput {
                    principal_id: member.id.to_string(),
                    role: DocumentRole::Viewer,
                },
            )
            .await
            .unwrap();
        assert_eq!(downgraded.id, first.id);
        assert_eq!(downgraded.role, DocumentRole::Viewer);
    }

    #[tokio::test]
    async fn only_managers_may_mutate_or_list() {
        let (_dir, database) = setup_database().await;
        let owner = seed_membership(
            &database,
            "ws",
            "owner@acct",
            WorkspaceRole::Owner,
            MembershipStatus::Active,
        )
        .await;
        let member = seed_membership(
            &database,
            "ws",
            "member@acct",
            WorkspaceRole::Member,
            MembershipStatus::Active,
        )
        .await;
        let document = seed_document(
            &database,
            "ws",
            owner.id.as_str(),
            DocumentFixture {
                default_access: DocumentRole::Viewer,
                ..DocumentFixture::default()
            },
        )
        .await;

        let service = PermissionService::from_database(&database);
        let attempt = service
            .grant(
                "member@acct",
                "ws",
                document.id.as_str(),
                GrantPermissionInput {
                    principal_id: member.id.to_string(),
                    role: DocumentRole::Editor,
                },
            )
            .await;
        assert!(matches!(attempt, Err(CoreError::AccessDenied)));

        let listing = service
            .list_permissions("member@acct", "ws", document.id.as_str())
            .await;
        assert!(matches!(listing, Err(CoreError::AccessDenied)));

        // The viewer-facing summary still works and carries the policy.
        let summary = service
            .summary(
                Actor::Authenticated {
                    account_id: "member@acct",
                },
                "ws",
                document.id.as_str(),
            )
            .await
            .unwrap();
        assert_eq!(summary.workspace_default_access, DocumentRole::Viewer);
        assert!(!summary.workspace_editors_admin_only);
    }

    #[tokio::test]
    async fn foreign_and_inactive_principals_read_as_not_found() {
        let (_dir, database) = setup_database().await;
        let owner = seed_membership(
            &database,
            "ws",
            "owner@acct",
            WorkspaceRole::Owner,
            MembershipStatus::Active,
        )
        .await;
        let outsider = seed_membership(
            &database,
            "other-ws",
            "outsider@acct",
            WorkspaceRole::Member,
            MembershipStatus::Active,
        )
        .await;
        let suspended = seed_membership(
            &database,
            "ws",
            "frozen@acct",
            WorkspaceRole::Member,
            MembershipStatus::Suspended,
        )
        .await;
        let document = seed_document(
            &database,
            "ws",
            owner.id.as_str(),
            DocumentFixture::default(),
        )
        .await;

        let service = PermissionService::from_database(&database);
        for principal in [outsider.id.to_string(), suspended.id.to_string()] {
            let attempt = service
                .grant(
                    "owner@acct",
                    "ws",
                    document.id.as_str(),
                    GrantPermissionInput {
                        principal_id: principal,
                        role: DocumentRole::Viewer,
                    },
                )
                .await;
            assert!(matches!(attempt, Err(CoreError::NotFound)));
        }
    }

    #[tokio::test]
    async fn workspace_access_update_needs_at_least_one_field() {
        let (_dir, database) = setup_database().await;
        let owner = seed_membership(
            &database,
            "ws",
            "owner@acct",
            WorkspaceRole::Owner,
            MembershipStatus::Active,
        )
        .await;
        let document = seed_document(
            &database,
            "ws",
            owner.id.as_str(),
            DocumentFixture::default(),
        )
        .await;

        let service = PermissionService::from_database(&database);
        let empty = service
            .update_workspace_access(
                "owner@acct",
                "ws",
                document.id.as_str(),
                WorkspaceAccessUpdate::default(),
            )
            .await;
        assert!(matches!(empty, Err(CoreError::ValidationFailed(_))));

        let updated = service
            .update_workspace_access(
                "owner@acct",
                "ws",
                document.id.as_str(),
                WorkspaceAccessUpdate {
                    default_access: Some(DocumentRole::Commenter),
                    editors_admin_only: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.workspace_default_access, DocumentRole::Commenter);
        // The untouched field keeps its value.
        assert!(!updated.workspace_editor_admins_only);
    }

    #[tokio::test]
    async fn revoking_a_foreign_permission_reads_as_not_found() {
        let (_dir, database) = setup_database().await;
        let owner = seed_membership(
            &database,
            "ws",
            "owner@acct",
            WorkspaceRole::Owner,
            MembershipStatus::Active,
        )
        .await;
        let member = seed_membership(
            &database,
            "ws",
            "member@acct",
            WorkspaceRole::Member,
            MembershipStatus::Active,
        )
        .await;
        let document = seed_document(
            &database,
            "ws",
            owner.id.as_str(),
            DocumentFixture::default(),
        )
        .await;
        let other_document = seed_document(
            &database,
            "ws",
            owner.id.as_str(),
            DocumentFixture::default(),
        )
        .await;

        let service = PermissionService::from_database(&database);
        let permission = service
            .grant(
                "owner@acct",
                "ws",
                document.id.as_str(),
                GrantPermissionInput {
                    principal_id: member.id.to_string(),
                    role: DocumentRole::Viewer,
                },
            )
            .await
            .unwrap();

        let missing = service
            .revoke("owner@acct", "ws", document.id.as_str(), "no-such-id")
            .await;
        assert!(matches!(missing, Err(CoreError::NotFound)));

        let cross_document = service
            .revoke(
                "owner@acct",
                "ws",
                other_document.id.as_str(),
                &permission.id,
            )
            .await;
        assert!(matches!(cross_document, Err(CoreError::NotFound)));

        service
            .revoke("owner@acct", "ws", document.id.as_str(), &permission.id)
            .await
            .unwrap();
        let listed = service
            .list_permissions("owner@acct", "ws", document.id.as_str())
            .await
            .unwrap();
        assert!(listed.permissions.is_empty());
    }

    #[tokio::test]
    async fn mutations_leave_an_audit_trail() {
        let (_dir, database) = setup_database().await;
        let owner = seed_membership(
            &database,
            "ws",
            "owner@acct",
            WorkspaceRole::Owner,
            MembershipStatus::Active,
        )
        .await;
        let member = seed_membership(
            &database,
            "ws",
            "member@acct",
            WorkspaceRole::Member,
            MembershipStatus::Active,
        )
        .await;
        let document = seed_document(
            &database,
            "ws",
            owner.id.as_str(),
            DocumentFixture::default(),
        )
        .await;

        let service = PermissionService::from_database(&database);
        let permission = service
            .grant(
                "owner@acct",
                "ws",
                document.id.as_str(),
                GrantPermissionInput {
                    principal_id: member.id.to_string(),
                    role: DocumentRole::Commenter,
                },
            )
            .await
            .unwrap();
        service
            .revoke("owner@acct", "ws", document.id.as_str(), &permission.id)
            .await
            .unwrap();
        service
            .update_workspace_access(
                "owner@acct",
                "ws",
                document.id.as_str(),
                WorkspaceAccessUpdate {
                    default_access: Some(DocumentRole::Viewer),
                    editors_admin_only: Some(true),
                },
            )
            .await
            .unwrap();

        let page = AuditRecorder::new(&database)
            .list(&AuditLogQuery {
                workspace_id: "ws".to_owned(),
                ..AuditLogQuery::default()
            })
            .await
            .unwrap();

        let mut actions: Vec<&str> = page.logs.iter().map(|log| log.action.as_str()).collect();
        actions.sort_unstable();
        assert_eq!(
            actions,
            vec![
                "document_permission.granted",
                "document_permission.revoked",
                "document_permission.workspace_access_updated",
            ]
        );
        assert!(!page.has_next_page);

        let update_log = page
            .logs
            .iter()
            .find(|log| log.action == "document_permission.workspace_access_updated")
            .unwrap();
        assert_eq!(update_log.entity_type, "document");
        assert_eq!(
            update_log.metadata.as_ref().unwrap()["defaultAccess"],
            "viewer"
        );
        assert_eq!(
            update_log.metadata.as_ref().unwrap()["editorAdminsOnly"],
            true
        );
    }
}
