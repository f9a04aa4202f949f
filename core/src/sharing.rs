use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::{
    access::{AccessDecisionEngine, TokenEvaluation},
    audit::{AuditActor, AuditEvent, AuditRecorder},
    db::{Database, share_link_repo::ReactivateShareLinkParams},
    document::{DocumentRecord, DocumentStore},
    error::CoreError,
    ids::MembershipId,
    membership::MembershipDirectory,
    password::generate_password_hash,
    roles::{DocumentRole, ShareLinkAccess},
    share_link::{NewShareLink, ShareLinkRecord, ShareLinkStore},
};

#[derive(Debug, Clone)]
pub struct CreateShareLinkInput {
    pub access_level: ShareLinkAccess,
    pub password: Option<String>,
    pub expires_at: Option<i64>,
    pub is_public: bool,
}

/// What a bearer gets back after the token passes every gate.
#[derive(Debug, Clone)]
pub struct ResolvedShareLink {
    pub token: String,
    pub document: DocumentRecord,
    pub access_level: ShareLinkAccess,
    pub created_by_membership_id: MembershipId,
}

#[derive(Debug, Clone)]
pub struct PublishedDocument {
    pub document: DocumentRecord,
    pub token: String,
    pub is_current_document: bool,
}

#[derive(Debug, Clone)]
pub struct AuthorPublicListing {
    pub author_name: Option<String>,
    pub documents: Vec<PublishedDocument>,
}

/// Share-link lifecycle: minting, revocation, reactivation and resolution.
/// Links are never deleted here; a revoked link keeps its token so that the
/// same URL can be brought back later.
pub struct ShareLinkService {
    documents: DocumentStore,
    share_links: ShareLinkStore,
    memberships: MembershipDirectory,
    engine: Arc<AccessDecisionEngine>,
    audit: AuditRecorder,
}

impl ShareLinkService {
    pub fn new(
        documents: DocumentStore,
        share_links: ShareLinkStore,
        memberships: MembershipDirectory,
        engine: Arc<AccessDecisionEngine>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            documents,
            share_links,
            memberships,
            engine,
            audit,
        }
    }

    pub fn from_database(database: &Database) -> Self {
        Self::new(
            DocumentStore::new(database),
            ShareLinkStore::new(database),
            MembershipDirectory::new(database),
            Arc::new(AccessDecisionEngine::from_database(database)),
            AuditRecorder::new(database),
        )
    }

    pub async fn list(
        &self,
        account_id: &str,
        workspace_id: &str,
        document_id: &str,
    ) -> Result<Vec<ShareLinkRecord>, CoreError> {
        let document = self.get_document(document_id, workspace_id).await?;
        self.engine.require_manager(account_id, &document).await?;

        Ok(self.share_links.list_by_document(document_id).await?)
    }

    /// Create a link for the document. If the document already has one
    /// (possibly revoked), it is reactivated with the new parameters so the
    /// original token string keeps working; otherwise a fresh token is
    /// minted.
    pub async fn create(
        &self,
        account_id: &str,
        workspace_id: &str,
        document_id: &str,
        input: CreateShareLinkInput,
    ) -> Result<ShareLinkRecord, CoreError> {
        let document = self.get_document(document_id, workspace_id).await?;
        let actor = self.engine.require_manager(account_id, &document).await?;

        if let Some(expires_at) = input.expires_at {
            if expires_at <= Utc::now().timestamp() {
                return Err(CoreError::validation("expiresAt must be in the future"));
            }
        }

        let password_hash = match input.password.as_deref() {
            Some(password) => Some(generate_password_hash(password)?),
            None => None,
        };

        if let Some(existing) = self.share_links.find_latest_by_document(document_id).await? {
            let link = self
                .share_links
                .reactivate(
                    &existing.id,
                    &ReactivateShareLinkParams {
                        access_level: input.access_level,
                        password_hash,
                        expires_at: input.expires_at,
                        is_public: input.is_public,
                    },
                )
                .await?;

            self.audit
                .record_best_effort(AuditEvent {
                    workspace_id: document.workspace_id.clone(),
                    actor: AuditActor::Membership(actor.id.clone()),
                    action: "share_link.updated".to_owned(),
                    entity_type: "share_link".to_owned(),
                    entity_id: Some(link.id.clone()),
                    metadata: Some(json!({
                        "accessLevel": link.access_level,
                        "expiresAt": link.expires_at,
                        "reactivated": true,
                    })),
                })
                .await;

            return Ok(link);
        }

        let link = self
            .share_links
            .create(NewShareLink {
                document_id: document.id.to_string(),
                workspace_id: document.workspace_id.to_string(),
                created_by_membership_id: actor.id.to_string(),
                access_level: input.access_level,
                password_hash,
                expires_at: input.expires_at,
                is_public: input.is_public,
            })
            .await?;

        self.audit
            .record_best_effort(AuditEvent {
                workspace_id: document.workspace_id.clone(),
                actor: AuditActor::Membership(actor.id.clone()),
                action: "share_link.created".to_owned(),
                entity_type: "share_link".to_owned(),
                entity_id: Some(link.id.clone()),
                metadata: Some(json!({
                    "accessLevel": link.access_level,
                    "expiresAt": link.expires_at,
                })),
            })
            .await;

        Ok(link)
    }

    /// Idempotent: revoking an already-revoked link succeeds without
    /// touching the stored revocation time.
    pub async fn revoke(
        &self,
        account_id: &str,
        workspace_id: &str,
        share_link_id: &str,
    ) -> Result<(), CoreError> {
        let link = self.ensure_share_link(share_link_id).await?;
        let document = self
            .get_document(link.document_id.as_str(), workspace_id)
            .await?;
        let actor = self.engine.require_manager(account_id, &document).await?;

        if link.revoked_at.is_some() {
            return Ok(());
        }

        self.share_links.revoke(&link.id).await?;

        self.audit
            .record_best_effort(AuditEvent {
                workspace_id: document.workspace_id.clone(),
                actor: AuditActor::Membership(actor.id.clone()),
                action: "share_link.revoked".to_owned(),
                entity_type: "share_link".to_owned(),
                entity_id: Some(link.id.clone()),
                metadata: None,
            })
            .await;

        Ok(())
    }

    /// Only the externally exposed toggle moves here; token, document
    /// binding and access level are immutable through this path.
    pub async fn update_options(
        &self,
        account_id: &str,
        workspace_id: &str,
        share_link_id: &str,
        is_public: bool,
    ) -> Result<ShareLinkRecord, CoreError> {
        let link = self.ensure_share_link(share_link_id).await?;
        let document = self
            .get_document(link.document_id.as_str(), workspace_id)
            .await?;
        let actor = self.engine.require_manager(account_id, &document).await?;

        let updated = self.share_links.update_options(&link.id, is_public).await?;

        self.audit
            .record_best_effort(AuditEvent {
                workspace_id: document.workspace_id.clone(),
                actor: AuditActor::Membership(actor.id.clone()),
                action: "share_link.updated".to_owned(),
                entity_type: "share_link".to_owned(),
                entity_id: Some(updated.id.clone()),
                metadata: Some(json!({ "isPublic": updated.is_public })),
            })
            .await;

        Ok(updated)
    }

    /// Resolve a bare share URL to its document. Unknown, revoked and
    /// expired tokens are indistinguishable to the caller.
    pub async fn resolve_token(
        &self,
        token: &str,
        password: Option<&str>,
    ) -> Result<ResolvedShareLink, CoreError> {
        let evaluation = self
            .engine
            .resolve_token(token, password, None, DocumentRole::Viewer)
            .await?;

        match evaluation {
            TokenEvaluation::Granted(grant) => Ok(ResolvedShareLink {
                token: grant.link.token.clone(),
                document: grant.document,
                access_level: grant.link.access_level,
                created_by_membership_id: grant.link.created_by_membership_id.clone(),
            }),
            TokenEvaluation::Denied(reason) => Err(reason.into_error()),
        }
    }

    /// Anonymous profile surfacing: every document the link author has
    /// published through an active public link, with the resolving document
    /// always included even when it is not itself public.
    pub async fn author_public_documents(
        &self,
        token: &str,
    ) -> Result<AuthorPublicListing, CoreError> {
        let Some(current) = self.share_links.find_active_by_token(token).await? else {
            return Err(CoreError::NotFound);
        };

        let author = self
            .memberships
            .find_by_id(current.created_by_membership_id.as_str())
            .await?;
        let author_name = author.and_then(|membership| membership.display_name);

        let mut links = self
            .share_links
            .find_public_by_membership(current.created_by_membership_id.as_str())
            .await?;

        if !links
            .iter()
            .any(|link| link.document_id == current.document_id)
        {
            links.insert(0, current.clone());
        }

        let mut documents = Vec::new();
        for link in links {
            let Some(document) = self
                .documents
                .find_active_by_id(link.document_id.as_str())
                .await?
            else {
                continue;
            };

            documents.push(PublishedDocument {
                is_current_document: link.document_id == current.document_id,
                token: link.token,
                document,
            });
        }

        Ok(AuthorPublicListing {
            author_name,
            documents,
        })
    }

    /// The anonymous-listing filter: a document surfaces iff its own
    /// visibility is public or it carries at least one active public link.
    /// Evaluated per call; nothing is cached.
    pub async fn publicly_listed(
        &self,
        documents: &[DocumentRecord],
    ) -> Result<Vec<DocumentRecord>, CoreError> {
        let now = Utc::now().timestamp();
        let mut listed = Vec::new();

        for document in documents {
            if document.is_deleted() {
                continue;
            }

            if document.public {
                listed.push(document.clone());
                continue;
            }

            let links = self
                .share_links
                .list_by_document(document.id.as_str())
                .await?;
            if links
                .iter()
                .any(|link| link.is_public && link.is_active(now))
            {
                listed.push(document.clone());
            }
        }

        Ok(listed)
    }

    async fn ensure_share_link(&self, id: &str) -> Result<ShareLinkRecord, CoreError> {
        match self.share_links.find_by_id(id).await? {
            Some(link) => Ok(link),
            None => Err(CoreError::NotFound),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audit::AuditRecorder,
        db::audit_log_repo::AuditLogQuery,
        roles::{MembershipStatus, WorkspaceRole},
        test_support::{DocumentFixture, seed_document, seed_membership, setup_database},
    };

    fn viewer_link() -> CreateShareLinkInput {
        CreateShareLinkInput {
            access_level: ShareLinkAccess::Viewer,
            password: None,
            expires_at: None,
            is_public: false,
        }
    }

    #[tokio::test]
    async fn revoked_links_reactivate_with_the_same_token() {
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

        let service = ShareLinkService::from_database(&database);
        let link = service
            .create("owner@acct", "ws", document.id.as_str(), viewer_link())
            .await
            .unwrap();

        let resolved = service.resolve_token(&link.token, None).await.unwrap();
        assert_eq!(resolved.document.id, document.id);
        assert_eq!(resolved.access_level, ShareLinkAccess::Viewer);

        service.revoke("owner@acct", "ws", &link.id).await.unwrap();
        // Idempotent: a second revoke is a no-op success.
        service.revoke("owner@acct", "ws", &link.id).await.unwrap();

        let gone = service.resolve_token(&link.token, None).await;
        assert!(matches!(gone, Err(CoreError::NotFound)));

        // Creating again recycles the link instead of minting a new token.
        let recycled = service
            .create(
                "owner@acct",
                "ws",
                document.id.as_str(),
                CreateShareLinkInput {
                    access_level: ShareLinkAccess::Editor,
                    password: None,
                    expires_at: None,
                    is_public: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(recycled.id, link.id);
        assert_eq!(recycled.token, link.token);
        assert_eq!(recycled.access_level, ShareLinkAccess::Editor);
        assert!(recycled.revoked_at.is_none());

        let resolved = service.resolve_token(&link.token, None).await.unwrap();
        assert_eq!(resolved.access_level, ShareLinkAccess::Editor);
    }

    #[tokio::test]
    async fn create_rejects_past_expiry_and_non_managers() {
        let (_dir, database) = setup_database().await;
        let owner = seed_membership(
            &database,
            "ws",
            "owner@acct",
            WorkspaceRole::Owner,
            MembershipStatus::Active,
        )
        .await;
        seed_membership(
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

        let service = ShareLinkService::from_database(&database);

        let stale = service
            .create(
                "owner@acct",
                "ws",
                document.id.as_str(),
                CreateShareLinkInput {
                    expires_at: Some(Utc::now().timestamp() - 10),
                    ..viewer_link()
                },
            )
            .await;
        assert!(matches!(stale, Err(CoreError::ValidationFailed(_))));

        let forbidden = service
            .create("member@acct", "ws", document.id.as_str(), viewer_link())
            .await;
        assert!(matches!(forbidden, Err(CoreError::AccessDenied)));
    }

    #[tokio::test]
    async fn expired_links_resolve_like_revoked_ones() {
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

        let service = ShareLinkService::from_database(&database);
        let link = service
            .create(
                "owner@acct",
                "ws",
                document.id.as_str(),
                CreateShareLinkInput {
                    expires_at: Some(Utc::now().timestamp() + 1),
                    ..viewer_link()
                },
            )
            .await
            .unwrap();

        // Push the expiry into the past without touching the revocation
        // marker, then observe the same outcome a revoked link gives.
        sqlx::query("UPDATE share_links SET expires_at = ? WHERE id = ?")
            .bind(Utc::now().timestamp() - 60)
            .bind(&link.id)
            .execute(database.pool())
            .await
            .unwrap();

        let expired = service.resolve_token(&link.token, None).await;
        assert!(matches!(expired, Err(CoreError::NotFound)));
    }

    #[tokio::test]
    async fn password_protected_links_gate_resolution() {
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

        let service = ShareLinkService::from_database(&database);
        let link = service
            .create(
                "owner@acct",
                "ws",
                document.id.as_str(),
                CreateShareLinkInput {
                    password: Some("opensesame".to_owned()),
                    ..viewer_link()
                },
            )
            .await
            .unwrap();

        let missing = service.resolve_token(&link.token, None).await;
        assert!(matches!(missing, Err(CoreError::PasswordRequired)));

        let wrong = service.resolve_token(&link.token, Some("nope")).await;
        assert!(matches!(wrong, Err(CoreError::PasswordRequired)));

        let resolved = service
            .resolve_token(&link.token, Some("opensesame"))
            .await
            .unwrap();
        assert_eq!(resolved.access_level, ShareLinkAccess::Viewer);
    }

    #[tokio::test]
    async fn update_options_toggles_only_the_public_flag() {
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

        let service = ShareLinkService::from_database(&database);
        let link = service
            .create("owner@acct", "ws", document.id.as_str(), viewer_link())
            .await
            .unwrap();

        let updated = service
            .update_options("owner@acct", "ws", &link.id, true)
            .await
            .unwrap();
        assert!(updated.is_public);
        assert_eq!(updated.token, link.token);
        assert_eq!(updated.access_level, link.access_level);
        assert_eq!(updated.document_id, link.document_id);
    }

    #[tokio::test]
    async fn author_listing_walks_active_public_links() {
        let (_dir, database) = setup_database().await;
        let owner = seed_membership(
            &database,
            "ws",
            "owner@acct",
            WorkspaceRole::Owner,
            MembershipStatus::Active,
        )
        .await;
        let published = seed_document(
            &database,
            "ws",
            owner.id.as_str(),
            DocumentFixture::default(),
        )
        .await;
        let shared_privately = seed_document(
            &database,
            "ws",
            owner.id.as_str(),
            DocumentFixture::default(),
        )
        .await;

        let service = ShareLinkService::from_database(&database);
        service
            .create(
                "owner@acct",
                "ws",
                published.id.as_str(),
                CreateShareLinkInput {
                    is_public: true,
                    ..viewer_link()
                },
            )
            .await
            .unwrap();
        let private_link = service
            .create(
                "owner@acct",
                "ws",
                shared_privately.id.as_str(),
                viewer_link(),
            )
            .await
            .unwrap();

        // Resolving through the non-public link still lists that document,
        // alongside the author's public ones.
        let listing = service
            .author_public_documents(&private_link.token)
            .await
            .unwrap();
        assert_eq!(listing.documents.len(), 2);

        let current = listing
            .documents
            .iter()
            .find(|entry| entry.is_current_document)
            .unwrap();
        assert_eq!(current.document.id, shared_privately.id);
        assert!(
            listing
                .documents
                .iter()
                .any(|entry| entry.document.id == published.id)
        );
    }

    #[tokio::test]
    async fn public_listing_filter_needs_visibility_or_an_active_public_link() {
        let (_dir, database) = setup_database().await;
        let owner = seed_membership(
            &database,
            "ws",
            "owner@acct",
            WorkspaceRole::Owner,
            MembershipStatus::Active,
        )
        .await;
        let public_doc = seed_document(
            &database,
            "ws",
            owner.id.as_str(),
            DocumentFixture {
                public: true,
                ..DocumentFixture::default()
            },
        )
        .await;
        let linked_doc = seed_document(
            &database,
            "ws",
            owner.id.as_str(),
            DocumentFixture::default(),
        )
        .await;
        let revoked_doc = seed_document(
            &database,
            "ws",
            owner.id.as_str(),
            DocumentFixture::default(),
        )
        .await;
        let private_doc = seed_document(
            &database,
            "ws",
            owner.id.as_str(),
            DocumentFixture::default(),
        )
        .await;

        let service = ShareLinkService::from_database(&database);
        service
            .create(
                "owner@acct",
                "ws",
                linked_doc.id.as_str(),
                CreateShareLinkInput {
                    is_public: true,
                    ..viewer_link()
                },
            )
            .await
            .unwrap();
        let revoked_link = service
            .create(
                "owner@acct",
                "ws",
                revoked_doc.id.as_str(),
                CreateShareLinkInput {
                    is_public: true,
                    ..viewer_link()
                },
            )
            .await
            .unwrap();
        service
            .revoke("owner@acct", "ws", &revoked_link.id)
            .await
            .unwrap();

        let candidates = vec![
            public_doc.clone(),
            linked_doc.clone(),
            revoked_doc,
            private_doc,
        ];
        let listed = service.publicly_listed(&candidates).await.unwrap();

        let listed_ids: Vec<&str> = listed.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(listed_ids, vec![public_doc.id.as_str(), linked_doc.id.as_str()]);
    }

    #[tokio::test]
    async fn lifecycle_mutations_are_audited() {
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

        let service = ShareLinkService::from_database(&database);
        let link = service
            .create("owner@acct", "ws", document.id.as_str(), viewer_link())
            .await
            .unwrap();
        service.revoke("owner@acct", "ws", &link.id).await.unwrap();

        let page = AuditRecorder::new(&database)
            .list(&AuditLogQuery {
                workspace_id: "ws".to_owned(),
                entity_type: Some("share_link".to_owned()),
                ..AuditLogQuery::default()
            })
            .await
            .unwrap();

        let mut actions: Vec<&str> = page.logs.iter().map(|log| log.action.as_str()).collect();
        actions.sort_unstable();
        assert_eq!(actions, vec!["share_link.created", "share_link.revoked"]);
        assert!(
            page.logs
                .iter()
                .all(|log| log.entity_id.as_deref() == Some(link.id.as_str()))
        );
    }
}
