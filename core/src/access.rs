use anyhow::Result;
use chrono::Utc;

use crate::{
    db::{
        Database, doc_permission_repo::DocPermissionRepositoryRef,
        document_repo::DocumentRepositoryRef, membership_repo::MembershipRepositoryRef,
        share_link_repo::ShareLinkRepositoryRef,
    },
    document::DocumentRecord,
    error::CoreError,
    membership::MembershipRecord,
    password::verify_password_hash,
    roles::DocumentRole,
    share_link::ShareLinkRecord,
};

/// The requesting party, as far as authorization is concerned. Closed so
/// that a new actor kind forces every dispatch site to be revisited.
#[derive(Debug, Clone, Copy)]
pub enum Actor<'a> {
    /// A signed-in account, resolved against the document's workspace.
    Authenticated { account_id: &'a str },
    /// A share-link bearer, optionally carrying a password attempt.
    TokenBearer {
        token: &'a str,
        password: Option<&'a str>,
    },
    /// Neither; only the public read-only path can grant anything.
    Anonymous,
}

/// Why an evaluation denied. Distinguished internally; collapse via
/// [`DenyReason::into_error`] at the boundary so callers cannot probe
/// link lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Entity absent, soft-deleted, or existence withheld from the caller.
    NotFound,
    /// The caller is known and the document exists, but the role is short.
    AccessDenied,
    /// Unknown, revoked or expired token. Deliberately one reason.
    InvalidToken,
    /// The token is live but bound to a different document.
    TokenMismatch,
    /// A password is configured and none (or the wrong one) was supplied.
    PasswordRequired,
}

impl DenyReason {
    /// Boundary mapping. Token problems surface as not-found so a bearer
    /// cannot distinguish "never existed" from "revoked" from "expired".
    pub fn into_error(self) -> CoreError {
        match self {
            DenyReason::NotFound | DenyReason::InvalidToken | DenyReason::TokenMismatch => {
                CoreError::NotFound
            }
            DenyReason::AccessDenied => CoreError::AccessDenied,
            DenyReason::PasswordRequired => CoreError::PasswordRequired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted { role: DocumentRole },
    Denied(DenyReason),
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted { .. })
    }

    pub fn granted_role(&self) -> Option<DocumentRole> {
        match self {
            AccessDecision::Granted { role } => Some(*role),
            AccessDecision::Denied(_) => None,
        }
    }

    /// Convert a deny into the boundary error, keeping grants as roles.
    pub fn require(self) -> Result<DocumentRole, CoreError> {
        match self {
            AccessDecision::Granted { role } => Ok(role),
            AccessDecision::Denied(reason) => Err(reason.into_error()),
        }
    }
}

/// A token evaluation that passed every gate, with the rows it validated.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub link: ShareLinkRecord,
    pub document: DocumentRecord,
    pub role: DocumentRole,
}

#[derive(Debug, Clone)]
pub enum TokenEvaluation {
    Granted(TokenGrant),
    Denied(DenyReason),
}

/// A token attempt carried alongside (or instead of) a session.
#[derive(Debug, Clone, Copy)]
pub struct ShareTokenAttempt<'a> {
    pub token: &'a str,
    pub password: Option<&'a str>,
}

/// The owner/admin/document-owner predicate. Managers may mutate
/// permissions and always hold full access.
pub fn is_manager(membership: &MembershipRecord, document: &DocumentRecord) -> bool {
    membership.is_active()
        && (membership.role.is_admin_or_owner()
            || membership.id == document.owner_membership_id)
}

/// Pure authorization over the stores: given an actor and a requested
/// minimum role, decide grant or deny. Evaluation never mutates anything;
/// expected denials are values, and only infrastructure faults are errors.
pub struct AccessDecisionEngine {
    documents: DocumentRepositoryRef,
    memberships: MembershipRepositoryRef,
    permissions: DocPermissionRepositoryRef,
    share_links: ShareLinkRepositoryRef,
}

impl AccessDecisionEngine {
    pub fn new(
        documents: DocumentRepositoryRef,
        memberships: MembershipRepositoryRef,
        permissions: DocPermissionRepositoryRef,
        share_links: ShareLinkRepositoryRef,
    ) -> Self {
        Self {
            documents,
            memberships,
            permissions,
            share_links,
        }
    }

    pub fn from_database(database: &Database) -> Self {
        let repositories = database.repositories();
        Self::new(
            repositories.document_repo(),
            repositories.membership_repo(),
            repositories.doc_permission_repo(),
            repositories.share_link_repo(),
        )
    }

    pub async fn evaluate(
        &self,
        actor: Actor<'_>,
        document_id: &str,
        required: DocumentRole,
    ) -> Result<AccessDecision> {
        match actor {
            Actor::Authenticated { account_id } => {
                self.evaluate_authenticated(account_id, document_id, required)
                    .await
            }
            Actor::TokenBearer { token, password } => {
                let evaluation = self
                    .resolve_token(token, password, Some(document_id), required)
                    .await?;
                Ok(match evaluation {
                    TokenEvaluation::Granted(grant) => AccessDecision::Granted { role: grant.role },
                    TokenEvaluation::Denied(reason) => AccessDecision::Denied(reason),
                })
            }
            Actor::Anonymous => self.evaluate_anonymous(document_id, required).await,
        }
    }

    pub async fn evaluate_authenticated(
        &self,
        account_id: &str,
        document_id: &str,
        required: DocumentRole,
    ) -> Result<AccessDecision> {
        let Some(document) = self.find_active_document(document_id).await? else {
            return Ok(AccessDecision::Denied(DenyReason::NotFound));
        };

        let Some(membership) = self
            .memberships
            .find_by_workspace_and_account(document.workspace_id.as_str(), account_id)
            .await?
        else {
            // Not a member of the workspace: only the public read path applies.
            return Ok(public_read_decision(&document, required));
        };

        if !membership.is_active() {
            return Ok(AccessDecision::Denied(DenyReason::AccessDenied));
        }

        if is_manager(&membership, &document) {
            return Ok(AccessDecision::Granted {
                role: DocumentRole::Editor,
            });
        }

        let explicit = self
            .permissions
            .find_by_document_and_principal(document.id.as_str(), membership.id.as_str())
            .await?
            .map(|permission| permission.role)
            .unwrap_or(DocumentRole::None);

        let effective = explicit.max(inherited_role(&document, &membership));

        Ok(if effective.satisfies(required) {
            AccessDecision::Granted { role: effective }
        } else {
            AccessDecision::Denied(DenyReason::AccessDenied)
        })
    }

    pub async fn evaluate_anonymous(
        &self,
        document_id: &str,
        required: DocumentRole,
    ) -> Result<AccessDecision> {
        let Some(document) = self.find_active_document(document_id).await? else {
            return Ok(AccessDecision::Denied(DenyReason::NotFound));
        };

        Ok(public_read_decision(&document, required))
    }

    /// Full token validation pipeline. `expected_document_id` binds the
    /// attempt to one document; `None` means "whatever the link points at",
    /// used when resolving a bare share URL.
    pub async fn resolve_token(
        &self,
        token: &str,
        password: Option<&str>,
        expected_document_id: Option<&str>,
        required: DocumentRole,
    ) -> Result<TokenEvaluation> {
        let Some(link) = self.share_links.find_by_token(token).await? else {
            return Ok(TokenEvaluation::Denied(DenyReason::InvalidToken));
        };

        // Revoked and expired collapse to the same reason on purpose.
        if !link.is_active(Utc::now().timestamp()) {
            return Ok(TokenEvaluation::Denied(DenyReason::InvalidToken));
        }

        if let Some(expected) = expected_document_id {
            if link.document_id.as_str() != expected {
                return Ok(TokenEvaluation::Denied(DenyReason::TokenMismatch));
            }
        }

        if let Some(stored_hash) = &link.password_hash {
            let verified = match password {
                Some(candidate) => verify_password_hash(stored_hash, candidate)?,
                None => false,
            };
            if !verified {
                return Ok(TokenEvaluation::Denied(DenyReason::PasswordRequired));
            }
        }

        let Some(document) = self.find_active_document(link.document_id.as_str()).await? else {
            return Ok(TokenEvaluation::Denied(DenyReason::NotFound));
        };

        // No inheritance for token bearers; the link level is the ceiling.
        let role = link.access_level.as_document_role();
        if !role.satisfies(required) {
            return Ok(TokenEvaluation::Denied(DenyReason::AccessDenied));
        }

        Ok(TokenEvaluation::Granted(TokenGrant {
            link,
            document,
            role,
        }))
    }

    /// Sequential composition used by endpoints that accept a session and a
    /// token together: authenticate first, fall back to the token only when
    /// the session path does not satisfy the requirement. A caller whose own
    /// membership suffices is never denied because of a bad token. When both
    /// paths deny and a token was attempted, the token-path reason is
    /// reported.
    pub async fn evaluate_with_fallback(
        &self,
        account_id: Option<&str>,
        token: Option<ShareTokenAttempt<'_>>,
        document_id: &str,
        required: DocumentRole,
    ) -> Result<AccessDecision> {
        // A missing or deleted document cannot be rescued by any actor kind.
        if self.find_active_document(document_id).await?.is_none() {
            return Ok(AccessDecision::Denied(DenyReason::NotFound));
        }

        let first = match account_id {
            Some(account_id) => {
                self.evaluate_authenticated(account_id, document_id, required)
                    .await?
            }
            None => self.evaluate_anonymous(document_id, required).await?,
        };

        if first.is_granted() {
            return Ok(first);
        }

        let Some(attempt) = token else {
            return Ok(first);
        };

        self.evaluate(
            Actor::TokenBearer {
                token: attempt.token,
                password: attempt.password,
            },
            document_id,
            required,
        )
        .await
    }

    /// Resolve the acting membership and require the manager predicate.
    /// Used by every permission-mutating service entry point.
    pub async fn require_manager(
        &self,
        account_id: &str,
        document: &DocumentRecord,
    ) -> Result<MembershipRecord, CoreError> {
        let membership = self
            .memberships
            .find_by_workspace_and_account(document.workspace_id.as_str(), account_id)
            .await?;

        match membership {
            Some(membership) if is_manager(&membership, document) => Ok(membership),
            _ => Err(CoreError::AccessDenied),
        }
    }

    async fn find_active_document(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        Ok(self
            .documents
            .find_by_id(document_id)
            .await?
            .filter(|document| !document.is_deleted()))
    }
}

/// Workspace-default inheritance, with the admins-only-editor policy
/// narrowing a workspace-wide editor default to read for plain members.
fn inherited_role(document: &DocumentRecord, membership: &MembershipRecord) -> DocumentRole {
    let inherited = document.workspace_default_access;
    if inherited == DocumentRole::Editor
        && document.workspace_editor_admins_only
        && !membership.role.is_admin_or_owner()
    {
        DocumentRole::Viewer
    } else {
        inherited
    }
}

/// The narrow anonymous path: publicly surfaced documents are readable and
/// nothing more. Non-public documents stay invisible.
fn public_read_decision(document: &DocumentRecord, required: DocumentRole) -> AccessDecision {
    if !document.public {
        return AccessDecision::Denied(DenyReason::NotFound);
    }

    if DocumentRole::Viewer.satisfies(required) {
        AccessDecision::Granted {
            role: DocumentRole::Viewer,
        }
    } else {
        AccessDecision::Denied(DenyReason::AccessDenied)
    }
}
