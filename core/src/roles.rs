use serde::{Deserialize, Serialize};

/// Per-document capability, ordered ascending. `max` over this ordering is
/// how explicit grants combine with workspace-default inheritance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum DocumentRole {
    #[default]
    None,
    Viewer,
    Commenter,
    Editor,
}

impl DocumentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentRole::None => "none",
            DocumentRole::Viewer => "viewer",
            DocumentRole::Commenter => "commenter",
            DocumentRole::Editor => "editor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(DocumentRole::None),
            "viewer" => Some(DocumentRole::Viewer),
            "commenter" => Some(DocumentRole::Commenter),
            "editor" => Some(DocumentRole::Editor),
            _ => None,
        }
    }

    pub fn satisfies(self, required: DocumentRole) -> bool {
        self >= required
    }
}

/// Structural workspace role. Owners and admins sit outside the document
/// role ordering and always dominate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Owner,
    Admin,
    Member,
}

impl WorkspaceRole {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkspaceRole::Owner => "owner",
            WorkspaceRole::Admin => "admin",
            WorkspaceRole::Member => "member",
        }
    }

    /// Unrecognised role strings resolve to the least privileged role.
    pub fn parse_lossy(value: &str) -> Self {
        match value {
            "owner" => WorkspaceRole::Owner,
            "admin" => WorkspaceRole::Admin,
            _ => WorkspaceRole::Member,
        }
    }

    pub fn is_admin_or_owner(self) -> bool {
        matches!(self, WorkspaceRole::Owner | WorkspaceRole::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Suspended,
}

impl MembershipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Suspended => "suspended",
        }
    }

    /// Anything that is not exactly `active` carries zero capabilities.
    pub fn parse_lossy(value: &str) -> Self {
        match value {
            "active" => MembershipStatus::Active,
            _ => MembershipStatus::Suspended,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, MembershipStatus::Active)
    }
}

/// Access level carried by a share link. Commenter is deliberately not
/// representable here; links only grant read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareLinkAccess {
    Viewer,
    Editor,
}

impl ShareLinkAccess {
    pub fn as_str(self) -> &'static str {
        match self {
            ShareLinkAccess::Viewer => "viewer",
            ShareLinkAccess::Editor => "editor",
        }
    }

    /// Unrecognised levels resolve to read-only.
    pub fn parse_lossy(value: &str) -> Self {
        match value {
            "editor" => ShareLinkAccess::Editor,
            _ => ShareLinkAccess::Viewer,
        }
    }

    pub fn as_document_role(self) -> DocumentRole {
        match self {
            ShareLinkAccess::Viewer => DocumentRole::Viewer,
            ShareLinkAccess::Editor => DocumentRole::Editor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_roles_order_ascending() {
        assert!(DocumentRole::None < DocumentRole::Viewer);
        assert!(DocumentRole::Viewer < DocumentRole::Commenter);
        assert!(DocumentRole::Commenter < DocumentRole::Editor);
    }

    #[test]
    fn effective_role_is_max_of_grant_and_inheritance() {
        let explicit = DocumentRole::Viewer;
        let inherited = DocumentRole::Editor;
        assert_eq!(explicit.max(inherited), DocumentRole::Editor);
    }

    #[test]
    fn unknown_membership_status_fails_closed() {
        assert_eq!(
            MembershipStatus::parse_lossy("invited"),
            MembershipStatus::Suspended
        );
        assert_eq!(
            MembershipStatus::parse_lossy("active"),
            MembershipStatus::Active
        );
    }

    #[test]
    fn unknown_share_link_access_is_read_only() {
        assert_eq!(
            ShareLinkAccess::parse_lossy("commenter"),
            ShareLinkAccess::Viewer
        );
    }
}
