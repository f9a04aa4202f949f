//! Access control and share-link authorization for Vellum document
//! workspaces.
//!
//! The crate decides, for any (actor, document) pair, whether an operation
//! is permitted, and manages the bearer-token share links that grant scoped
//! access to non-members. Routing, editors, content storage and session
//! issuance live elsewhere and talk to this crate through the repository
//! contracts in [`db`].

pub mod access;
pub mod audit;
pub mod config;
pub mod db;
pub mod doc_permission;
pub mod document;
pub mod error;
pub mod ids;
pub mod membership;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod share_link;
pub mod sharing;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::{config::AppConfig, db::Database, error::CoreError};
