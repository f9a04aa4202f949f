pub mod audit_log_repo;
pub mod connection;
pub mod doc_permission_repo;
pub mod document_repo;
pub mod membership_repo;
pub mod share_link_repo;
