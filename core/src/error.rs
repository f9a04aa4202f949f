use std::fmt;

use anyhow::Error as AnyError;
use tracing::error;

/// Domain error surfaced by the permission and share-link services.
///
/// Expected authorization denials travel as [`crate::access::AccessDecision`]
/// values, not errors; this type covers the cases where an operation cannot
/// proceed at all. Callers own the mapping to transport-level responses.
#[derive(Debug)]
pub enum CoreError {
    /// The entity is absent, or the caller must not learn that it exists.
    NotFound,
    /// The entity exists and the caller is known, but lacks the role.
    AccessDenied,
    /// A share-link password is required or the supplied one is wrong.
    PasswordRequired,
    /// Malformed input, e.g. an empty update payload.
    ValidationFailed(String),
    /// Infrastructure failure: storage unreachable, token space exhausted.
    Internal(AnyError),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::ValidationFailed(message.into())
    }

    pub(crate) fn internal(err: AnyError) -> Self {
        error!(?err, "internal error");
        CoreError::Internal(err)
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::NotFound => write!(f, "resource not found"),
            CoreError::AccessDenied => write!(f, "access denied"),
            CoreError::PasswordRequired => {
                write!(f, "share link password required or incorrect")
            }
            CoreError::ValidationFailed(message) => write!(f, "{message}"),
            CoreError::Internal(_) => write!(f, "an internal error occurred"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Internal(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<AnyError> for CoreError {
    fn from(err: AnyError) -> Self {
        CoreError::internal(err)
    }
}
