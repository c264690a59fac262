//! Error types shared by every content manager

use crate::core_store::{ResourceKind, StoreError};
use thiserror::Error;

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the content managers and their collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// The acting principal lacks the permission an operation requires
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// A caller-supplied argument is unusable
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Repository configuration does not allow the operation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A referenced object does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    /// The object is in a state that forbids the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An explicitly requested handle is already bound
    #[error("Handle already in use: {0}")]
    DuplicateHandle(String),

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl Error {
    pub fn denied(message: impl Into<String>) -> Self {
        Error::AuthorizationDenied(message.into())
    }

    pub fn not_found(kind: ResourceKind, id: impl ToString) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether this error is an authorization denial
    pub fn is_denied(&self) -> bool {
        matches!(self, Error::AuthorizationDenied(_))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing { kind, id } => Error::NotFound { kind, id },
            other => Error::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_row_maps_to_not_found() {
        let err: Error = StoreError::Missing {
            kind: ResourceKind::Item,
            id: "42".to_string(),
        }
        .into();
        assert!(matches!(err, Error::NotFound { kind: ResourceKind::Item, .. }));
        assert_eq!(err.to_string(), "ITEM not found: 42");
    }

    #[test]
    fn test_denied_helper() {
        let err = Error::denied("nope");
        assert!(err.is_denied());
        assert!(!Error::InvalidArgument("x".into()).is_denied());
    }
}
