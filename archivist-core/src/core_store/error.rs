//! Persistence errors

use super::types::ResourceKind;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} {id} does not exist")]
    Missing { kind: ResourceKind, id: String },

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Store lock poisoned")]
    Poisoned,
}
