//! Persistence contracts, identifier types and the in-memory store

mod dao;
mod error;
pub mod memory;
mod types;

pub(crate) use dao::require;
pub use dao::{ContentStore, Dao, Entity, ItemFilter, PolicyStore, TransactionManager};
pub use error::{StoreError, StoreResult};
pub use types::{
    BitstreamId, BundleId, CollectionId, CommunityId, EPersonId, GroupId, ItemId, ObjectRef, Page,
    PolicyId, ResourceKind, ResourceRef, SiteId, Timestamp,
};
