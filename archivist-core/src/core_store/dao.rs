//! Persistence contracts the content managers are written against

use super::error::StoreResult;
use super::types::{
    CollectionId, EPersonId, GroupId, Page, PolicyId, ResourceKind, ResourceRef, SiteId,
};
use crate::core_authz::ResourcePolicy;
use crate::core_model::{Bitstream, Bundle, Collection, Community, Item};
use std::fmt;
use std::hash::Hash;

/// A persistable row with a UUID identity and a legacy integer id
pub trait Entity: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + fmt::Display + Send + Sync + Into<ResourceRef>;

    const KIND: ResourceKind;

    fn id(&self) -> Self::Id;

    fn legacy_id(&self) -> i64;

    fn set_legacy_id(&mut self, legacy_id: i64);

    /// Key used to order `find_all` listings
    fn sort_key(&self) -> String;
}

/// Generic CRUD access for one entity type
pub trait Dao<T: Entity>: Send + Sync {
    /// Persist a new row, assigning its legacy id
    fn create(&self, entity: T) -> StoreResult<T>;

    fn find(&self, id: &T::Id) -> StoreResult<Option<T>>;

    fn find_by_legacy_id(&self, legacy_id: i64) -> StoreResult<Option<T>>;

    /// All rows ordered by sort key, then legacy id
    fn find_all(&self, page: Page) -> StoreResult<Vec<T>>;

    /// Overwrite an existing row
    fn save(&self, entity: &T) -> StoreResult<()>;

    fn delete(&self, id: &T::Id) -> StoreResult<()>;

    fn count_rows(&self) -> StoreResult<usize>;
}

/// Selection criteria for item listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub in_archive: Option<bool>,
    pub withdrawn: Option<bool>,
    pub collection: Option<CollectionId>,
    pub submitter: Option<EPersonId>,
    pub discoverable: Option<bool>,
}

impl ItemFilter {
    /// Archived and not withdrawn
    pub fn archived() -> Self {
        Self {
            in_archive: Some(true),
            withdrawn: Some(false),
            ..Self::default()
        }
    }

    pub fn withdrawn() -> Self {
        Self {
            withdrawn: Some(true),
            ..Self::default()
        }
    }

    /// Neither archived nor withdrawn, e.g. still in submission
    pub fn not_archived() -> Self {
        Self {
            in_archive: Some(false),
            withdrawn: Some(false),
            ..Self::default()
        }
    }

    pub fn in_collection(mut self, collection: CollectionId) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn submitted_by(mut self, submitter: EPersonId) -> Self {
        self.submitter = Some(submitter);
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        if item.template_item_of.is_some() {
            return false;
        }
        self.in_archive.map_or(true, |v| item.in_archive == v)
            && self.withdrawn.map_or(true, |v| item.withdrawn == v)
            && self.discoverable.map_or(true, |v| item.discoverable == v)
            && self.submitter.map_or(true, |s| item.submitter == Some(s))
            && self
                .collection
                .map_or(true, |c| item.collections.contains(&c))
    }
}

/// Entity tables plus the relationship finders the managers need
pub trait ContentStore: Send + Sync {
    fn communities(&self) -> &dyn Dao<Community>;

    fn collections(&self) -> &dyn Dao<Collection>;

    fn items(&self) -> &dyn Dao<Item>;

    fn bundles(&self) -> &dyn Dao<Bundle>;

    fn bitstreams(&self) -> &dyn Dao<Bitstream>;

    /// The singleton repository root
    fn site(&self) -> SiteId;

    /// Communities without a parent, ordered by name
    fn find_top_communities(&self) -> StoreResult<Vec<Community>>;

    fn find_community_by_admin_group(&self, group: &GroupId) -> StoreResult<Option<Community>>;

    /// Collection using the group as submitter, admin or workflow group
    fn find_collection_by_group(&self, group: &GroupId) -> StoreResult<Option<Collection>>;

    /// Non-template items matching the filter, ordered by legacy id
    fn find_items(&self, filter: &ItemFilter, page: Page) -> StoreResult<Vec<Item>>;

    fn count_items(&self, filter: &ItemFilter) -> StoreResult<usize>;
}

/// Raw storage of resource policies, without any decision logic
pub trait PolicyStore: Send + Sync {
    fn insert_policy(&self, policy: &ResourcePolicy) -> StoreResult<()>;

    /// Policies attached to a resource in insertion order
    fn policies_for(&self, resource: &ResourceRef) -> StoreResult<Vec<ResourcePolicy>>;

    fn policies_for_group(&self, group: &GroupId) -> StoreResult<Vec<ResourcePolicy>>;

    fn policies_for_eperson(&self, eperson: &EPersonId) -> StoreResult<Vec<ResourcePolicy>>;

    /// Returns the number of rows removed
    fn delete_policies(&self, ids: &[PolicyId]) -> StoreResult<usize>;
}

/// Unit-of-work boundary a request context commits or rolls back
pub trait TransactionManager: Send + Sync {
    fn begin(&self) -> StoreResult<()>;

    fn commit(&self) -> StoreResult<()>;

    fn rollback(&self) -> StoreResult<()>;
}

/// Convenience lookups shared by the managers
pub(crate) fn require<T: Entity>(dao: &dyn Dao<T>, id: &T::Id) -> crate::Result<T> {
    dao.find(id)?
        .ok_or_else(|| crate::Error::not_found(T::KIND, id))
}
