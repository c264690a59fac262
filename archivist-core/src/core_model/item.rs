//! Item record

use super::{push_unique, remove_value, ContentObject, Metadata};
use crate::core_store::{
    BundleId, CollectionId, EPersonId, Entity, ItemId, ResourceKind, Timestamp,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub legacy_id: i64,
    pub handle: Option<String>,
    pub metadata: Metadata,
    pub in_archive: bool,
    pub withdrawn: bool,
    pub discoverable: bool,
    pub submitter: Option<EPersonId>,
    /// Must be one of `collections` when set
    pub owning_collection: Option<CollectionId>,
    /// Set only on a collection's template item
    pub template_item_of: Option<CollectionId>,
    pub collections: Vec<CollectionId>,
    pub bundles: Vec<BundleId>,
    pub modified: bool,
    pub last_modified: Timestamp,
}

impl Item {
    pub fn new() -> Self {
        Self {
            id: ItemId::generate(),
            legacy_id: 0,
            handle: None,
            metadata: Metadata::new(),
            in_archive: false,
            withdrawn: false,
            discoverable: true,
            submitter: None,
            owning_collection: None,
            template_item_of: None,
            collections: Vec::new(),
            bundles: Vec::new(),
            modified: false,
            last_modified: Timestamp::now(),
        }
    }

    pub fn is_in(&self, collection: &CollectionId) -> bool {
        self.collections.contains(collection)
    }

    pub fn is_owned_by(&self, collection: &CollectionId) -> bool {
        self.owning_collection.as_ref() == Some(collection)
    }

    pub fn is_template(&self) -> bool {
        self.template_item_of.is_some()
    }

    pub fn add_collection(&mut self, collection: CollectionId) -> bool {
        push_unique(&mut self.collections, collection)
    }

    /// Drops the membership, handing ownership to the first remaining collection
    pub fn remove_collection(&mut self, collection: &CollectionId) -> bool {
        let removed = remove_value(&mut self.collections, collection);
        if self.is_owned_by(collection) {
            self.owning_collection = self.collections.first().copied();
            self.modified = true;
        }
        removed
    }

    pub fn add_bundle(&mut self, bundle: BundleId) -> bool {
        push_unique(&mut self.bundles, bundle)
    }

    pub fn remove_bundle(&mut self, bundle: &BundleId) -> bool {
        remove_value(&mut self.bundles, bundle)
    }
}

impl Default for Item {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentObject for Item {
    fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Entity for Item {
    type Id = ItemId;

    const KIND: ResourceKind = ResourceKind::Item;

    fn id(&self) -> ItemId {
        self.id
    }

    fn legacy_id(&self) -> i64 {
        self.legacy_id
    }

    fn set_legacy_id(&mut self, legacy_id: i64) {
        self.legacy_id = legacy_id;
    }

    fn sort_key(&self) -> String {
        self.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removing_owner_hands_over_ownership() {
        let first = CollectionId::generate();
        let second = CollectionId::generate();
        let mut item = Item::new();
        item.add_collection(first);
        item.add_collection(second);
        item.owning_collection = Some(first);

        assert!(item.remove_collection(&first));
        assert_eq!(item.owning_collection, Some(second));

        item.remove_collection(&second);
        assert_eq!(item.owning_collection, None);
        assert!(item.collections.is_empty());
    }

    #[test]
    fn test_defaults() {
        let item = Item::new();
        assert!(item.discoverable);
        assert!(!item.in_archive);
        assert!(!item.is_template());
    }
}
