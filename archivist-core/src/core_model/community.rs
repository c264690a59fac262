//! Community record

use super::{push_unique, remove_value, ContentObject, Metadata};
use crate::core_store::{
    BitstreamId, CollectionId, CommunityId, Entity, GroupId, ResourceKind, Timestamp,
};
use serde::{Deserialize, Serialize};

/// A node in the community tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,
    pub legacy_id: i64,
    pub handle: Option<String>,
    pub metadata: Metadata,
    pub logo: Option<BitstreamId>,
    pub admins: Option<GroupId>,
    /// `None` for top-level communities
    pub parent: Option<CommunityId>,
    pub subcommunities: Vec<CommunityId>,
    pub collections: Vec<CollectionId>,
    pub modified: bool,
    pub last_modified: Timestamp,
}

impl Community {
    pub fn new() -> Self {
        Self {
            id: CommunityId::generate(),
            legacy_id: 0,
            handle: None,
            metadata: Metadata::new(),
            logo: None,
            admins: None,
            parent: None,
            subcommunities: Vec::new(),
            collections: Vec::new(),
            modified: false,
            last_modified: Timestamp::now(),
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    pub fn add_subcommunity(&mut self, child: CommunityId) -> bool {
        push_unique(&mut self.subcommunities, child)
    }

    pub fn remove_subcommunity(&mut self, child: &CommunityId) -> bool {
        remove_value(&mut self.subcommunities, child)
    }

    pub fn add_collection(&mut self, collection: CollectionId) -> bool {
        push_unique(&mut self.collections, collection)
    }

    pub fn remove_collection(&mut self, collection: &CollectionId) -> bool {
        remove_value(&mut self.collections, collection)
    }
}

impl Default for Community {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentObject for Community {
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

impl Entity for Community {
    type Id = CommunityId;

    const KIND: ResourceKind = ResourceKind::Community;

    fn id(&self) -> CommunityId {
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
    fn test_links_are_unique() {
        let mut community = Community::new();
        let child = CommunityId::generate();
        assert!(community.add_subcommunity(child));
        assert!(!community.add_subcommunity(child));
        assert_eq!(community.subcommunities.len(), 1);
        assert!(community.remove_subcommunity(&child));
        assert!(!community.remove_subcommunity(&child));
    }

    #[test]
    fn test_new_is_top_level() {
        assert!(Community::new().is_top_level());
    }
}
