//! Collection record and workflow step numbering

use super::{push_unique, remove_value, ContentObject, Metadata};
use crate::core_store::{
    BitstreamId, CollectionId, CommunityId, Entity, GroupId, ItemId, ResourceKind, Timestamp,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// One of the three review steps a collection can route submissions through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStep {
    One,
    Two,
    Three,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 3] = [WorkflowStep::One, WorkflowStep::Two, WorkflowStep::Three];

    /// 1-based step number
    pub fn number(&self) -> u32 {
        match self {
            WorkflowStep::One => 1,
            WorkflowStep::Two => 2,
            WorkflowStep::Three => 3,
        }
    }

    fn index(&self) -> usize {
        self.number() as usize - 1
    }
}

impl TryFrom<u32> for WorkflowStep {
    type Error = Error;

    fn try_from(step: u32) -> Result<Self> {
        match step {
            1 => Ok(WorkflowStep::One),
            2 => Ok(WorkflowStep::Two),
            3 => Ok(WorkflowStep::Three),
            other => Err(Error::InvalidArgument(format!("Illegal step count: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub legacy_id: i64,
    pub handle: Option<String>,
    pub metadata: Metadata,
    pub logo: Option<BitstreamId>,
    pub submitters: Option<GroupId>,
    pub admins: Option<GroupId>,
    pub workflow_groups: [Option<GroupId>; 3],
    pub template_item: Option<ItemId>,
    pub communities: Vec<CommunityId>,
    pub items: Vec<ItemId>,
    pub modified: bool,
    pub last_modified: Timestamp,
}

impl Collection {
    pub fn new() -> Self {
        Self {
            id: CollectionId::generate(),
            legacy_id: 0,
            handle: None,
            metadata: Metadata::new(),
            logo: None,
            submitters: None,
            admins: None,
            workflow_groups: [None; 3],
            template_item: None,
            communities: Vec::new(),
            items: Vec::new(),
            modified: false,
            last_modified: Timestamp::now(),
        }
    }

    pub fn workflow_group(&self, step: WorkflowStep) -> Option<GroupId> {
        self.workflow_groups[step.index()]
    }

    pub fn set_workflow_group(&mut self, step: WorkflowStep, group: Option<GroupId>) {
        self.workflow_groups[step.index()] = group;
        self.modified = true;
    }

    /// Whether the group holds any role on this collection
    pub fn uses_group(&self, group: &GroupId) -> bool {
        self.submitters.as_ref() == Some(group)
            || self.admins.as_ref() == Some(group)
            || self.workflow_groups.iter().any(|g| g.as_ref() == Some(group))
    }

    pub fn add_community(&mut self, community: CommunityId) -> bool {
        push_unique(&mut self.communities, community)
    }

    pub fn remove_community(&mut self, community: &CommunityId) -> bool {
        remove_value(&mut self.communities, community)
    }

    pub fn add_item(&mut self, item: ItemId) -> bool {
        push_unique(&mut self.items, item)
    }

    pub fn remove_item(&mut self, item: &ItemId) -> bool {
        remove_value(&mut self.items, item)
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentObject for Collection {
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

impl Entity for Collection {
    type Id = CollectionId;

    const KIND: ResourceKind = ResourceKind::Collection;

    fn id(&self) -> CollectionId {
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
    fn test_workflow_step_bounds() {
        assert_eq!(WorkflowStep::try_from(2).unwrap(), WorkflowStep::Two);
        assert!(matches!(WorkflowStep::try_from(0), Err(Error::InvalidArgument(_))));
        assert!(matches!(WorkflowStep::try_from(4), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_workflow_group_slots() {
        let mut collection = Collection::new();
        let group = GroupId::generate();
        collection.set_workflow_group(WorkflowStep::Three, Some(group));
        assert_eq!(collection.workflow_group(WorkflowStep::Three), Some(group));
        assert_eq!(collection.workflow_group(WorkflowStep::One), None);
        assert!(collection.uses_group(&group));
    }
}
