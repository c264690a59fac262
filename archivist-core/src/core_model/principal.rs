//! Groups and the people in them

use super::{push_unique, remove_value};
use crate::core_store::{EPersonId, Entity, GroupId, ResourceKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EPerson {
    pub id: EPersonId,
    pub email: String,
    pub full_name: String,
}

impl EPerson {
    pub fn new(email: &str, full_name: &str) -> Self {
        Self {
            id: EPersonId::generate(),
            email: email.to_string(),
            full_name: full_name.to_string(),
        }
    }
}

/// Named set of epersons and nested groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub legacy_id: i64,
    pub name: String,
    pub members: Vec<EPersonId>,
    pub subgroups: Vec<GroupId>,
}

impl Group {
    /// Every principal, signed in or not, belongs to this group
    pub const ANONYMOUS: &'static str = "Anonymous";
    /// Members are site administrators
    pub const ADMINISTRATOR: &'static str = "Administrator";

    pub fn new() -> Self {
        Self {
            id: GroupId::generate(),
            legacy_id: 0,
            name: String::new(),
            members: Vec::new(),
            subgroups: Vec::new(),
        }
    }

    pub fn add_member(&mut self, eperson: EPersonId) -> bool {
        push_unique(&mut self.members, eperson)
    }

    pub fn remove_member(&mut self, eperson: &EPersonId) -> bool {
        remove_value(&mut self.members, eperson)
    }

    pub fn add_subgroup(&mut self, group: GroupId) -> bool {
        group != self.id && push_unique(&mut self.subgroups, group)
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity for Group {
    type Id = GroupId;

    const KIND: ResourceKind = ResourceKind::Group;

    fn id(&self) -> GroupId {
        self.id
    }

    fn legacy_id(&self) -> i64 {
        self.legacy_id
    }

    fn set_legacy_id(&mut self, legacy_id: i64) {
        self.legacy_id = legacy_id;
    }

    fn sort_key(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_cannot_contain_itself() {
        let mut group = Group::new();
        let own_id = group.id;
        assert!(!group.add_subgroup(own_id));
        assert!(group.add_subgroup(GroupId::generate()));
    }
}
