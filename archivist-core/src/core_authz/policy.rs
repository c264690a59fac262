//! Resource policy rows

use super::action::{Action, PolicyType};
use crate::core_store::{EPersonId, GroupId, PolicyId, ResourceRef};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Grant of one action on one resource to an eperson or a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    pub id: PolicyId,
    pub resource: ResourceRef,
    pub action: Action,
    pub eperson: Option<EPersonId>,
    pub group: Option<GroupId>,
    pub rp_type: Option<PolicyType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub name: Option<String>,
}

impl ResourcePolicy {
    fn blank(resource: ResourceRef, action: Action) -> Self {
        Self {
            id: PolicyId::generate(),
            resource,
            action,
            eperson: None,
            group: None,
            rp_type: None,
            start_date: None,
            end_date: None,
            name: None,
        }
    }

    pub fn for_group(resource: ResourceRef, action: Action, group: GroupId) -> Self {
        Self {
            group: Some(group),
            ..Self::blank(resource, action)
        }
    }

    pub fn for_eperson(resource: ResourceRef, action: Action, eperson: EPersonId) -> Self {
        Self {
            eperson: Some(eperson),
            ..Self::blank(resource, action)
        }
    }

    pub fn with_type(mut self, rp_type: PolicyType) -> Self {
        self.rp_type = Some(rp_type);
        self
    }

    pub fn with_window(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Whether `today` falls inside the validity window
    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.start_date.map_or(true, |start| start <= today)
            && self.end_date.map_or(true, |end| today <= end)
    }

    /// Copy of this grant attached to another resource under a fresh id
    pub fn clone_onto(&self, resource: ResourceRef) -> Self {
        Self {
            id: PolicyId::generate(),
            resource,
            ..self.clone()
        }
    }

    /// Same principal, action and dates, ignoring id, target and type
    pub fn is_same_grant(&self, other: &ResourcePolicy) -> bool {
        self.action == other.action
            && self.eperson == other.eperson
            && self.group == other.group
            && self.start_date == other.start_date
            && self.end_date == other.end_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_store::ItemId;

    #[test]
    fn test_validity_window() {
        let item: ResourceRef = ItemId::generate().into();
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let policy = ResourcePolicy::for_group(item, Action::Read, GroupId::generate())
            .with_window(Some(day(10)), Some(day(20)));

        assert!(!policy.is_active(day(9)));
        assert!(policy.is_active(day(10)));
        assert!(policy.is_active(day(20)));
        assert!(!policy.is_active(day(21)));
    }

    #[test]
    fn test_clone_onto_keeps_grant() {
        let group = GroupId::generate();
        let source = ResourcePolicy::for_group(ItemId::generate().into(), Action::Read, group)
            .with_type(PolicyType::Custom);
        let target: ResourceRef = ItemId::generate().into();
        let copy = source.clone_onto(target);

        assert_ne!(copy.id, source.id);
        assert_eq!(copy.resource, target);
        assert!(copy.is_same_grant(&source));
        assert_eq!(copy.rp_type, Some(PolicyType::Custom));
    }
}
