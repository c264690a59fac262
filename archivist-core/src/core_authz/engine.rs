//! Policy-table backed authorization engine

use super::action::{Action, PolicyType};
use super::policy::ResourcePolicy;
use super::service::{AuthorizeService, PrincipalGroups};
use crate::core_content::GroupService;
use crate::core_model::Group;
use crate::core_store::{
    BitstreamId, BundleId, CollectionId, CommunityId, ContentStore, EPersonId, GroupId,
    ItemId, PolicyId, PolicyStore, ResourceKind, ResourceRef,
};
use crate::error::{Error, Result};
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace};

/// Evaluates resource policies, group membership and container ancestry
pub struct PolicyEngine {
    policies: Arc<dyn PolicyStore>,
    content: Arc<dyn ContentStore>,
    groups: Arc<dyn GroupService>,
}

impl PolicyEngine {
    pub fn new(
        policies: Arc<dyn PolicyStore>,
        content: Arc<dyn ContentStore>,
        groups: Arc<dyn GroupService>,
    ) -> Self {
        Self {
            policies,
            content,
            groups,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn is_admin_with(&self, actor: Option<EPersonId>, groups: &PrincipalGroups) -> Result<bool> {
        if actor.is_none() {
            return Ok(false);
        }
        let admins = self.groups.find_by_name(Group::ADMINISTRATOR)?;
        Ok(admins.map_or(false, |g| groups.contains(&g.id)))
    }

    fn grants(
        policy: &ResourcePolicy,
        actor: Option<EPersonId>,
        groups: &PrincipalGroups,
        today: NaiveDate,
    ) -> bool {
        if !policy.is_active(today) {
            return false;
        }
        let by_eperson = matches!((policy.eperson, actor), (Some(p), Some(a)) if p == a);
        let by_group = policy.group.map_or(false, |g| groups.contains(&g));
        by_eperson || by_group
    }

    /// Containers a resource inherits ADMIN from
    fn parents_of(&self, resource: ResourceRef) -> Result<Vec<ResourceRef>> {
        let parents = match resource.kind {
            ResourceKind::Community => self
                .content
                .communities()
                .find(&CommunityId(resource.id))?
                .and_then(|c| c.parent)
                .map(ResourceRef::from)
                .into_iter()
                .collect(),
            ResourceKind::Collection => self
                .content
                .collections()
                .find(&CollectionId(resource.id))?
                .map(|c| c.communities.iter().map(ResourceRef::from).collect())
                .unwrap_or_default(),
            ResourceKind::Item => self
                .content
                .items()
                .find(&ItemId(resource.id))?
                .and_then(|i| i.owning_collection.or(i.template_item_of))
                .map(ResourceRef::from)
                .into_iter()
                .collect(),
            ResourceKind::Bundle => self
                .content
                .bundles()
                .find(&BundleId(resource.id))?
                .map(|b| b.items.iter().map(ResourceRef::from).collect())
                .unwrap_or_default(),
            ResourceKind::Bitstream => self
                .content
                .bitstreams()
                .find(&BitstreamId(resource.id))?
                .map(|b| b.bundles.iter().map(ResourceRef::from).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        Ok(parents)
    }

    /// ADMIN on the resource itself or anywhere up its container chain
    fn admin_in_chain(
        &self,
        actor: Option<EPersonId>,
        groups: &PrincipalGroups,
        resource: ResourceRef,
        today: NaiveDate,
    ) -> Result<bool> {
        let mut queue = VecDeque::from([resource]);
        let mut seen = HashSet::from([resource]);
        while let Some(current) = queue.pop_front() {
            let granted = self
                .policies
                .policies_for(&current)?
                .iter()
                .any(|p| p.action == Action::Admin && Self::grants(p, actor, groups, today));
            if granted {
                trace!(resource = %resource, via = %current, "ADMIN inherited");
                return Ok(true);
            }
            for parent in self.parents_of(current)? {
                if seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(false)
    }

    fn remove_where(
        &self,
        resource: ResourceRef,
        predicate: impl Fn(&ResourcePolicy) -> bool,
    ) -> Result<()> {
        let doomed: Vec<PolicyId> = self
            .policies
            .policies_for(&resource)?
            .into_iter()
            .filter(|p| predicate(p))
            .map(|p| p.id)
            .collect();
        if !doomed.is_empty() {
            let removed = self.policies.delete_policies(&doomed)?;
            debug!(resource = %resource, removed, "Removed policies");
        }
        Ok(())
    }
}

impl AuthorizeService for PolicyEngine {
    fn authorize_action_boolean(
        &self,
        actor: Option<EPersonId>,
        resource: ResourceRef,
        action: Action,
        use_inheritance: bool,
    ) -> Result<bool> {
        let groups = self.principal_groups(actor)?;
        if self.is_admin_with(actor, &groups)? {
            return Ok(true);
        }
        let today = Self::today();
        if use_inheritance && self.admin_in_chain(actor, &groups, resource, today)? {
            return Ok(true);
        }
        let allowed = self
            .policies
            .policies_for(&resource)?
            .iter()
            .any(|p| p.action == action && Self::grants(p, actor, &groups, today));
        trace!(resource = %resource, action = %action, allowed, "Authorization check");
        Ok(allowed)
    }

    fn is_admin(&self, actor: Option<EPersonId>) -> Result<bool> {
        let groups = self.principal_groups(actor)?;
        self.is_admin_with(actor, &groups)
    }

    fn principal_groups(&self, actor: Option<EPersonId>) -> Result<PrincipalGroups> {
        let mut direct = BTreeSet::new();
        if let Some(anonymous) = self.groups.find_by_name(Group::ANONYMOUS)? {
            direct.insert(anonymous.id);
        }
        if let Some(eperson) = actor {
            direct.extend(self.groups.direct_groups_of(&eperson)?);
        }

        let mut nested = BTreeSet::new();
        let mut seen = direct.clone();
        let mut queue: VecDeque<GroupId> = direct.iter().copied().collect();
        while let Some(group) = queue.pop_front() {
            for parent in self.groups.parent_groups_of(&group)? {
                if seen.insert(parent) {
                    nested.insert(parent);
                    queue.push_back(parent);
                }
            }
        }
        Ok(PrincipalGroups { direct, nested })
    }

    fn create_resource_policy(
        &self,
        resource: ResourceRef,
        group: Option<GroupId>,
        eperson: Option<EPersonId>,
        action: Action,
        rp_type: Option<PolicyType>,
    ) -> Result<ResourcePolicy> {
        let mut policy = match (group, eperson) {
            (Some(g), None) => ResourcePolicy::for_group(resource, action, g),
            (None, Some(e)) => ResourcePolicy::for_eperson(resource, action, e),
            _ => {
                return Err(Error::InvalidArgument(
                    "A policy names exactly one of a group or an eperson".to_string(),
                ))
            }
        };
        policy.rp_type = rp_type;
        self.policies.insert_policy(&policy)?;
        debug!(resource = %resource, action = %action, policy_id = %policy.id, "Created policy");
        Ok(policy)
    }

    fn add_policies(&self, policies: &[ResourcePolicy], destination: ResourceRef) -> Result<()> {
        for policy in policies {
            self.policies.insert_policy(&policy.clone_onto(destination))?;
        }
        Ok(())
    }

    fn get_policies(&self, resource: ResourceRef) -> Result<Vec<ResourcePolicy>> {
        Ok(self.policies.policies_for(&resource)?)
    }

    fn get_policies_action_filter(
        &self,
        resource: ResourceRef,
        action: Action,
    ) -> Result<Vec<ResourcePolicy>> {
        let mut policies = self.policies.policies_for(&resource)?;
        policies.retain(|p| p.action == action);
        Ok(policies)
    }

    fn remove_all_policies(&self, resource: ResourceRef) -> Result<()> {
        self.remove_where(resource, |_| true)
    }

    fn remove_all_policies_by_type(&self, resource: ResourceRef, rp_type: PolicyType) -> Result<()> {
        self.remove_where(resource, |p| p.rp_type == Some(rp_type))
    }

    fn remove_policies_by_type_and_action(
        &self,
        resource: ResourceRef,
        rp_type: PolicyType,
        action: Action,
    ) -> Result<()> {
        self.remove_where(resource, |p| p.rp_type == Some(rp_type) && p.action == action)
    }

    fn remove_all_policies_by_type_not_equal(
        &self,
        resource: ResourceRef,
        keep: PolicyType,
    ) -> Result<()> {
        self.remove_where(resource, |p| p.rp_type != Some(keep))
    }

    fn remove_group_policies(&self, resource: ResourceRef, group: GroupId) -> Result<()> {
        self.remove_where(resource, |p| p.group == Some(group))
    }

    fn is_identical_policy_in_place(
        &self,
        resource: ResourceRef,
        policy: &ResourcePolicy,
    ) -> Result<bool> {
        Ok(self
            .policies
            .policies_for(&resource)?
            .iter()
            .any(|p| p.id != policy.id && p.is_same_grant(policy)))
    }

    fn find_resources_by_eperson(
        &self,
        eperson: EPersonId,
        kind: ResourceKind,
        actions: &[Action],
    ) -> Result<BTreeSet<ResourceRef>> {
        let today = Self::today();
        Ok(self
            .policies
            .policies_for_eperson(&eperson)?
            .into_iter()
            .filter(|p| p.resource.kind == kind && actions.contains(&p.action) && p.is_active(today))
            .map(|p| p.resource)
            .collect())
    }

    fn find_resources_by_groups(
        &self,
        groups: &BTreeSet<GroupId>,
        kind: ResourceKind,
        actions: &[Action],
    ) -> Result<BTreeSet<ResourceRef>> {
        let today = Self::today();
        let mut found = BTreeSet::new();
        for group in groups {
            found.extend(
                self.policies
                    .policies_for_group(group)?
                    .into_iter()
                    .filter(|p| {
                        p.resource.kind == kind && actions.contains(&p.action) && p.is_active(today)
                    })
                    .map(|p| p.resource),
            );
        }
        Ok(found)
    }
}
