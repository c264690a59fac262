//! Authorization decision and policy maintenance contract

use super::action::{Action, PolicyType};
use super::policy::ResourcePolicy;
use crate::core_store::{EPersonId, GroupId, ResourceKind, ResourceRef};
use crate::error::{Error, Result};
use std::collections::BTreeSet;

/// Groups a principal belongs to, split by how membership was reached
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalGroups {
    /// Groups listing the eperson as a member, plus Anonymous
    pub direct: BTreeSet<GroupId>,
    /// Groups reached only through subgroup nesting
    pub nested: BTreeSet<GroupId>,
}

impl PrincipalGroups {
    pub fn all(&self) -> BTreeSet<GroupId> {
        self.direct.union(&self.nested).copied().collect()
    }

    pub fn contains(&self, group: &GroupId) -> bool {
        self.direct.contains(group) || self.nested.contains(group)
    }
}

/// Decides permissions and maintains resource policies.
///
/// `use_inheritance` controls whether an ADMIN grant on the resource or on
/// any ancestor container satisfies the check.
pub trait AuthorizeService: Send + Sync {
    fn authorize_action_boolean(
        &self,
        actor: Option<EPersonId>,
        resource: ResourceRef,
        action: Action,
        use_inheritance: bool,
    ) -> Result<bool>;

    /// Fails with [`Error::AuthorizationDenied`] when the check does not pass
    fn authorize_action(
        &self,
        actor: Option<EPersonId>,
        resource: ResourceRef,
        action: Action,
        use_inheritance: bool,
    ) -> Result<()> {
        if self.authorize_action_boolean(actor, resource, action, use_inheritance)? {
            Ok(())
        } else {
            let who = actor.map_or_else(|| "anonymous".to_string(), |a| a.to_string());
            Err(Error::denied(format!(
                "{} may not perform {} on {}",
                who, action, resource
            )))
        }
    }

    /// Member of the site Administrator group
    fn is_admin(&self, actor: Option<EPersonId>) -> Result<bool>;

    /// ADMIN on `resource` or any container above it
    fn is_admin_of(&self, actor: Option<EPersonId>, resource: ResourceRef) -> Result<bool> {
        self.authorize_action_boolean(actor, resource, Action::Admin, true)
    }

    fn principal_groups(&self, actor: Option<EPersonId>) -> Result<PrincipalGroups>;

    fn create_resource_policy(
        &self,
        resource: ResourceRef,
        group: Option<GroupId>,
        eperson: Option<EPersonId>,
        action: Action,
        rp_type: Option<PolicyType>,
    ) -> Result<ResourcePolicy>;

    fn add_policy(&self, resource: ResourceRef, action: Action, group: GroupId) -> Result<ResourcePolicy> {
        self.create_resource_policy(resource, Some(group), None, action, None)
    }

    /// Attach copies of `policies` to `destination`
    fn add_policies(&self, policies: &[ResourcePolicy], destination: ResourceRef) -> Result<()>;

    fn get_policies(&self, resource: ResourceRef) -> Result<Vec<ResourcePolicy>>;

    fn get_policies_action_filter(
        &self,
        resource: ResourceRef,
        action: Action,
    ) -> Result<Vec<ResourcePolicy>>;

    fn remove_all_policies(&self, resource: ResourceRef) -> Result<()>;

    fn remove_all_policies_by_type(&self, resource: ResourceRef, rp_type: PolicyType) -> Result<()>;

    /// Removes the policies of `rp_type` granting `action`, leaving the rest
    fn remove_policies_by_type_and_action(
        &self,
        resource: ResourceRef,
        rp_type: PolicyType,
        action: Action,
    ) -> Result<()>;

    /// Removes every policy whose type differs from `keep`, untyped ones included
    fn remove_all_policies_by_type_not_equal(
        &self,
        resource: ResourceRef,
        keep: PolicyType,
    ) -> Result<()>;

    fn remove_group_policies(&self, resource: ResourceRef, group: GroupId) -> Result<()>;

    /// An equivalent grant is already attached to `resource`
    fn is_identical_policy_in_place(
        &self,
        resource: ResourceRef,
        policy: &ResourcePolicy,
    ) -> Result<bool>;

    /// Copy every policy of `source` onto `destination`
    fn inherit_policies(&self, source: ResourceRef, destination: ResourceRef) -> Result<()> {
        let policies = self.get_policies(source)?;
        self.add_policies(&policies, destination)
    }

    /// Resources of `kind` with an active policy naming the eperson for one of `actions`
    fn find_resources_by_eperson(
        &self,
        eperson: EPersonId,
        kind: ResourceKind,
        actions: &[Action],
    ) -> Result<BTreeSet<ResourceRef>>;

    /// Resources of `kind` with an active policy naming any of `groups` for one of `actions`
    fn find_resources_by_groups(
        &self,
        groups: &BTreeSet<GroupId>,
        kind: ResourceKind,
        actions: &[Action],
    ) -> Result<BTreeSet<ResourceRef>>;
}
