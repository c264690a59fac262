//! Collaborator contracts and the bundle of services the managers share

use crate::config::Config;
use crate::core_authz::{AuthorizeService, PolicyEngine, SystemCapability};
use crate::core_event::EventLog;
use crate::core_model::{EPerson, Group};
use crate::core_store::memory::MemoryStore;
use crate::core_store::{
    CollectionId, ContentStore, EPersonId, GroupId, ItemId, ResourceKind, ResourceRef, SiteId,
    TransactionManager,
};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Group and eperson directory
pub trait GroupService: Send + Sync {
    /// New, unnamed group; restricted to system-privileged callers
    fn create(&self, capability: &SystemCapability) -> Result<Group>;

    fn set_name(&self, group: &mut Group, name: &str) -> Result<()> {
        group.name = name.to_string();
        Ok(())
    }

    fn update(&self, group: &Group) -> Result<()>;

    /// Also drops the group's policies and its nesting in other groups
    fn delete(&self, group: &GroupId) -> Result<()>;

    fn find(&self, group: &GroupId) -> Result<Option<Group>>;

    fn find_by_name(&self, name: &str) -> Result<Option<Group>>;

    fn find_eperson(&self, eperson: &EPersonId) -> Result<Option<EPerson>>;

    /// Groups listing the eperson as a direct member
    fn direct_groups_of(&self, eperson: &EPersonId) -> Result<Vec<GroupId>>;

    /// Groups containing `group` as a subgroup
    fn parent_groups_of(&self, group: &GroupId) -> Result<Vec<GroupId>>;
}

/// Persistent identifier (handle) registry
pub trait IdentifierService: Send + Sync {
    /// Bind a handle, minting one unless `explicit` is given
    fn create_handle(&self, resource: ResourceRef, explicit: Option<&str>) -> Result<String>;

    fn unbind_handle(&self, resource: ResourceRef) -> Result<()>;

    fn resolve(&self, handle: &str) -> Result<Option<ResourceRef>>;

    /// Every identifier bound to the resource, handle first
    fn identifiers(&self, resource: ResourceRef) -> Result<Vec<String>>;

    /// Drop every non-handle identifier of the resource
    fn delete(&self, resource: ResourceRef) -> Result<()>;
}

pub trait VersioningService: Send + Sync {
    fn version_of(&self, item: &ItemId) -> Result<Option<u32>>;

    fn remove_version(&self, item: &ItemId) -> Result<()>;
}

/// Harvesting (remote metadata import) configuration
pub trait HarvestService: Send + Sync {
    /// Returns whether a configuration was present
    fn remove_collection_config(&self, collection: &CollectionId) -> Result<bool>;

    /// Returns whether a harvest record was present
    fn remove_item_record(&self, item: &ItemId) -> Result<bool>;
}

pub trait SubscriptionService: Send + Sync {
    /// Returns the number of subscriptions removed
    fn delete_by_collection(&self, collection: &CollectionId) -> Result<usize>;
}

/// In-progress submissions
pub trait WorkspaceItemService: Send + Sync {
    fn find_by_collection(&self, collection: &CollectionId) -> Result<Vec<i64>>;

    /// Delete the submission together with its item
    fn delete_all(&self, workspace_item: i64) -> Result<()>;
}

pub trait WorkflowService: Send + Sync {
    /// Drop reviewer tasks configured for the collection
    fn delete_collection(&self, collection: &CollectionId) -> Result<()>;

    /// Drop items currently in review for the collection
    fn delete_by_collection(&self, collection: &CollectionId) -> Result<()>;
}

/// Everything a manager needs, shared behind one `Arc`
pub struct Services {
    pub config: Arc<Config>,
    pub store: Arc<dyn ContentStore>,
    pub authz: Arc<dyn AuthorizeService>,
    pub groups: Arc<dyn GroupService>,
    pub identifiers: Arc<dyn IdentifierService>,
    pub versioning: Arc<dyn VersioningService>,
    pub workflow: Arc<dyn WorkflowService>,
    pub workspace: Arc<dyn WorkspaceItemService>,
    pub harvest: Arc<dyn HarvestService>,
    pub subscriptions: Arc<dyn SubscriptionService>,
    pub events: Arc<dyn EventLog>,
    pub transactions: Arc<dyn TransactionManager>,
}

impl Services {
    /// Wire every collaborator to a single in-memory store
    pub fn in_memory(config: Config, store: Arc<MemoryStore>, events: Arc<dyn EventLog>) -> Self {
        let authz = Arc::new(PolicyEngine::new(store.clone(), store.clone(), store.clone()));
        Self {
            config: Arc::new(config),
            store: store.clone(),
            authz,
            groups: store.clone(),
            identifiers: store.clone(),
            versioning: store.clone(),
            workflow: store.clone(),
            workspace: store.clone(),
            harvest: store.clone(),
            subscriptions: store.clone(),
            events,
            transactions: store,
        }
    }

    pub fn site(&self) -> SiteId {
        self.store.site()
    }

    pub fn anonymous_group(&self) -> Result<Group> {
        self.groups
            .find_by_name(Group::ANONYMOUS)?
            .ok_or_else(|| Error::not_found(ResourceKind::Group, Group::ANONYMOUS))
    }

    pub fn identifiers_of(&self, resource: impl Into<ResourceRef>) -> Result<Vec<String>> {
        self.identifiers.identifiers(resource.into())
    }

    /// Unnamed group minted under system privileges, then named
    pub(crate) fn create_named_group(&self, name: &str) -> Result<Group> {
        let mut group = SystemCapability::scope(|capability| self.groups.create(capability))?;
        self.groups.set_name(&mut group, name)?;
        self.groups.update(&group)?;
        Ok(group)
    }
}
