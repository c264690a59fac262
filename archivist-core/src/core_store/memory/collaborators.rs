//! Collaborator services backed by the in-memory state

use super::{missing, MemoryStore};
use crate::core_authz::SystemCapability;
use crate::core_content::{
    GroupService, HarvestService, IdentifierService, SubscriptionService, VersioningService,
    WorkflowService, WorkspaceItemService,
};
use crate::core_model::{EPerson, Group};
use crate::core_store::{CollectionId, EPersonId, GroupId, ItemId, ResourceRef};
use crate::error::{Error, Result};
use tracing::debug;

impl GroupService for MemoryStore {
    fn create(&self, _capability: &SystemCapability) -> Result<Group> {
        let mut state = self.write()?;
        let legacy_id = state.next_legacy_id();
        Ok(state.groups.insert(Group::new(), legacy_id)?)
    }

    fn update(&self, group: &Group) -> Result<()> {
        Ok(self.write()?.groups.replace(group)?)
    }

    fn delete(&self, group: &GroupId) -> Result<()> {
        let mut state = self.write()?;
        state.groups.remove(group)?;
        for row in state.groups.rows.values_mut() {
            row.subgroups.retain(|g| g != group);
        }
        state.policies.retain(|p| p.group.as_ref() != Some(group));
        debug!(group_id = %group, "Deleted group");
        Ok(())
    }

    fn find(&self, group: &GroupId) -> Result<Option<Group>> {
        Ok(self.read()?.groups.get(group))
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Group>> {
        Ok(self
            .read()?
            .groups
            .rows
            .values()
            .find(|g| g.name == name)
            .cloned())
    }

    fn find_eperson(&self, eperson: &EPersonId) -> Result<Option<EPerson>> {
        Ok(self.read()?.epersons.get(eperson).cloned())
    }

    fn direct_groups_of(&self, eperson: &EPersonId) -> Result<Vec<GroupId>> {
        Ok(self
            .read()?
            .groups
            .rows
            .values()
            .filter(|g| g.members.contains(eperson))
            .map(|g| g.id)
            .collect())
    }

    fn parent_groups_of(&self, group: &GroupId) -> Result<Vec<GroupId>> {
        Ok(self
            .read()?
            .groups
            .rows
            .values()
            .filter(|g| g.subgroups.contains(group))
            .map(|g| g.id)
            .collect())
    }
}

impl IdentifierService for MemoryStore {
    fn create_handle(&self, resource: ResourceRef, explicit: Option<&str>) -> Result<String> {
        let mut state = self.write()?;
        if let Some(existing) = state.handle_of.get(&resource) {
            return Err(Error::InvalidState(format!(
                "{} is already bound to handle {}",
                resource, existing
            )));
        }
        let handle = match explicit {
            Some(requested) => {
                if state.handles.contains_key(requested) {
                    return Err(Error::DuplicateHandle(requested.to_string()));
                }
                requested.to_string()
            }
            None => loop {
                state.next_handle += 1;
                let candidate = format!("{}/{}", self.handle_prefix, state.next_handle);
                if !state.handles.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        state.handles.insert(handle.clone(), resource);
        state.handle_of.insert(resource, handle.clone());
        debug!(resource = %resource, handle = %handle, "Bound handle");
        Ok(handle)
    }

    fn unbind_handle(&self, resource: ResourceRef) -> Result<()> {
        let mut state = self.write()?;
        if let Some(handle) = state.handle_of.remove(&resource) {
            state.handles.remove(&handle);
            debug!(resource = %resource, handle = %handle, "Unbound handle");
        }
        Ok(())
    }

    fn resolve(&self, handle: &str) -> Result<Option<ResourceRef>> {
        Ok(self.read()?.handles.get(handle).copied())
    }

    fn identifiers(&self, resource: ResourceRef) -> Result<Vec<String>> {
        let state = self.read()?;
        let mut identifiers: Vec<String> = state.handle_of.get(&resource).cloned().into_iter().collect();
        if let Some(external) = state.external_identifiers.get(&resource) {
            identifiers.extend(external.iter().cloned());
        }
        Ok(identifiers)
    }

    fn delete(&self, resource: ResourceRef) -> Result<()> {
        self.write()?.external_identifiers.remove(&resource);
        Ok(())
    }
}

impl VersioningService for MemoryStore {
    fn version_of(&self, item: &ItemId) -> Result<Option<u32>> {
        Ok(self.read()?.versions.get(item).copied())
    }

    fn remove_version(&self, item: &ItemId) -> Result<()> {
        self.write()?.versions.remove(item);
        Ok(())
    }
}

impl HarvestService for MemoryStore {
    fn remove_collection_config(&self, collection: &CollectionId) -> Result<bool> {
        Ok(self.write()?.harvested_collections.remove(collection))
    }

    fn remove_item_record(&self, item: &ItemId) -> Result<bool> {
        Ok(self.write()?.harvested_items.remove(item))
    }
}

impl SubscriptionService for MemoryStore {
    fn delete_by_collection(&self, collection: &CollectionId) -> Result<usize> {
        let mut state = self.write()?;
        let before = state.subscriptions.len();
        state.subscriptions.retain(|(_, c)| c != collection);
        Ok(before - state.subscriptions.len())
    }
}

impl WorkspaceItemService for MemoryStore {
    fn find_by_collection(&self, collection: &CollectionId) -> Result<Vec<i64>> {
        Ok(self
            .read()?
            .workspace_items
            .iter()
            .filter(|(_, (c, _))| c == collection)
            .map(|(id, _)| *id)
            .collect())
    }

    fn delete_all(&self, workspace_item: i64) -> Result<()> {
        let mut state = self.write()?;
        let (_, item) = state
            .workspace_items
            .remove(&workspace_item)
            .ok_or_else(|| Error::InvalidArgument(format!("No workspace item {}", workspace_item)))?;
        if let Some(item) = item {
            state.items.remove(&item)?;
            state.policies.retain(|p| p.resource != ResourceRef::from(item));
        }
        Ok(())
    }
}

impl WorkflowService for MemoryStore {
    fn delete_collection(&self, collection: &CollectionId) -> Result<()> {
        self.write()?.workflow_tasks.remove(collection);
        Ok(())
    }

    fn delete_by_collection(&self, collection: &CollectionId) -> Result<()> {
        self.write()?.workflow_items.remove(collection);
        Ok(())
    }
}

/// Seeding and inspection of collaborator state
impl MemoryStore {
    pub fn register_identifier(&self, resource: impl Into<ResourceRef>, identifier: &str) -> Result<()> {
        self.write()?
            .external_identifiers
            .entry(resource.into())
            .or_default()
            .push(identifier.to_string());
        Ok(())
    }

    pub fn register_version(&self, item: &ItemId, version: u32) -> Result<()> {
        self.write()?.versions.insert(*item, version);
        Ok(())
    }

    pub fn mark_harvested(&self, collection: &CollectionId) -> Result<()> {
        self.write()?.harvested_collections.insert(*collection);
        Ok(())
    }

    pub fn mark_item_harvested(&self, item: &ItemId) -> Result<()> {
        self.write()?.harvested_items.insert(*item);
        Ok(())
    }

    pub fn is_harvested(&self, collection: &CollectionId) -> Result<bool> {
        Ok(self.read()?.harvested_collections.contains(collection))
    }

    pub fn subscribe(&self, eperson: &EPersonId, collection: &CollectionId) -> Result<()> {
        self.write()?.subscriptions.push((*eperson, *collection));
        Ok(())
    }

    pub fn subscription_count(&self, collection: &CollectionId) -> Result<usize> {
        Ok(self
            .read()?
            .subscriptions
            .iter()
            .filter(|(_, c)| c == collection)
            .count())
    }

    /// Open a submission against a collection, optionally backed by an item row
    pub fn start_submission(&self, collection: &CollectionId, item: Option<ItemId>) -> Result<i64> {
        let mut state = self.write()?;
        if let Some(item) = &item {
            if state.items.get(item).is_none() {
                return Err(missing::<crate::core_model::Item>(item).into());
            }
        }
        let id = state.next_legacy_id();
        state.workspace_items.insert(id, (*collection, item));
        Ok(id)
    }

    pub fn add_workflow_task(&self, collection: &CollectionId) -> Result<()> {
        *self.write()?.workflow_tasks.entry(*collection).or_default() += 1;
        Ok(())
    }

    pub fn add_workflow_item(&self, collection: &CollectionId) -> Result<()> {
        *self.write()?.workflow_items.entry(*collection).or_default() += 1;
        Ok(())
    }

    /// Reviewer tasks and items in review for the collection
    pub fn workflow_counts(&self, collection: &CollectionId) -> Result<(usize, usize)> {
        let state = self.read()?;
        Ok((
            state.workflow_tasks.get(collection).copied().unwrap_or(0),
            state.workflow_items.get(collection).copied().unwrap_or(0),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_handle_collision() {
        let store = MemoryStore::new("123456789");
        let first: ResourceRef = ItemId::generate().into();
        let second: ResourceRef = ItemId::generate().into();

        assert_eq!(store.create_handle(first, Some("123456789/99")).unwrap(), "123456789/99");
        assert!(matches!(
            store.create_handle(second, Some("123456789/99")),
            Err(Error::DuplicateHandle(_))
        ));
        assert!(matches!(store.create_handle(first, None), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_minted_handles_skip_explicit_ones() {
        let store = MemoryStore::new("hdl");
        store.create_handle(ItemId::generate().into(), Some("hdl/1")).unwrap();
        let minted = store.create_handle(ItemId::generate().into(), None).unwrap();
        assert_eq!(minted, "hdl/2");
    }

    #[test]
    fn test_identifiers_lists_handle_first() {
        let store = MemoryStore::new("hdl");
        let item = ItemId::generate();
        store.register_identifier(item, "doi:10.5555/x").unwrap();
        let handle = store.create_handle(item.into(), None).unwrap();
        assert_eq!(
            store.identifiers(item.into()).unwrap(),
            vec![handle, "doi:10.5555/x".to_string()]
        );

        IdentifierService::delete(&store, item.into()).unwrap();
        store.unbind_handle(item.into()).unwrap();
        assert!(store.identifiers(item.into()).unwrap().is_empty());
    }

    #[test]
    fn test_group_delete_drops_nesting_and_policies() {
        let store = MemoryStore::new("hdl");
        let parent = store.create_group("parent").unwrap();
        let child = store.create_group("child").unwrap();
        store.add_subgroup(&parent.id, &child.id).unwrap();

        GroupService::delete(&store, &child.id).unwrap();
        let parent = GroupService::find(&store, &parent.id).unwrap().unwrap();
        assert!(parent.subgroups.is_empty());
    }
}
