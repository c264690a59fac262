//! In-memory reference store
//!
//! One [`MemoryStore`] backs every persistence contract and collaborator.
//! Transactions snapshot the whole state on begin and restore it on
//! rollback, so a failed request leaves no partial writes behind.

mod collaborators;

use super::dao::{ContentStore, Dao, Entity, ItemFilter, PolicyStore, TransactionManager};
use super::error::{StoreError, StoreResult};
use super::types::{
    CollectionId, EPersonId, GroupId, ItemId, Page, PolicyId, ResourceRef, SiteId,
};
use crate::core_authz::ResourcePolicy;
use crate::core_model::{Bitstream, Bundle, Collection, Community, EPerson, Group, Item};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

#[derive(Clone)]
struct Table<T: Entity> {
    rows: HashMap<T::Id, T>,
}

impl<T: Entity> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }
}

impl<T: Entity> Table<T> {
    fn insert(&mut self, mut entity: T, legacy_id: i64) -> StoreResult<T> {
        let id = entity.id();
        if self.rows.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("{} {}", T::KIND, id)));
        }
        entity.set_legacy_id(legacy_id);
        self.rows.insert(id, entity.clone());
        Ok(entity)
    }

    fn get(&self, id: &T::Id) -> Option<T> {
        self.rows.get(id).cloned()
    }

    fn by_legacy(&self, legacy_id: i64) -> Option<T> {
        self.rows
            .values()
            .find(|row| row.legacy_id() == legacy_id)
            .cloned()
    }

    fn sorted(&self) -> Vec<T> {
        let mut rows: Vec<T> = self.rows.values().cloned().collect();
        rows.sort_by_cached_key(|row| (row.sort_key(), row.legacy_id()));
        rows
    }

    fn replace(&mut self, entity: &T) -> StoreResult<()> {
        match self.rows.get_mut(&entity.id()) {
            Some(row) => {
                *row = entity.clone();
                Ok(())
            }
            None => Err(missing::<T>(&entity.id())),
        }
    }

    fn remove(&mut self, id: &T::Id) -> StoreResult<T> {
        self.rows.remove(id).ok_or_else(|| missing::<T>(id))
    }
}

fn missing<T: Entity>(id: &T::Id) -> StoreError {
    StoreError::Missing {
        kind: T::KIND,
        id: id.to_string(),
    }
}

#[derive(Clone, Default)]
struct State {
    communities: Table<Community>,
    collections: Table<Collection>,
    items: Table<Item>,
    bundles: Table<Bundle>,
    bitstreams: Table<Bitstream>,
    groups: Table<Group>,
    epersons: HashMap<EPersonId, EPerson>,
    policies: Vec<ResourcePolicy>,
    handles: HashMap<String, ResourceRef>,
    handle_of: HashMap<ResourceRef, String>,
    external_identifiers: HashMap<ResourceRef, Vec<String>>,
    versions: HashMap<ItemId, u32>,
    harvested_collections: HashSet<CollectionId>,
    harvested_items: HashSet<ItemId>,
    subscriptions: Vec<(EPersonId, CollectionId)>,
    workspace_items: BTreeMap<i64, (CollectionId, Option<ItemId>)>,
    workflow_tasks: HashMap<CollectionId, usize>,
    workflow_items: HashMap<CollectionId, usize>,
    next_handle: u64,
    next_legacy_id: i64,
}

impl State {
    fn next_legacy_id(&mut self) -> i64 {
        self.next_legacy_id += 1;
        self.next_legacy_id
    }
}

/// Single-process store for tests, demos and embedding
pub struct MemoryStore {
    state: RwLock<State>,
    snapshot: Mutex<Option<State>>,
    site: SiteId,
    handle_prefix: String,
}

impl MemoryStore {
    /// Empty repository seeded with the Anonymous and Administrator groups
    pub fn new(handle_prefix: &str) -> Self {
        let mut state = State::default();
        for name in [Group::ANONYMOUS, Group::ADMINISTRATOR] {
            let mut group = Group::new();
            group.name = name.to_string();
            let legacy_id = state.next_legacy_id();
            // A fresh id cannot collide with an empty table
            if let Err(e) = state.groups.insert(group, legacy_id) {
                warn!(error = %e, "Failed to seed group {}", name);
            }
        }
        Self {
            state: RwLock::new(state),
            snapshot: Mutex::new(None),
            site: SiteId::generate(),
            handle_prefix: handle_prefix.to_string(),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }

    pub fn register_eperson(&self, email: &str, full_name: &str) -> StoreResult<EPerson> {
        let eperson = EPerson::new(email, full_name);
        self.write()?.epersons.insert(eperson.id, eperson.clone());
        Ok(eperson)
    }

    /// Seed a named group outside of any request
    pub fn create_group(&self, name: &str) -> StoreResult<Group> {
        let mut group = Group::new();
        group.name = name.to_string();
        let mut state = self.write()?;
        let legacy_id = state.next_legacy_id();
        state.groups.insert(group, legacy_id)
    }

    pub fn add_member(&self, group: &GroupId, eperson: &EPersonId) -> StoreResult<()> {
        let mut state = self.write()?;
        let mut row = state.groups.get(group).ok_or_else(|| missing::<Group>(group))?;
        row.add_member(*eperson);
        state.groups.replace(&row)
    }

    pub fn add_subgroup(&self, parent: &GroupId, child: &GroupId) -> StoreResult<()> {
        let mut state = self.write()?;
        let mut row = state.groups.get(parent).ok_or_else(|| missing::<Group>(parent))?;
        row.add_subgroup(*child);
        state.groups.replace(&row)
    }

    pub fn handle_of(&self, resource: impl Into<ResourceRef>) -> StoreResult<Option<String>> {
        Ok(self.read()?.handle_of.get(&resource.into()).cloned())
    }

    pub fn policy_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.policies.len())
    }

    pub fn group_exists(&self, group: &GroupId) -> StoreResult<bool> {
        Ok(self.read()?.groups.get(group).is_some())
    }
}

macro_rules! memory_dao {
    ($entity:ty, $table:ident) => {
        impl Dao<$entity> for MemoryStore {
            fn create(&self, entity: $entity) -> StoreResult<$entity> {
                let mut state = self.write()?;
                let legacy_id = state.next_legacy_id();
                state.$table.insert(entity, legacy_id)
            }

            fn find(&self, id: &<$entity as Entity>::Id) -> StoreResult<Option<$entity>> {
                Ok(self.read()?.$table.get(id))
            }

            fn find_by_legacy_id(&self, legacy_id: i64) -> StoreResult<Option<$entity>> {
                Ok(self.read()?.$table.by_legacy(legacy_id))
            }

            fn find_all(&self, page: Page) -> StoreResult<Vec<$entity>> {
                Ok(page.apply(self.read()?.$table.sorted()))
            }

            fn save(&self, entity: &$entity) -> StoreResult<()> {
                self.write()?.$table.replace(entity)
            }

            fn delete(&self, id: &<$entity as Entity>::Id) -> StoreResult<()> {
                self.write()?.$table.remove(id).map(|_| ())
            }

            fn count_rows(&self) -> StoreResult<usize> {
                Ok(self.read()?.$table.rows.len())
            }
        }
    };
}

memory_dao!(Community, communities);
memory_dao!(Collection, collections);
memory_dao!(Item, items);
memory_dao!(Bundle, bundles);
memory_dao!(Bitstream, bitstreams);

impl ContentStore for MemoryStore {
    fn communities(&self) -> &dyn Dao<Community> {
        self
    }

    fn collections(&self) -> &dyn Dao<Collection> {
        self
    }

    fn items(&self) -> &dyn Dao<Item> {
        self
    }

    fn bundles(&self) -> &dyn Dao<Bundle> {
        self
    }

    fn bitstreams(&self) -> &dyn Dao<Bitstream> {
        self
    }

    fn site(&self) -> SiteId {
        self.site
    }

    fn find_top_communities(&self) -> StoreResult<Vec<Community>> {
        let mut top = self.read()?.communities.sorted();
        top.retain(Community::is_top_level);
        Ok(top)
    }

    fn find_community_by_admin_group(&self, group: &GroupId) -> StoreResult<Option<Community>> {
        Ok(self
            .read()?
            .communities
            .sorted()
            .into_iter()
            .find(|c| c.admins.as_ref() == Some(group)))
    }

    fn find_collection_by_group(&self, group: &GroupId) -> StoreResult<Option<Collection>> {
        Ok(self
            .read()?
            .collections
            .sorted()
            .into_iter()
            .find(|c| c.uses_group(group)))
    }

    fn find_items(&self, filter: &ItemFilter, page: Page) -> StoreResult<Vec<Item>> {
        let state = self.read()?;
        let mut items: Vec<Item> = state
            .items
            .rows
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        items.sort_by_key(|item| item.legacy_id);
        Ok(page.apply(items))
    }

    fn count_items(&self, filter: &ItemFilter) -> StoreResult<usize> {
        Ok(self
            .read()?
            .items
            .rows
            .values()
            .filter(|item| filter.matches(item))
            .count())
    }
}

impl PolicyStore for MemoryStore {
    fn insert_policy(&self, policy: &ResourcePolicy) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.policies.iter().any(|p| p.id == policy.id) {
            return Err(StoreError::Duplicate(format!("policy {}", policy.id)));
        }
        state.policies.push(policy.clone());
        Ok(())
    }

    fn policies_for(&self, resource: &ResourceRef) -> StoreResult<Vec<ResourcePolicy>> {
        Ok(self
            .read()?
            .policies
            .iter()
            .filter(|p| &p.resource == resource)
            .cloned()
            .collect())
    }

    fn policies_for_group(&self, group: &GroupId) -> StoreResult<Vec<ResourcePolicy>> {
        Ok(self
            .read()?
            .policies
            .iter()
            .filter(|p| p.group.as_ref() == Some(group))
            .cloned()
            .collect())
    }

    fn policies_for_eperson(&self, eperson: &EPersonId) -> StoreResult<Vec<ResourcePolicy>> {
        Ok(self
            .read()?
            .policies
            .iter()
            .filter(|p| p.eperson.as_ref() == Some(eperson))
            .cloned()
            .collect())
    }

    fn delete_policies(&self, ids: &[PolicyId]) -> StoreResult<usize> {
        let mut state = self.write()?;
        let before = state.policies.len();
        state.policies.retain(|p| !ids.contains(&p.id));
        Ok(before - state.policies.len())
    }
}

impl TransactionManager for MemoryStore {
    fn begin(&self) -> StoreResult<()> {
        let mut snapshot = self.snapshot.lock().map_err(|_| StoreError::Poisoned)?;
        if snapshot.is_some() {
            return Err(StoreError::Transaction(
                "a transaction is already open on this store".to_string(),
            ));
        }
        *snapshot = Some(self.read()?.clone());
        debug!("Transaction started");
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut snapshot = self.snapshot.lock().map_err(|_| StoreError::Poisoned)?;
        match snapshot.take() {
            Some(_) => {
                debug!("Transaction committed");
                Ok(())
            }
            None => Err(StoreError::Transaction("no open transaction to commit".to_string())),
        }
    }

    fn rollback(&self) -> StoreResult<()> {
        let mut snapshot = self.snapshot.lock().map_err(|_| StoreError::Poisoned)?;
        match snapshot.take() {
            Some(saved) => {
                *self.write()? = saved;
                debug!("Transaction rolled back");
                Ok(())
            }
            None => Err(StoreError::Transaction("no open transaction to roll back".to_string())),
        }
    }
}
