//! Seeded repositories and content builders

use crate::config::Config;
use crate::core_content::{Context, GroupService, Repository};
use crate::core_event::{Event, EventKind, MemoryEventLog};
use crate::core_model::{Collection, Community, Group, Item};
use crate::core_store::memory::MemoryStore;
use crate::core_store::{CollectionId, CommunityId, EPersonId, GroupId, ResourceKind};
use crate::error::Result;
use std::sync::Arc;

/// In-memory repository with a site administrator and an ordinary user
pub struct TestRepository {
    pub repo: Repository,
    pub store: Arc<MemoryStore>,
    pub events: Arc<MemoryEventLog>,
    pub admin: EPersonId,
    pub user: EPersonId,
}

impl TestRepository {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let events = Arc::new(MemoryEventLog::new());
        let (repo, store) = Repository::in_memory(config, events.clone());

        let admin = store
            .register_eperson("admin@example.com", "Site Admin")
            .expect("register admin");
        let administrators = store
            .find_by_name(Group::ADMINISTRATOR)
            .expect("lookup administrators")
            .expect("administrator group is seeded");
        store
            .add_member(&administrators.id, &admin.id)
            .expect("add admin to administrators");
        let user = store
            .register_eperson("user@example.com", "Ordinary User")
            .expect("register user");

        Self {
            repo,
            store,
            events,
            admin: admin.id,
            user: user.id,
        }
    }

    /// Register another eperson
    pub fn register(&self, email: &str, full_name: &str) -> EPersonId {
        self.store
            .register_eperson(email, full_name)
            .expect("register eperson")
            .id
    }

    /// Group with the given members, created outside any request
    pub fn group_with(&self, name: &str, members: &[EPersonId]) -> GroupId {
        let group = self.store.create_group(name).expect("create group");
        for member in members {
            self.store.add_member(&group.id, member).expect("add member");
        }
        group.id
    }

    pub fn run_as<T>(
        &self,
        actor: Option<EPersonId>,
        f: impl FnOnce(&mut Context) -> Result<T>,
    ) -> Result<T> {
        self.repo.transaction(actor, f)
    }

    /// Run as the site administrator; panics on error
    pub fn as_admin<T>(&self, f: impl FnOnce(&mut Context) -> Result<T>) -> T {
        self.run_as(Some(self.admin), f).expect("admin transaction")
    }

    pub fn as_user<T>(&self, f: impl FnOnce(&mut Context) -> Result<T>) -> Result<T> {
        self.run_as(Some(self.user), f)
    }

    /// Named top-level community
    pub fn seed_community(&self, name: &str) -> Community {
        self.seed_community_under(None, name)
    }

    pub fn seed_community_under(&self, parent: Option<&CommunityId>, name: &str) -> Community {
        let communities = self.repo.communities();
        self.as_admin(|ctx| {
            let community = communities.create(ctx, parent, None)?;
            communities.set_metadata(ctx, &community.id, "name", Some(name))?;
            communities.update(ctx, &community.id)?;
            communities.get(&community.id)
        })
    }

    pub fn seed_collection(&self, community: &CommunityId, name: &str) -> Collection {
        let collections = self.repo.collections();
        self.as_admin(|ctx| {
            let collection = collections.create(ctx, Some(community), None)?;
            collections.set_metadata(ctx, &collection.id, "name", Some(name))?;
            collections.update(ctx, &collection.id)?;
            collections.get(&collection.id)
        })
    }

    /// Archived item owned by `collection`
    pub fn install_item(&self, collection: &CollectionId, title: &str) -> Item {
        let items = self.repo.items();
        self.as_admin(|ctx| {
            let item = items.create(ctx)?;
            items.set_metadata(ctx, &item.id, "dc.title", Some(title))?;
            items.install(ctx, &item.id, collection)
        })
    }

    /// Committed events, oldest first
    pub fn committed(&self) -> Vec<Event> {
        self.events.events()
    }

    /// `(kind, subject kind)` of every committed event
    pub fn event_shapes(&self) -> Vec<(EventKind, ResourceKind)> {
        self.committed()
            .iter()
            .map(|e| (e.kind(), e.subject().kind))
            .collect()
    }
}

impl Default for TestRepository {
    fn default() -> Self {
        Self::new()
    }
}
