//! Community lifecycle and parent-chain permissions

use super::bitstreams::{delete_bitstream, store_bitstream};
use super::cascade::{Cascade, Step};
use super::collection::CollectionManager;
use super::context::Context;
use super::services::Services;
use super::{apply_metadata, authorization_result, read_metadata};
use crate::core_authz::{Action, ResourcePolicy, RoleGuard};
use crate::core_event::{Event, EventKind};
use crate::core_model::{Collection, Community, ContentObject, Group};
use crate::core_store::{
    require, BitstreamId, CollectionId, CommunityId, GroupId, ObjectRef, Page, ResourceKind,
    Timestamp,
};
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Creates, edits, links and deletes communities
#[derive(Clone)]
pub struct CommunityManager {
    services: Arc<Services>,
}

impl CommunityManager {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    pub(crate) fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub(crate) fn collections(&self) -> CollectionManager {
        CollectionManager::new(self.services.clone())
    }

    fn guard(&self) -> RoleGuard<'_> {
        RoleGuard::new(
            self.services.authz.as_ref(),
            &self.services.config.authorization,
        )
    }

    pub fn find(&self, id: &CommunityId) -> Result<Option<Community>> {
        Ok(self.services.store.communities().find(id)?)
    }

    /// Like [`CommunityManager::find`] but a missing community is an error
    pub fn get(&self, id: &CommunityId) -> Result<Community> {
        require(self.services.store.communities(), id)
    }

    /// Accepts a UUID or a legacy integer id
    pub fn find_by_id_or_legacy_id(&self, id: &str) -> Result<Option<Community>> {
        let dao = self.services.store.communities();
        match ObjectRef::parse(id) {
            Some(ObjectRef::Uuid(uuid)) => Ok(dao.find(&CommunityId(uuid))?),
            Some(ObjectRef::Legacy(legacy)) => Ok(dao.find_by_legacy_id(legacy)?),
            None => Ok(None),
        }
    }

    pub fn find_by_legacy_id(&self, legacy_id: i64) -> Result<Option<Community>> {
        Ok(self.services.store.communities().find_by_legacy_id(legacy_id)?)
    }

    /// Every community, ordered by name
    pub fn find_all(&self, page: Page) -> Result<Vec<Community>> {
        Ok(self.services.store.communities().find_all(page)?)
    }

    pub fn find_all_top(&self) -> Result<Vec<Community>> {
        Ok(self.services.store.find_top_communities()?)
    }

    pub fn find_by_admin_group(&self, group: &GroupId) -> Result<Option<Community>> {
        Ok(self.services.store.find_community_by_admin_group(group)?)
    }

    pub fn count_total(&self) -> Result<usize> {
        Ok(self.services.store.communities().count_rows()?)
    }

    /// Create a community under `parent`, or at the top level when `None`.
    ///
    /// Top-level creation is reserved for site administrators; otherwise ADD
    /// on the parent is enough.
    pub fn create(
        &self,
        ctx: &mut Context,
        parent: Option<&CommunityId>,
        handle: Option<&str>,
    ) -> Result<Community> {
        let authz = &self.services.authz;
        let allowed = authz.is_admin(ctx.actor())?
            || match parent {
                Some(p) => authz.authorize_action_boolean(ctx.actor(), p.into(), Action::Add, true)?,
                None => false,
            };
        if !allowed {
            return Err(Error::denied("Only administrators can create communities"));
        }

        let mut parent_record = parent.map(|p| self.get(p)).transpose()?;
        let dao = self.services.store.communities();
        let mut community = dao.create(Community::new())?;
        community.handle = Some(self.services.identifiers.create_handle(community.id.into(), handle)?);

        if let Some(parent) = parent_record.as_mut() {
            parent.add_subcommunity(community.id);
            community.parent = Some(parent.id);
            dao.save(parent)?;
        }

        let anonymous = self.services.anonymous_group()?;
        authz.create_resource_policy(community.id.into(), Some(anonymous.id), None, Action::Read, None)?;
        dao.save(&community)?;

        let identifiers = self.services.identifiers_of(community.id)?;
        ctx.add_event(
            Event::new(EventKind::Create, community.id)
                .with_detail(community.handle.clone())
                .with_identifiers(identifiers.clone()),
        );
        if parent.is_none() {
            ctx.add_event(
                Event::new(EventKind::Add, self.services.site())
                    .with_object(community.id)
                    .with_detail(community.handle.clone())
                    .with_identifiers(identifiers),
            );
        }

        info!(
            community_id = %community.id,
            handle = ?community.handle,
            parent = ?parent,
            "Created community"
        );
        Ok(community)
    }

    /// Create a community directly beneath `parent`
    pub fn create_subcommunity(
        &self,
        ctx: &mut Context,
        parent: &CommunityId,
        handle: Option<&str>,
    ) -> Result<Community> {
        self.services
            .authz
            .authorize_action(ctx.actor(), parent.into(), Action::Add, true)?;
        let child = self.create(ctx, Some(parent), handle)?;
        self.add_subcommunity(ctx, parent, &child.id)?;
        self.get(&child.id)
    }

    /// Set or clear a metadata field; a blank name becomes the configured placeholder
    pub fn set_metadata(
        &self,
        ctx: &mut Context,
        id: &CommunityId,
        field: &str,
        value: Option<&str>,
    ) -> Result<()> {
        self.can_edit(ctx, id)?;
        let mut community = self.get(id)?;
        apply_metadata(
            &mut community.metadata,
            field,
            value,
            &self.services.config.content.untitled_name,
        )?;
        self.services.store.communities().save(&community)?;
        debug!(community_id = %id, field, actor = ?ctx.actor(), "Set community metadata");
        Ok(())
    }

    /// First value of a field, by legacy short name or dotted name
    pub fn get_metadata(&self, community: &Community, field: &str) -> Result<Option<String>> {
        read_metadata(&community.metadata, field)
    }

    /// Persist pending changes and report them
    pub fn update(&self, ctx: &mut Context, id: &CommunityId) -> Result<()> {
        self.can_edit(ctx, id)?;
        let mut community = self.get(id)?;
        info!(community_id = %id, "Updating community");

        let modified = community.modified;
        let metadata_details = community
            .metadata
            .is_modified()
            .then(|| community.metadata.details());
        community.modified = false;
        community.metadata.clear_modified();
        if modified || metadata_details.is_some() {
            community.last_modified = Timestamp::now();
        }
        self.services.store.communities().save(&community)?;

        if modified {
            ctx.add_event(Event::new(EventKind::Modify, community.id));
        }
        if let Some(details) = metadata_details {
            ctx.add_event(Event::new(EventKind::ModifyMetadata, community.id).with_detail(details));
        }
        Ok(())
    }

    /// Replace the logo; `None` removes it.
    ///
    /// Removing needs either DELETE on the community or edit rights; setting
    /// always needs edit rights. The new logo copies the community's READ policies.
    pub fn set_logo(
        &self,
        ctx: &mut Context,
        id: &CommunityId,
        data: Option<&[u8]>,
    ) -> Result<Option<BitstreamId>> {
        let removing_with_delete = data.is_none()
            && self
                .services
                .authz
                .authorize_action_boolean(ctx.actor(), id.into(), Action::Delete, true)?;
        if !removing_with_delete {
            self.can_edit(ctx, id)?;
        }

        let mut community = self.get(id)?;
        if let Some(old) = community.logo.take() {
            info!(community_id = %id, logo_id = %old, "Removing community logo");
            delete_bitstream(&self.services, &old)?;
        }
        if let Some(bytes) = data {
            let logo = store_bitstream(&self.services, "logo", bytes)?;
            let read = self
                .services
                .authz
                .get_policies_action_filter(id.into(), Action::Read)?;
            self.services.authz.add_policies(&read, logo.id.into())?;
            community.logo = Some(logo.id);
        }
        community.modified = true;
        self.services.store.communities().save(&community)?;
        Ok(community.logo)
    }

    /// Create the admin group if missing and grant it ADMIN on the community
    pub fn create_administrators(&self, ctx: &mut Context, id: &CommunityId) -> Result<Group> {
        let mut community = self.get(id)?;
        self.guard().manage_community_admin_group(ctx.actor(), &community)?;

        let admins = match community.admins {
            Some(group) => self
                .services
                .groups
                .find(&group)?
                .ok_or_else(|| Error::not_found(ResourceKind::Group, group))?,
            None => {
                let group = self
                    .services
                    .create_named_group(&format!("COMMUNITY_{}_ADMIN", community.id))?;
                community.admins = Some(group.id);
                self.services.store.communities().save(&community)?;
                group
            }
        };

        let grant = ResourcePolicy::for_group(id.into(), Action::Admin, admins.id);
        if !self.services.authz.is_identical_policy_in_place(id.into(), &grant)? {
            self.services.authz.add_policy(id.into(), Action::Admin, admins.id)?;
        }
        info!(community_id = %id, group = %admins.name, "Community administrators ready");
        Ok(admins)
    }

    /// Drop the admin group, its policies on the community and the group itself
    pub fn remove_administrators(&self, ctx: &mut Context, id: &CommunityId) -> Result<()> {
        let mut community = self.get(id)?;
        self.guard().remove_community_admin_group(ctx.actor(), &community)?;

        let Some(group) = community.admins.take() else {
            return Ok(());
        };
        self.services.authz.remove_group_policies(id.into(), group)?;
        self.services.store.communities().save(&community)?;
        self.services.groups.delete(&group)?;
        info!(community_id = %id, group_id = %group, "Removed community administrators");
        Ok(())
    }

    /// Ancestors from the immediate parent up to the top-level community
    pub fn get_all_parents(&self, id: &CommunityId) -> Result<Vec<Community>> {
        let mut parents = Vec::new();
        let mut seen = vec![*id];
        let mut next = self.get(id)?.parent;
        while let Some(parent_id) = next {
            if seen.contains(&parent_id) {
                return Err(Error::InvalidState(format!(
                    "community {} has a cyclic parent chain",
                    id
                )));
            }
            seen.push(parent_id);
            let parent = self.get(&parent_id)?;
            next = parent.parent;
            parents.push(parent);
        }
        Ok(parents)
    }

    /// Collections of this community and of every descendant, deepest first
    pub fn get_all_collections(&self, id: &CommunityId) -> Result<Vec<Collection>> {
        let mut found = Vec::new();
        self.collect_collections(id, &mut found)?;
        Ok(found)
    }

    fn collect_collections(&self, id: &CommunityId, found: &mut Vec<Collection>) -> Result<()> {
        let community = self.get(id)?;
        for sub in &community.subcommunities {
            self.collect_collections(sub, found)?;
        }
        for collection in &community.collections {
            if !found.iter().any(|c| &c.id == collection) {
                found.push(require(self.services.store.collections(), collection)?);
            }
        }
        Ok(())
    }

    /// The parent community, `None` for top-level ones
    pub fn get_parent_object(&self, id: &CommunityId) -> Result<Option<CommunityId>> {
        Ok(self.get(id)?.parent)
    }

    /// Link an existing collection; both sides are updated
    pub fn add_collection(
        &self,
        ctx: &mut Context,
        id: &CommunityId,
        collection_id: &CollectionId,
    ) -> Result<()> {
        self.services
            .authz
            .authorize_action(ctx.actor(), id.into(), Action::Add, true)?;
        let mut community = self.get(id)?;
        let mut collection = require(self.services.store.collections(), collection_id)?;
        info!(community_id = %id, collection_id = %collection_id, "Adding collection to community");

        if community.add_collection(*collection_id) {
            self.services.store.communities().save(&community)?;
        }
        if collection.add_community(*id) {
            self.services.store.collections().save(&collection)?;
        }
        ctx.add_event(
            Event::new(EventKind::Add, *id)
                .with_object(*collection_id)
                .with_detail(collection.handle.clone())
                .with_identifiers(self.services.identifiers_of(*id)?),
        );
        Ok(())
    }

    /// Link an existing community as a child of `id`
    pub fn add_subcommunity(
        &self,
        ctx: &mut Context,
        id: &CommunityId,
        child_id: &CommunityId,
    ) -> Result<()> {
        self.services
            .authz
            .authorize_action(ctx.actor(), id.into(), Action::Add, true)?;
        if id == child_id {
            return Err(Error::InvalidArgument(
                "a community cannot contain itself".to_string(),
            ));
        }
        if self.get_all_parents(id)?.iter().any(|p| &p.id == child_id) {
            return Err(Error::InvalidState(format!(
                "community {} is an ancestor of {}",
                child_id, id
            )));
        }
        let mut parent = self.get(id)?;
        let mut child = self.get(child_id)?;
        match child.parent {
            Some(existing) if &existing != id => {
                return Err(Error::InvalidState(format!(
                    "community {} already belongs to {}",
                    child_id, existing
                )))
            }
            _ => {}
        }
        info!(community_id = %id, child_id = %child_id, "Adding subcommunity");

        if parent.add_subcommunity(*child_id) {
            self.services.store.communities().save(&parent)?;
        }
        if child.parent != Some(*id) {
            child.parent = Some(*id);
            self.services.store.communities().save(&child)?;
        }
        ctx.add_event(
            Event::new(EventKind::Add, *id)
                .with_object(*child_id)
                .with_detail(child.handle.clone())
                .with_identifiers(self.services.identifiers_of(*id)?),
        );
        Ok(())
    }

    /// Unlink a collection, deleting it when this was its only community
    pub fn remove_collection(
        &self,
        ctx: &mut Context,
        id: &CommunityId,
        collection_id: &CollectionId,
    ) -> Result<()> {
        Cascade::new(
            self,
            Step::RemoveCollection {
                community: *id,
                collection: *collection_id,
            },
        )
        .run(ctx)
    }

    /// Unlink a child community and delete it with everything beneath it
    pub fn remove_subcommunity(
        &self,
        ctx: &mut Context,
        id: &CommunityId,
        child_id: &CommunityId,
    ) -> Result<()> {
        Cascade::new(
            self,
            Step::Detach {
                parent: *id,
                child: *child_id,
            },
        )
        .run(ctx)
    }

    /// Delete the community and its whole subtree.
    ///
    /// REMOVE on the parent suffices; otherwise DELETE on the community is required.
    pub fn delete(&self, ctx: &mut Context, id: &CommunityId) -> Result<()> {
        Cascade::new(self, Step::Delete(*id)).run(ctx)
    }

    /// WRITE or ADD on any ancestor, else WRITE on the community itself
    pub fn can_edit(&self, ctx: &Context, id: &CommunityId) -> Result<()> {
        let authz = &self.services.authz;
        for parent in self.get_all_parents(id)? {
            if authz.authorize_action_boolean(ctx.actor(), parent.id.into(), Action::Write, true)?
                || authz.authorize_action_boolean(ctx.actor(), parent.id.into(), Action::Add, true)?
            {
                return Ok(());
            }
        }
        authz.authorize_action(ctx.actor(), id.into(), Action::Write, true)
    }

    pub fn can_edit_boolean(&self, ctx: &Context, id: &CommunityId) -> Result<bool> {
        authorization_result(self.can_edit(ctx, id))
    }

    /// Communities the actor holds a direct grant on for any of `actions`
    pub fn find_authorized(&self, ctx: &Context, actions: &[Action]) -> Result<Vec<Community>> {
        let Some(actor) = ctx.actor() else {
            return Ok(Vec::new());
        };
        let refs = self
            .services
            .authz
            .find_resources_by_eperson(actor, ResourceKind::Community, actions)?;
        self.load_sorted(refs.into_iter().map(|r| CommunityId(r.id)))
    }

    /// Communities any of the actor's groups holds a grant on for any of `actions`
    pub fn find_authorized_group_mapped(
        &self,
        ctx: &Context,
        actions: &[Action],
    ) -> Result<Vec<Community>> {
        let groups = self.services.authz.principal_groups(ctx.actor())?.all();
        let refs = self
            .services
            .authz
            .find_resources_by_groups(&groups, ResourceKind::Community, actions)?;
        self.load_sorted(refs.into_iter().map(|r| CommunityId(r.id)))
    }

    fn load_sorted(&self, ids: impl Iterator<Item = CommunityId>) -> Result<Vec<Community>> {
        let mut communities = Vec::new();
        for id in ids {
            if let Some(community) = self.find(&id)? {
                communities.push(community);
            }
        }
        communities.sort_by_cached_key(|c| (c.name().to_string(), c.legacy_id));
        Ok(communities)
    }

    /// Touch the community and report the change
    pub fn update_last_modified(&self, ctx: &mut Context, id: &CommunityId) -> Result<()> {
        let mut community = self.get(id)?;
        community.last_modified = Timestamp::now();
        self.services.store.communities().save(&community)?;
        ctx.add_event(Event::new(EventKind::Modify, *id));
        Ok(())
    }
}
