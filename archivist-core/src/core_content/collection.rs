//! Collection lifecycle, role groups and permission listings

use super::bitstreams::{delete_bitstream, store_bitstream};
use super::community::CommunityManager;
use super::context::Context;
use super::item::ItemManager;
use super::services::Services;
use super::{apply_metadata, authorization_result, read_metadata};
use crate::core_authz::{Action, Authority, ResourcePolicy, RoleGuard, SystemCapability};
use crate::core_event::{Event, EventKind};
use crate::core_model::{Collection, ContentObject, Group, MetadataField, WorkflowStep};
use crate::core_store::{
    require, BitstreamId, CollectionId, CommunityId, GroupId, ItemId, ObjectRef, Page,
    ResourceKind, ResourceRef, Timestamp,
};
use crate::error::{Error, Result};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct CollectionManager {
    services: Arc<Services>,
}

impl CollectionManager {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    fn communities(&self) -> CommunityManager {
        CommunityManager::new(self.services.clone())
    }

    fn items(&self) -> ItemManager {
        ItemManager::new(self.services.clone())
    }

    fn guard(&self) -> RoleGuard<'_> {
        RoleGuard::new(
            self.services.authz.as_ref(),
            &self.services.config.authorization,
        )
    }

    fn save(&self, collection: &Collection) -> Result<()> {
        Ok(self.services.store.collections().save(collection)?)
    }

    pub fn find(&self, id: &CollectionId) -> Result<Option<Collection>> {
        Ok(self.services.store.collections().find(id)?)
    }

    pub fn get(&self, id: &CollectionId) -> Result<Collection> {
        require(self.services.store.collections(), id)
    }

    pub fn find_by_id_or_legacy_id(&self, id: &str) -> Result<Option<Collection>> {
        let dao = self.services.store.collections();
        match ObjectRef::parse(id) {
            Some(ObjectRef::Uuid(uuid)) => Ok(dao.find(&CollectionId(uuid))?),
            Some(ObjectRef::Legacy(legacy)) => Ok(dao.find_by_legacy_id(legacy)?),
            None => Ok(None),
        }
    }

    pub fn find_by_legacy_id(&self, legacy_id: i64) -> Result<Option<Collection>> {
        Ok(self.services.store.collections().find_by_legacy_id(legacy_id)?)
    }

    /// Every collection, ordered by name
    pub fn find_all(&self, page: Page) -> Result<Vec<Collection>> {
        Ok(self.services.store.collections().find_all(page)?)
    }

    /// Collection holding the group in any role
    pub fn find_by_group(&self, group: &GroupId) -> Result<Option<Collection>> {
        Ok(self.services.store.find_collection_by_group(group)?)
    }

    pub fn count_total(&self) -> Result<usize> {
        Ok(self.services.store.collections().count_rows()?)
    }

    /// Create a collection inside `community`.
    ///
    /// Requires ADD on the community. Anonymous READ plus default item and
    /// bitstream READ policies are attached.
    pub fn create(
        &self,
        ctx: &mut Context,
        community: Option<&CommunityId>,
        handle: Option<&str>,
    ) -> Result<Collection> {
        let community = community.ok_or_else(|| {
            Error::InvalidArgument("Community cannot be null when creating a new collection".to_string())
        })?;
        self.services
            .authz
            .authorize_action(ctx.actor(), community.into(), Action::Add, true)?;

        let mut created = self.services.store.collections().create(Collection::new())?;
        created.handle = Some(
            self.services
                .identifiers
                .create_handle(created.id.into(), handle)?,
        );
        self.save(&created)?;
        self.communities().add_collection(ctx, community, &created.id)?;
        let collection = self.get(&created.id)?;

        let anonymous = self.services.anonymous_group()?;
        for action in [Action::Read, Action::DefaultItemRead, Action::DefaultBitstreamRead] {
            self.services.authz.create_resource_policy(
                collection.id.into(),
                Some(anonymous.id),
                None,
                action,
                None,
            )?;
        }

        ctx.add_event(
            Event::new(EventKind::Create, collection.id)
                .with_detail(collection.handle.clone())
                .with_identifiers(self.services.identifiers_of(collection.id)?),
        );
        info!(
            collection_id = %collection.id,
            community_id = %community,
            handle = ?collection.handle,
            "Created collection"
        );
        Ok(collection)
    }

    pub fn set_metadata(
        &self,
        ctx: &mut Context,
        id: &CollectionId,
        field: &str,
        value: Option<&str>,
    ) -> Result<()> {
        self.can_edit(ctx, id, true)?;
        let mut collection = self.get(id)?;
        apply_metadata(
            &mut collection.metadata,
            field,
            value,
            &self.services.config.content.untitled_name,
        )?;
        self.save(&collection)?;
        debug!(collection_id = %id, field, actor = ?ctx.actor(), "Set collection metadata");
        Ok(())
    }

    pub fn get_metadata(&self, collection: &Collection, field: &str) -> Result<Option<String>> {
        read_metadata(&collection.metadata, field)
    }

    pub fn get_name(&self, collection: &Collection) -> String {
        collection.name().to_string()
    }

    /// Persist pending changes and report them
    pub fn update(&self, ctx: &mut Context, id: &CollectionId) -> Result<()> {
        self.can_edit(ctx, id, true)?;
        let mut collection = self.get(id)?;
        info!(collection_id = %id, "Updating collection");

        let modified = collection.modified;
        let metadata_details = collection
            .metadata
            .is_modified()
            .then(|| collection.metadata.details());
        collection.modified = false;
        collection.metadata.clear_modified();
        if modified || metadata_details.is_some() {
            collection.last_modified = Timestamp::now();
        }
        self.save(&collection)?;

        if modified {
            ctx.add_event(Event::new(EventKind::Modify, *id));
        }
        if let Some(details) = metadata_details {
            ctx.add_event(Event::new(EventKind::ModifyMetadata, *id).with_detail(details));
        }
        Ok(())
    }

    /// Replace the logo; `None` removes it
    pub fn set_logo(
        &self,
        ctx: &mut Context,
        id: &CollectionId,
        data: Option<&[u8]>,
    ) -> Result<Option<BitstreamId>> {
        let removing_with_delete = data.is_none()
            && self
                .services
                .authz
                .authorize_action_boolean(ctx.actor(), id.into(), Action::Delete, true)?;
        if !removing_with_delete {
            self.can_edit(ctx, id, true)?;
        }

        let mut collection = self.get(id)?;
        if let Some(old) = collection.logo.take() {
            info!(collection_id = %id, logo_id = %old, "Removing collection logo");
            delete_bitstream(&self.services, &old)?;
        }
        if let Some(bytes) = data {
            let logo = store_bitstream(&self.services, "logo", bytes)?;
            let read = self
                .services
                .authz
                .get_policies_action_filter(id.into(), Action::Read)?;
            self.services.authz.add_policies(&read, logo.id.into())?;
            collection.logo = Some(logo.id);
        }
        collection.modified = true;
        self.save(&collection)?;
        Ok(collection.logo)
    }

    fn ensure_grant(&self, resource: ResourceRef, action: Action, group: GroupId) -> Result<()> {
        let grant = ResourcePolicy::for_group(resource, action, group);
        if !self.services.authz.is_identical_policy_in_place(resource, &grant)? {
            self.services.authz.add_policy(resource, action, group)?;
        }
        Ok(())
    }

    fn load_group(&self, group: GroupId) -> Result<Group> {
        self.services
            .groups
            .find(&group)?
            .ok_or_else(|| Error::not_found(ResourceKind::Group, group))
    }

    /// Reviewer group for `step` (1-3), created with ADD on the collection if missing
    pub fn create_workflow_group(&self, ctx: &mut Context, id: &CollectionId, step: u32) -> Result<Group> {
        let step = WorkflowStep::try_from(step)?;
        let mut collection = self.get(id)?;
        self.guard().manage_workflows_group(ctx.actor(), &collection)?;

        let group = match collection.workflow_group(step) {
            Some(existing) => self.load_group(existing)?,
            None => {
                let group = self.services.create_named_group(&format!(
                    "COLLECTION_{}_WORKFLOW_STEP_{}",
                    collection.id,
                    step.number()
                ))?;
                collection.set_workflow_group(step, Some(group.id));
                self.save(&collection)?;
                group
            }
        };
        self.ensure_grant(id.into(), Action::Add, group.id)?;
        info!(collection_id = %id, step = step.number(), group = %group.name, "Workflow group ready");
        Ok(group)
    }

    /// Assign (or clear) the reviewer group for `step` (1-3)
    pub fn set_workflow_group(
        &self,
        ctx: &mut Context,
        id: &CollectionId,
        step: u32,
        group: Option<GroupId>,
    ) -> Result<()> {
        let step = WorkflowStep::try_from(step)?;
        let mut collection = self.get(id)?;
        self.guard().manage_workflows_group(ctx.actor(), &collection)?;
        collection.set_workflow_group(step, group);
        self.save(&collection)
    }

    pub fn get_workflow_group(&self, id: &CollectionId, step: u32) -> Result<Option<GroupId>> {
        let step = WorkflowStep::try_from(step)?;
        Ok(self.get(id)?.workflow_group(step))
    }

    /// Submitter group, created with ADD on the collection if missing
    pub fn create_submitters(&self, ctx: &mut Context, id: &CollectionId) -> Result<Group> {
        let mut collection = self.get(id)?;
        self.guard().manage_submitters_group(ctx.actor(), &collection)?;

        let group = match collection.submitters {
            Some(existing) => self.load_group(existing)?,
            None => {
                let group = self
                    .services
                    .create_named_group(&format!("COLLECTION_{}_SUBMIT", collection.id))?;
                collection.submitters = Some(group.id);
                collection.modified = true;
                self.save(&collection)?;
                group
            }
        };
        self.ensure_grant(id.into(), Action::Add, group.id)?;
        info!(collection_id = %id, group = %group.name, "Submitter group ready");
        Ok(group)
    }

    pub fn remove_submitters(&self, ctx: &mut Context, id: &CollectionId) -> Result<()> {
        let mut collection = self.get(id)?;
        self.guard().manage_submitters_group(ctx.actor(), &collection)?;
        let Some(group) = collection.submitters.take() else {
            return Ok(());
        };
        self.services.authz.remove_group_policies(id.into(), group)?;
        collection.modified = true;
        self.save(&collection)?;
        self.services.groups.delete(&group)?;
        info!(collection_id = %id, group_id = %group, "Removed submitter group");
        Ok(())
    }

    /// Admin group, created with ADMIN on the collection if missing
    pub fn create_administrators(&self, ctx: &mut Context, id: &CollectionId) -> Result<Group> {
        let mut collection = self.get(id)?;
        self.guard().manage_admin_group(ctx.actor(), &collection)?;

        let group = match collection.admins {
            Some(existing) => self.load_group(existing)?,
            None => {
                let group = self
                    .services
                    .create_named_group(&format!("COLLECTION_{}_ADMIN", collection.id))?;
                collection.admins = Some(group.id);
                collection.modified = true;
                self.save(&collection)?;
                group
            }
        };
        self.ensure_grant(id.into(), Action::Admin, group.id)?;
        info!(collection_id = %id, group = %group.name, "Collection administrators ready");
        Ok(group)
    }

    pub fn remove_administrators(&self, ctx: &mut Context, id: &CollectionId) -> Result<()> {
        let mut collection = self.get(id)?;
        self.guard().remove_admin_group(ctx.actor(), &collection)?;
        let Some(group) = collection.admins.take() else {
            return Ok(());
        };
        self.services.authz.remove_group_policies(id.into(), group)?;
        collection.modified = true;
        self.save(&collection)?;
        self.services.groups.delete(&group)?;
        info!(collection_id = %id, group_id = %group, "Removed collection administrators");
        Ok(())
    }

    /// The collection's own license, else the configured default
    pub fn get_license(&self, collection: &Collection) -> String {
        match collection.metadata.first_value(&MetadataField::license()) {
            Some(license) if !license.trim().is_empty() => license.to_string(),
            _ => self.services.config.content.default_license.clone(),
        }
    }

    pub fn has_custom_license(&self, collection: &Collection) -> bool {
        collection
            .metadata
            .first_value(&MetadataField::license())
            .map_or(false, |l| !l.trim().is_empty())
    }

    /// Create the template item unless one exists; returns its id
    pub fn create_template_item(&self, ctx: &mut Context, id: &CollectionId) -> Result<ItemId> {
        let collection = self.get(id)?;
        self.guard().manage_template_item(ctx.actor(), &collection)?;
        if let Some(existing) = collection.template_item {
            return Ok(existing);
        }
        let template = self.items().create_template_item(ctx, id)?;
        info!(collection_id = %id, item_id = %template.id, "Created template item");
        Ok(template.id)
    }

    /// Delete the template item, if any, and report the change
    pub fn remove_template_item(&self, ctx: &mut Context, id: &CollectionId) -> Result<()> {
        let mut collection = self.get(id)?;
        self.guard().manage_template_item(ctx.actor(), &collection)?;

        if let Some(template) = collection.template_item.take() {
            info!(collection_id = %id, item_id = %template, "Removing template item");
            collection.modified = true;
            self.save(&collection)?;
            let items = self.items();
            SystemCapability::scope(|capability| {
                items.delete_as(ctx, &template, Authority::System(capability))
            })?;
        }
        ctx.add_event(Event::new(EventKind::Modify, *id).with_detail(Some("remove_template_item")));
        Ok(())
    }

    /// Add an item; requires ADD on the collection
    pub fn add_item(&self, ctx: &mut Context, id: &CollectionId, item_id: &ItemId) -> Result<()> {
        self.services
            .authz
            .authorize_action(ctx.actor(), id.into(), Action::Add, true)?;
        let mut collection = self.get(id)?;
        let mut item = require(self.services.store.items(), item_id)?;
        if item.is_template() {
            return Err(Error::InvalidArgument(format!(
                "template item {} cannot be added to a collection",
                item_id
            )));
        }
        info!(collection_id = %id, item_id = %item_id, "Adding item to collection");

        if collection.add_item(*item_id) {
            self.save(&collection)?;
        }
        if item.add_collection(*id) {
            self.services.store.items().save(&item)?;
        }
        ctx.add_event(
            Event::new(EventKind::Add, *id)
                .with_object(*item_id)
                .with_detail(item.handle.clone())
                .with_identifiers(self.services.identifiers_of(*id)?),
        );
        Ok(())
    }

    /// Remove an item; it is deleted outright when this was its only collection
    pub fn remove_item(&self, ctx: &mut Context, id: &CollectionId, item_id: &ItemId) -> Result<()> {
        self.services
            .authz
            .authorize_action(ctx.actor(), id.into(), Action::Remove, true)?;
        let mut item = require(self.services.store.items(), item_id)?;
        if !item.is_in(id) {
            return Err(Error::InvalidArgument(format!(
                "item {} is not in collection {}",
                item_id, id
            )));
        }
        let removal = Event::new(EventKind::Remove, *id)
            .with_object(*item_id)
            .with_detail(item.handle.clone())
            .with_identifiers(self.services.identifiers_of(*id)?);

        if item.collections.len() == 1 {
            self.items().delete(ctx, item_id)?;
        } else {
            let mut collection = self.get(id)?;
            collection.remove_item(item_id);
            item.remove_collection(id);
            self.save(&collection)?;
            self.services.store.items().save(&item)?;
        }
        info!(collection_id = %id, item_id = %item_id, "Removed item from collection");
        ctx.add_event(removal);
        Ok(())
    }

    /// Delete the collection with its items, groups, logo and submissions
    pub fn delete(&self, ctx: &mut Context, id: &CollectionId) -> Result<()> {
        let collection = self.get(id)?;
        info!(collection_id = %id, handle = ?collection.handle, "Deleting collection");

        if self.services.harvest.remove_collection_config(id)? {
            debug!(collection_id = %id, "Dropped harvest configuration");
        }
        ctx.add_event(
            Event::new(EventKind::Delete, *id)
                .with_detail(collection.handle.clone())
                .with_identifiers(self.services.identifiers_of(*id)?),
        );

        let removed = self.services.subscriptions.delete_by_collection(id)?;
        debug!(collection_id = %id, removed, "Dropped subscriptions");

        self.remove_template_item(ctx, id)?;

        for item in self.get(id)?.items {
            self.remove_item(ctx, id, &item)?;
        }

        self.set_logo(ctx, id, None)?;

        for workspace_item in self.services.workspace.find_by_collection(id)? {
            self.services.workspace.delete_all(workspace_item)?;
        }
        self.services.workflow.delete_collection(id)?;
        self.services.workflow.delete_by_collection(id)?;

        self.services.identifiers.unbind_handle(id.into())?;

        let collection = self.get(id)?;
        let role_groups = collection
            .workflow_groups
            .iter()
            .flatten()
            .chain(collection.admins.iter())
            .chain(collection.submitters.iter());
        for group in role_groups {
            self.services.groups.delete(group)?;
        }

        for community_id in &collection.communities {
            let mut community = require(self.services.store.communities(), community_id)?;
            community.remove_collection(id);
            self.services.store.communities().save(&community)?;
        }

        self.services.authz.remove_all_policies(id.into())?;
        self.services.store.collections().delete(id)?;
        Ok(())
    }

    /// WRITE or ADD on any parent community, else WRITE on the collection
    pub fn can_edit(&self, ctx: &Context, id: &CollectionId, use_inheritance: bool) -> Result<()> {
        let authz = &self.services.authz;
        let collection = self.get(id)?;
        for community in &collection.communities {
            if authz.authorize_action_boolean(ctx.actor(), community.into(), Action::Write, use_inheritance)?
                || authz.authorize_action_boolean(ctx.actor(), community.into(), Action::Add, use_inheritance)?
            {
                return Ok(());
            }
        }
        authz.authorize_action(ctx.actor(), id.into(), Action::Write, use_inheritance)
    }

    pub fn can_edit_boolean(&self, ctx: &Context, id: &CollectionId, use_inheritance: bool) -> Result<bool> {
        authorization_result(self.can_edit(ctx, id, use_inheritance))
    }

    /// First community the collection belongs to
    pub fn get_parent_object(&self, collection: &Collection) -> Option<CommunityId> {
        collection.communities.first().copied()
    }

    /// Collections (of `community`, or all) on which the actor may perform `action`
    pub fn find_authorized(
        &self,
        ctx: &Context,
        community: Option<&CommunityId>,
        action: Action,
    ) -> Result<Vec<Collection>> {
        let candidates = match community {
            Some(c) => {
                let community = self.communities().get(c)?;
                let mut collections = Vec::new();
                for id in &community.collections {
                    collections.push(self.get(id)?);
                }
                collections
            }
            None => self.find_all(Page::all())?,
        };
        let mut authorized = Vec::new();
        for collection in candidates {
            if self.services.authz.authorize_action_boolean(
                ctx.actor(),
                collection.id.into(),
                action,
                true,
            )? {
                authorized.push(collection);
            }
        }
        Ok(authorized)
    }

    /// Same answer as `find_authorized(ctx, None, action)`, computed from policy
    /// queries when the `find_authorized_optimize` feature is enabled
    pub fn find_authorized_optimized(&self, ctx: &Context, action: Action) -> Result<Vec<Collection>> {
        if !self.services.config.features.find_authorized_optimize {
            return self.find_authorized(ctx, None, action);
        }
        if self.services.authz.is_admin(ctx.actor())? {
            return self.find_all(Page::all());
        }

        let mut seen: HashSet<CollectionId> = HashSet::new();
        let mut found = Vec::new();
        let batches = [
            self.find_direct_mapped(ctx, action)?,
            self.find_group_mapped(ctx, action)?,
            self.find_group2group_mapped(ctx, action)?,
            self.find_group2community_mapped(ctx)?,
        ];
        for batch in batches {
            for collection in batch {
                if seen.insert(collection.id) {
                    found.push(collection);
                }
            }
        }
        found.sort_by_cached_key(|c| (c.name().to_string(), c.legacy_id));
        debug!(action = %action, count = found.len(), "Optimized collection listing");
        Ok(found)
    }

    /// Collections granting `action` (or ADMIN) to the actor as an eperson
    pub fn find_direct_mapped(&self, ctx: &Context, action: Action) -> Result<Vec<Collection>> {
        let Some(actor) = ctx.actor() else {
            return Ok(Vec::new());
        };
        let refs = self.services.authz.find_resources_by_eperson(
            actor,
            ResourceKind::Collection,
            &[action, Action::Admin],
        )?;
        self.load_refs(refs)
    }

    /// Collections granting `action` (or ADMIN) to a group the actor is directly in
    pub fn find_group_mapped(&self, ctx: &Context, action: Action) -> Result<Vec<Collection>> {
        let groups = self.services.authz.principal_groups(ctx.actor())?.direct;
        let refs = self.services.authz.find_resources_by_groups(
            &groups,
            ResourceKind::Collection,
            &[action, Action::Admin],
        )?;
        self.load_refs(refs)
    }

    /// Collections granting `action` (or ADMIN) to a group reached through nesting
    pub fn find_group2group_mapped(&self, ctx: &Context, action: Action) -> Result<Vec<Collection>> {
        let groups = self.services.authz.principal_groups(ctx.actor())?.nested;
        let refs = self.services.authz.find_resources_by_groups(
            &groups,
            ResourceKind::Collection,
            &[action, Action::Admin],
        )?;
        self.load_refs(refs)
    }

    /// Collections anywhere below a community the actor administers
    pub fn find_group2community_mapped(&self, ctx: &Context) -> Result<Vec<Collection>> {
        let authz = &self.services.authz;
        let groups = authz.principal_groups(ctx.actor())?.all();
        let mut communities = authz.find_resources_by_groups(
            &groups,
            ResourceKind::Community,
            &[Action::Admin],
        )?;
        if let Some(actor) = ctx.actor() {
            communities.extend(authz.find_resources_by_eperson(
                actor,
                ResourceKind::Community,
                &[Action::Admin],
            )?);
        }

        let community_manager = self.communities();
        let mut found = Vec::new();
        for community in communities {
            let id = CommunityId(community.id);
            if community_manager.find(&id)?.is_some() {
                found.extend(community_manager.get_all_collections(&id)?);
            }
        }
        Ok(found)
    }

    fn load_refs(&self, refs: BTreeSet<ResourceRef>) -> Result<Vec<Collection>> {
        let mut collections = Vec::new();
        for r in refs {
            if let Some(collection) = self.find(&CollectionId(r.id))? {
                collections.push(collection);
            }
        }
        Ok(collections)
    }

    /// Touch the collection and report the change
    pub fn update_last_modified(&self, ctx: &mut Context, id: &CollectionId) -> Result<()> {
        let mut collection = self.get(id)?;
        collection.last_modified = Timestamp::now();
        self.save(&collection)?;
        ctx.add_event(Event::new(EventKind::Modify, *id));
        Ok(())
    }
}
