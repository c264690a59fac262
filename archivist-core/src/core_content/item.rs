//! Item lifecycle: submission, archive status, moves and policy inheritance

use super::bitstreams::{delete_bundle, is_original, store_bitstream};
use super::collection::CollectionManager;
use super::community::CommunityManager;
use super::context::Context;
use super::parse_field;
use super::provenance::status_note;
use super::services::Services;
use crate::core_authz::{Action, Authority, PolicyType, ResourcePolicy, RoleGuard, SystemCapability};
use crate::core_event::{Event, EventKind};
use crate::core_model::{
    Bitstream, Bundle, Collection, Community, EPerson, Item, MetadataField, ORIGINAL_BUNDLE,
};
use crate::core_store::{
    require, BundleId, CollectionId, CommunityId, EPersonId, GroupId, ItemFilter,
    ItemId, ObjectRef, Page, ResourceKind, ResourceRef, Timestamp,
};
use crate::error::{Error, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Creates, edits, moves, withdraws and deletes items
#[derive(Clone)]
pub struct ItemManager {
    services: Arc<Services>,
}

impl ItemManager {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    fn collections(&self) -> CollectionManager {
        CollectionManager::new(self.services.clone())
    }

    fn communities(&self) -> CommunityManager {
        CommunityManager::new(self.services.clone())
    }

    fn guard(&self) -> RoleGuard<'_> {
        RoleGuard::new(
            self.services.authz.as_ref(),
            &self.services.config.authorization,
        )
    }

    fn save(&self, item: &Item) -> Result<()> {
        Ok(self.services.store.items().save(item)?)
    }

    pub fn find(&self, id: &ItemId) -> Result<Option<Item>> {
        Ok(self.services.store.items().find(id)?)
    }

    pub fn get(&self, id: &ItemId) -> Result<Item> {
        require(self.services.store.items(), id)
    }

    pub fn find_by_id_or_legacy_id(&self, id: &str) -> Result<Option<Item>> {
        let dao = self.services.store.items();
        match ObjectRef::parse(id) {
            Some(ObjectRef::Uuid(uuid)) => Ok(dao.find(&ItemId(uuid))?),
            Some(ObjectRef::Legacy(legacy)) => Ok(dao.find_by_legacy_id(legacy)?),
            None => Ok(None),
        }
    }

    pub fn find_by_legacy_id(&self, legacy_id: i64) -> Result<Option<Item>> {
        Ok(self.services.store.items().find_by_legacy_id(legacy_id)?)
    }

    /// Archived, non-withdrawn items
    pub fn find_all(&self, page: Page) -> Result<Vec<Item>> {
        Ok(self.services.store.find_items(&ItemFilter::archived(), page)?)
    }

    /// Every non-template item regardless of status
    pub fn find_all_unfiltered(&self, page: Page) -> Result<Vec<Item>> {
        Ok(self.services.store.find_items(&ItemFilter::default(), page)?)
    }

    pub fn find_by_submitter(&self, submitter: &EPersonId) -> Result<Vec<Item>> {
        let filter = ItemFilter::default().submitted_by(*submitter);
        Ok(self.services.store.find_items(&filter, Page::all())?)
    }

    /// Archived items of the collection
    pub fn find_by_collection(&self, collection: &CollectionId, page: Page) -> Result<Vec<Item>> {
        let filter = ItemFilter::archived().in_collection(*collection);
        Ok(self.services.store.find_items(&filter, page)?)
    }

    /// Items of the collection in any state
    pub fn find_all_by_collection(&self, collection: &CollectionId) -> Result<Vec<Item>> {
        let filter = ItemFilter::default().in_collection(*collection);
        Ok(self.services.store.find_items(&filter, Page::all())?)
    }

    /// New item owned by nobody yet; the actor is recorded as submitter
    pub fn create(&self, ctx: &mut Context) -> Result<Item> {
        let mut item = Item::new();
        item.submitter = ctx.actor();
        self.create_item(ctx, item)
    }

    fn create_item(&self, ctx: &mut Context, item: Item) -> Result<Item> {
        let item = self.services.store.items().create(item)?;
        SystemCapability::scope(|capability| {
            self.update_as(ctx, &item.id, Authority::System(capability))
        })?;
        ctx.add_event(
            Event::new(EventKind::Create, item.id)
                .with_identifiers(self.services.identifiers_of(item.id)?),
        );
        info!(item_id = %item.id, "Created item");
        self.get(&item.id)
    }

    /// Template item copied into new submissions of the collection
    pub fn create_template_item(&self, ctx: &mut Context, collection_id: &CollectionId) -> Result<Item> {
        let mut collection = self.collections().get(collection_id)?;
        if collection.template_item.is_some() {
            return Err(Error::InvalidArgument(format!(
                "collection {} already has a template item",
                collection_id
            )));
        }
        self.guard().manage_template_item(ctx.actor(), &collection)?;

        let mut template = Item::new();
        template.template_item_of = Some(*collection_id);
        let template = self.create_item(ctx, template)?;

        collection.template_item = Some(template.id);
        collection.modified = true;
        self.services.store.collections().save(&collection)?;
        info!(collection_id = %collection_id, item_id = %template.id, "Created template item");
        Ok(template)
    }

    /// Add the item to `collection`, make it the owner and archive the item
    pub fn install(&self, ctx: &mut Context, id: &ItemId, collection_id: &CollectionId) -> Result<Item> {
        self.collections().add_item(ctx, collection_id, id)?;

        let mut item = self.get(id)?;
        item.owning_collection = Some(*collection_id);
        item.in_archive = true;
        item.withdrawn = false;
        item.modified = true;
        if item.handle.is_none() {
            item.handle = Some(self.services.identifiers.create_handle(id.into(), None)?);
        }
        self.save(&item)?;

        self.inherit_collection_default_policies(id, collection_id)?;
        SystemCapability::scope(|capability| {
            self.update_as(ctx, id, Authority::System(capability))
        })?;
        info!(item_id = %id, collection_id = %collection_id, handle = ?item.handle, "Installed item");
        self.get(id)
    }

    /// Set or clear a metadata field (`schema.element[.qualifier]`)
    pub fn set_metadata(
        &self,
        ctx: &mut Context,
        id: &ItemId,
        field: &str,
        value: Option<&str>,
    ) -> Result<()> {
        let field = parse_field(field)?;
        self.authorize_edit(ctx, id)?;
        let mut item = self.get(id)?;
        match value {
            Some(v) => item.metadata.set_single(&field, None, v),
            None => {
                item.metadata.clear(&field);
            }
        }
        self.save(&item)?;
        debug!(item_id = %id, field = %field, actor = ?ctx.actor(), "Set item metadata");
        Ok(())
    }

    /// Append a value after the existing ones
    pub fn add_metadata(
        &self,
        ctx: &mut Context,
        id: &ItemId,
        field: &str,
        language: Option<&str>,
        value: &str,
    ) -> Result<()> {
        let field = parse_field(field)?;
        self.authorize_edit(ctx, id)?;
        let mut item = self.get(id)?;
        item.metadata.add(&field, language, value);
        self.save(&item)?;
        debug!(item_id = %id, field = %field, actor = ?ctx.actor(), "Added item metadata");
        Ok(())
    }

    pub fn get_metadata(&self, item: &Item, field: &str) -> Result<Vec<String>> {
        let field = parse_field(field)?;
        Ok(item
            .metadata
            .values(&field)
            .into_iter()
            .map(|v| v.value.clone())
            .collect())
    }

    /// Persist pending changes, numbering new bitstreams and reporting the change
    pub fn update(&self, ctx: &mut Context, id: &ItemId) -> Result<()> {
        self.update_as(ctx, id, Authority::Caller)
    }

    pub fn update_as(&self, ctx: &mut Context, id: &ItemId, authority: Authority<'_>) -> Result<()> {
        if !authority.is_system() {
            self.authorize_edit(ctx, id)?;
        }
        let mut item = self.get(id)?;
        debug!(item_id = %id, "Updating item");

        self.assign_sequence_ids(&item)?;

        let metadata_details = item
            .metadata
            .is_modified()
            .then(|| item.metadata.details());
        if !item.modified && metadata_details.is_none() {
            return Ok(());
        }
        item.last_modified = Timestamp::now();
        item.modified = false;
        item.metadata.clear_modified();
        self.save(&item)?;

        if let Some(details) = metadata_details {
            ctx.add_event(Event::new(EventKind::ModifyMetadata, *id).with_detail(details));
        }
        ctx.add_event(
            Event::new(EventKind::Modify, *id)
                .with_identifiers(self.services.identifiers_of(*id)?),
        );
        Ok(())
    }

    /// Number unnumbered bitstreams after the highest existing sequence id
    fn assign_sequence_ids(&self, item: &Item) -> Result<()> {
        let mut bitstreams: Vec<Bitstream> = Vec::new();
        for bundle in self.load_bundles(item)? {
            for bitstream_id in &bundle.bitstreams {
                if !bitstreams.iter().any(|b| &b.id == bitstream_id) {
                    bitstreams.push(require(self.services.store.bitstreams(), bitstream_id)?);
                }
            }
        }

        let mut next = bitstreams
            .iter()
            .filter_map(|b| b.sequence_id)
            .max()
            .unwrap_or(0)
            + 1;
        for bitstream in bitstreams.iter_mut().filter(|b| b.sequence_id.is_none()) {
            bitstream.sequence_id = Some(next);
            next += 1;
            self.services.store.bitstreams().save(bitstream)?;
        }
        Ok(())
    }

    /// WRITE on the item, a template item, or edit rights on the owning collection.
    ///
    /// An unowned item that is not a template is editable only through WRITE.
    pub fn can_edit(&self, ctx: &Context, id: &ItemId) -> Result<bool> {
        if self
            .services
            .authz
            .authorize_action_boolean(ctx.actor(), id.into(), Action::Write, true)?
        {
            return Ok(true);
        }
        let item = self.get(id)?;
        if item.is_template() {
            return Ok(true);
        }
        match item.owning_collection {
            None => Ok(false),
            Some(owner) => self.collections().can_edit_boolean(ctx, &owner, false),
        }
    }

    /// Fails with the WRITE denial unless [`ItemManager::can_edit`] holds
    fn authorize_edit(&self, ctx: &Context, id: &ItemId) -> Result<()> {
        if self.can_edit(ctx, id)? {
            return Ok(());
        }
        self.services
            .authz
            .authorize_action(ctx.actor(), id.into(), Action::Write, true)
    }

    fn current_eperson(&self, ctx: &Context) -> Result<EPerson> {
        let actor = ctx
            .actor()
            .ok_or_else(|| Error::denied("An authenticated user is required"))?;
        self.services
            .groups
            .find_eperson(&actor)?
            .ok_or_else(|| Error::not_found(ResourceKind::EPerson, actor))
    }

    fn load_collections(&self, item: &Item) -> Result<Vec<Collection>> {
        let collections = self.collections();
        item.collections.iter().map(|c| collections.get(c)).collect()
    }

    fn record_status_change(&self, item: &mut Item, verb: &str, actor: &EPerson) -> Result<()> {
        let collections = self.load_collections(item)?;
        let bitstreams = self.get_non_internal_bitstreams(item)?;
        let note = status_note(verb, actor, Utc::now(), &collections, &bitstreams);
        item.metadata.add(
            &MetadataField::provenance(),
            Some(&self.services.config.content.provenance_language),
            &note,
        );
        Ok(())
    }

    /// Take the item out of the archive, keeping only CUSTOM policies
    pub fn withdraw(&self, ctx: &mut Context, id: &ItemId) -> Result<()> {
        let mut item = self.get(id)?;
        let owner = item
            .owning_collection
            .map(|c| self.collections().get(&c))
            .transpose()?;
        self.guard().withdraw_item(ctx.actor(), owner.as_ref())?;
        let actor = self.current_eperson(ctx)?;

        item.withdrawn = true;
        item.in_archive = false;
        item.modified = true;
        self.record_status_change(&mut item, "withdrawn", &actor)?;
        self.save(&item)?;
        SystemCapability::scope(|capability| {
            self.update_as(ctx, id, Authority::System(capability))
        })?;

        ctx.add_event(
            Event::new(EventKind::Modify, *id)
                .with_detail(Some("WITHDRAW"))
                .with_identifiers(self.services.identifiers_of(*id)?),
        );
        self.services
            .authz
            .remove_all_policies_by_type_not_equal(id.into(), PolicyType::Custom)?;
        info!(item_id = %id, user = %actor.email, "Withdrew item");
        Ok(())
    }

    /// Return a withdrawn item to the archive and restore default READ policies
    pub fn reinstate(&self, ctx: &mut Context, id: &ItemId) -> Result<()> {
        let mut item = self.get(id)?;
        let collections = self.load_collections(&item)?;
        self.guard().reinstate_item(ctx.actor(), &collections)?;
        let actor = self.current_eperson(ctx)?;

        item.withdrawn = false;
        item.in_archive = true;
        item.modified = true;
        self.record_status_change(&mut item, "reinstated", &actor)?;
        self.save(&item)?;
        SystemCapability::scope(|capability| {
            self.update_as(ctx, id, Authority::System(capability))
        })?;

        ctx.add_event(
            Event::new(EventKind::Modify, *id)
                .with_detail(Some("REINSTATE"))
                .with_identifiers(self.services.identifiers_of(*id)?),
        );
        if let Some(first) = collections.first() {
            self.inherit_collection_default_policies(id, &first.id)?;
        }
        info!(item_id = %id, user = %actor.email, "Reinstated item");
        Ok(())
    }

    /// Delete the item; requires DELETE on it
    pub fn delete(&self, ctx: &mut Context, id: &ItemId) -> Result<()> {
        self.delete_as(ctx, id, Authority::Caller)
    }

    pub fn delete_as(&self, ctx: &mut Context, id: &ItemId, authority: Authority<'_>) -> Result<()> {
        authority.require(self.services.authz.as_ref(), ctx.actor(), id.into(), Action::Delete)?;
        if self.services.harvest.remove_item_record(id)? {
            debug!(item_id = %id, "Dropped harvest record");
        }
        self.raw_delete(ctx, id, authority)
    }

    fn raw_delete(&self, ctx: &mut Context, id: &ItemId, authority: Authority<'_>) -> Result<()> {
        authority.require(self.services.authz.as_ref(), ctx.actor(), id.into(), Action::Remove)?;
        let item = self.get(id)?;
        ctx.add_event(
            Event::new(EventKind::Delete, *id)
                .with_detail(item.handle.clone())
                .with_identifiers(self.services.identifiers_of(*id)?),
        );
        info!(item_id = %id, handle = ?item.handle, "Deleting item");

        self.remove_all_bundles_as(ctx, id, authority)?;

        if self.services.versioning.version_of(id)?.is_some() {
            self.services.versioning.remove_version(id)?;
        } else {
            self.services.identifiers.delete(id.into())?;
        }

        let collections = self.services.store.collections();
        for collection_id in &item.collections {
            let mut collection = require(collections, collection_id)?;
            if collection.remove_item(id) {
                collections.save(&collection)?;
            }
        }
        if let Some(owner) = item.template_item_of {
            if let Some(mut collection) = collections.find(&owner)? {
                if collection.template_item == Some(*id) {
                    collection.template_item = None;
                    collections.save(&collection)?;
                }
            }
        }

        self.services.identifiers.unbind_handle(id.into())?;
        self.services.authz.remove_all_policies(id.into())?;
        self.services.store.items().delete(id)?;
        Ok(())
    }

    /// Move the item between collections, optionally re-deriving default policies
    pub fn move_item(
        &self,
        ctx: &mut Context,
        id: &ItemId,
        from: &CollectionId,
        to: &CollectionId,
        inherit_default_policies: bool,
    ) -> Result<()> {
        if from == to {
            return Err(Error::InvalidArgument(format!(
                "item {} cannot be moved onto the collection it is in",
                id
            )));
        }
        self.authorize_edit(ctx, id)?;
        let was_owner = self.get(id)?.is_owned_by(from);

        let collections = self.collections();
        collections.add_item(ctx, to, id)?;
        collections.remove_item(ctx, from, id)?;

        if !was_owner {
            ctx.add_event(
                Event::new(EventKind::Modify, *id)
                    .with_identifiers(self.services.identifiers_of(*id)?),
            );
            return Ok(());
        }

        info!(item_id = %id, from = %from, to = %to, "Moving item");
        let mut item = self.get(id)?;
        item.owning_collection = Some(*to);
        item.modified = true;
        self.save(&item)?;
        if inherit_default_policies {
            debug!(item_id = %id, "Updating item with inherited policies");
            self.drop_inherited_read(&item)?;
            self.inherit_collection_default_policies(id, to)?;
        }
        SystemCapability::scope(|capability| {
            self.update_as(ctx, id, Authority::System(capability))
        })
    }

    /// Defaults of `collection` applied to the item, its bundles and bitstreams
    pub fn inherit_collection_default_policies(&self, id: &ItemId, collection: &CollectionId) -> Result<()> {
        self.adjust_item_policies(id, collection)?;
        self.adjust_bundle_bitstream_policies(id, collection)?;
        debug!(item_id = %id, collection_id = %collection, "Inherited collection default policies");
        Ok(())
    }

    /// Inherited READ on the item and its contents, left over from the previous owner
    fn drop_inherited_read(&self, item: &Item) -> Result<()> {
        let authz = &self.services.authz;
        let mut targets: Vec<ResourceRef> = vec![item.id.into()];
        for bundle in self.load_bundles(item)? {
            targets.push(bundle.id.into());
            targets.extend(bundle.bitstreams.iter().map(ResourceRef::from));
        }
        for target in targets {
            authz.remove_policies_by_type_and_action(target, PolicyType::Inherited, Action::Read)?;
        }
        Ok(())
    }

    /// Replace SUBMISSION and WORKFLOW policies on the item with the
    /// collection's DEFAULT_ITEM_READ grants as inherited READ
    pub fn adjust_item_policies(&self, id: &ItemId, collection_id: &CollectionId) -> Result<()> {
        let defaults = self.default_policies(collection_id, Action::DefaultItemRead, "item")?;
        self.apply_defaults(id.into(), &defaults)
    }

    /// Same as [`ItemManager::adjust_item_policies`] for every bundle and
    /// bitstream, from DEFAULT_BITSTREAM_READ
    pub fn adjust_bundle_bitstream_policies(&self, id: &ItemId, collection_id: &CollectionId) -> Result<()> {
        let defaults = self.default_policies(collection_id, Action::DefaultBitstreamRead, "bitstream")?;
        let item = self.get(id)?;
        for bundle in self.load_bundles(&item)? {
            self.apply_defaults(bundle.id.into(), &defaults)?;
            for bitstream in &bundle.bitstreams {
                self.apply_defaults(bitstream.into(), &defaults)?;
            }
        }
        Ok(())
    }

    fn default_policies(
        &self,
        collection_id: &CollectionId,
        action: Action,
        what: &str,
    ) -> Result<Vec<ResourcePolicy>> {
        let defaults = self
            .services
            .authz
            .get_policies_action_filter(collection_id.into(), action)?;
        if defaults.is_empty() {
            let handle = self.collections().get(collection_id)?.handle;
            return Err(Error::Configuration(format!(
                "Collection {} ({}) has no default {} READ policies",
                collection_id,
                handle.unwrap_or_default(),
                what
            )));
        }
        Ok(defaults)
    }

    fn apply_defaults(&self, target: ResourceRef, defaults: &[ResourcePolicy]) -> Result<()> {
        let authz = &self.services.authz;
        authz.remove_all_policies_by_type(target, PolicyType::Submission)?;
        authz.remove_all_policies_by_type(target, PolicyType::Workflow)?;

        let mut to_add: Vec<ResourcePolicy> = Vec::new();
        for default in defaults {
            let mut policy = default.clone_onto(target);
            policy.action = Action::Read;
            let duplicate = authz.is_identical_policy_in_place(target, &policy)?
                || to_add.iter().any(|p| p.is_same_grant(&policy));
            if !duplicate {
                policy.rp_type = Some(PolicyType::Inherited);
                to_add.push(policy);
            }
        }
        authz.add_policies(&to_add, target)
    }

    pub fn replace_all_item_policies(&self, id: &ItemId, policies: &[ResourcePolicy]) -> Result<()> {
        self.services.authz.remove_all_policies(id.into())?;
        self.services.authz.add_policies(policies, id.into())
    }

    /// Replace the policies of every bundle and bitstream of the item
    pub fn replace_all_bitstream_policies(&self, id: &ItemId, policies: &[ResourcePolicy]) -> Result<()> {
        let authz = &self.services.authz;
        let item = self.get(id)?;
        for bundle in self.load_bundles(&item)? {
            for bitstream in &bundle.bitstreams {
                authz.remove_all_policies(bitstream.into())?;
                authz.add_policies(policies, bitstream.into())?;
            }
            authz.remove_all_policies(bundle.id.into())?;
            authz.add_policies(policies, bundle.id.into())?;
        }
        Ok(())
    }

    /// Drop the group's policies from the item and everything it contains
    pub fn remove_group_policies(&self, id: &ItemId, group: GroupId) -> Result<()> {
        let authz = &self.services.authz;
        authz.remove_group_policies(id.into(), group)?;
        let item = self.get(id)?;
        for bundle in self.load_bundles(&item)? {
            for bitstream in &bundle.bitstreams {
                authz.remove_group_policies(bitstream.into(), group)?;
            }
            authz.remove_group_policies(bundle.id.into(), group)?;
        }
        Ok(())
    }

    fn load_bundles(&self, item: &Item) -> Result<Vec<Bundle>> {
        let bundles = self.services.store.bundles();
        item.bundles.iter().map(|b| require(bundles, b)).collect()
    }

    /// Bundles of the item named `name`
    pub fn get_bundles(&self, item: &Item, name: &str) -> Result<Vec<Bundle>> {
        let mut bundles = self.load_bundles(item)?;
        bundles.retain(|b| b.name == name);
        Ok(bundles)
    }

    /// New empty bundle attached to the item; requires ADD on the item
    pub fn create_bundle(&self, ctx: &mut Context, id: &ItemId, name: &str) -> Result<Bundle> {
        self.services
            .authz
            .authorize_action(ctx.actor(), id.into(), Action::Add, true)?;
        let bundle = self.services.store.bundles().create(Bundle::new(name))?;
        self.add_bundle(ctx, id, &bundle.id)?;
        require(self.services.store.bundles(), &bundle.id)
    }

    /// Attach a bundle, copying the item's policies onto it
    pub fn add_bundle(&self, ctx: &mut Context, id: &ItemId, bundle_id: &BundleId) -> Result<()> {
        self.services
            .authz
            .authorize_action(ctx.actor(), id.into(), Action::Add, true)?;
        let mut item = self.get(id)?;
        if item.bundles.contains(bundle_id) {
            return Ok(());
        }
        let mut bundle = require(self.services.store.bundles(), bundle_id)?;
        info!(item_id = %id, bundle_id = %bundle_id, "Adding bundle");

        self.services.authz.inherit_policies(id.into(), bundle_id.into())?;
        item.add_bundle(*bundle_id);
        bundle.add_item(*id);
        self.save(&item)?;
        self.services.store.bundles().save(&bundle)?;
        ctx.add_event(
            Event::new(EventKind::Add, *id)
                .with_object(*bundle_id)
                .with_detail(Some(bundle.name.clone()))
                .with_identifiers(self.services.identifiers_of(*id)?),
        );
        Ok(())
    }

    /// Detach a bundle; a bundle left without items is deleted
    pub fn remove_bundle(&self, ctx: &mut Context, id: &ItemId, bundle_id: &BundleId) -> Result<()> {
        self.services
            .authz
            .authorize_action(ctx.actor(), id.into(), Action::Remove, true)?;
        let mut item = self.get(id)?;
        let mut bundle = require(self.services.store.bundles(), bundle_id)?;
        info!(item_id = %id, bundle_id = %bundle_id, "Removing bundle");

        item.remove_bundle(bundle_id);
        bundle.remove_item(id);
        self.save(&item)?;
        self.services.store.bundles().save(&bundle)?;
        ctx.add_event(
            Event::new(EventKind::Remove, *id)
                .with_object(*bundle_id)
                .with_detail(Some(bundle.name.clone()))
                .with_identifiers(self.services.identifiers_of(*id)?),
        );
        if bundle.items.is_empty() {
            delete_bundle(&self.services, bundle_id)?;
        }
        Ok(())
    }

    /// Delete every bundle of the item with its bitstreams
    pub fn remove_all_bundles(&self, ctx: &mut Context, id: &ItemId) -> Result<()> {
        self.remove_all_bundles_as(ctx, id, Authority::Caller)
    }

    fn remove_all_bundles_as(&self, ctx: &mut Context, id: &ItemId, authority: Authority<'_>) -> Result<()> {
        let mut item = self.get(id)?;
        for bundle_id in std::mem::take(&mut item.bundles) {
            authority.require(self.services.authz.as_ref(), ctx.actor(), id.into(), Action::Remove)?;
            let name = require(self.services.store.bundles(), &bundle_id)?.name;
            self.save(&item)?;
            delete_bundle(&self.services, &bundle_id)?;
            info!(item_id = %id, bundle_id = %bundle_id, "Removed bundle");
            ctx.add_event(
                Event::new(EventKind::Remove, *id)
                    .with_object(bundle_id)
                    .with_detail(Some(name)),
            );
        }
        Ok(())
    }

    /// Store `data` as the only file of a new ORIGINAL bundle
    pub fn create_single_bitstream(
        &self,
        ctx: &mut Context,
        id: &ItemId,
        file_name: &str,
        data: &[u8],
    ) -> Result<Bitstream> {
        self.create_single_bitstream_in(ctx, id, ORIGINAL_BUNDLE, file_name, data)
    }

    /// Store `data` as the only file of a new bundle named `bundle_name`
    pub fn create_single_bitstream_in(
        &self,
        ctx: &mut Context,
        id: &ItemId,
        bundle_name: &str,
        file_name: &str,
        data: &[u8],
    ) -> Result<Bitstream> {
        let mut bundle = self.create_bundle(ctx, id, bundle_name)?;
        let mut bitstream = store_bitstream(&self.services, file_name, data)?;
        bitstream.bundles.push(bundle.id);
        bundle.add_bitstream(bitstream.id);
        self.services.store.bitstreams().save(&bitstream)?;
        self.services.store.bundles().save(&bundle)?;
        self.services
            .authz
            .inherit_policies(bundle.id.into(), bitstream.id.into())?;
        Ok(bitstream)
    }

    /// Bitstreams of every bundle, without internal ones
    pub fn get_non_internal_bitstreams(&self, item: &Item) -> Result<Vec<Bitstream>> {
        let mut found: Vec<Bitstream> = Vec::new();
        for bundle in self.load_bundles(item)? {
            for id in &bundle.bitstreams {
                let bitstream = require(self.services.store.bitstreams(), id)?;
                if !bitstream.internal && !found.iter().any(|b| b.id == bitstream.id) {
                    found.push(bitstream);
                }
            }
        }
        Ok(found)
    }

    /// Whether any ORIGINAL bundle holds a file
    pub fn has_uploaded_files(&self, item: &Item) -> Result<bool> {
        Ok(self
            .load_bundles(item)?
            .iter()
            .any(|b| is_original(&b.name) && !b.bitstreams.is_empty()))
    }

    pub fn is_in(&self, item: &Item, collection: &CollectionId) -> bool {
        item.is_in(collection)
    }

    pub fn is_owning_collection(&self, item: &Item, collection: &CollectionId) -> bool {
        item.is_owned_by(collection)
    }

    /// Communities of the item's collections plus their ancestors, without repeats
    pub fn get_communities(&self, item: &Item) -> Result<Vec<Community>> {
        let communities = self.communities();
        let mut seen: HashSet<CommunityId> = HashSet::new();
        let mut found = Vec::new();
        for collection in self.load_collections(item)? {
            for community_id in &collection.communities {
                let community = communities.get(community_id)?;
                let parents = communities.get_all_parents(community_id)?;
                for c in std::iter::once(community).chain(parents) {
                    if seen.insert(c.id) {
                        found.push(c);
                    }
                }
            }
        }
        Ok(found)
    }

    /// Collections the item is not a member of
    pub fn get_collections_not_linked(&self, item: &Item) -> Result<Vec<Collection>> {
        let mut all = self.collections().find_all(Page::all())?;
        all.retain(|c| !item.is_in(&c.id));
        Ok(all)
    }

    /// Site admins see everything; others need READ on a discoverable item
    pub fn is_item_listed_for_user(&self, ctx: &Context, item: &Item) -> Result<bool> {
        let authz = &self.services.authz;
        if authz.is_admin(ctx.actor())? {
            return Ok(true);
        }
        let listed = item.discoverable
            && authz.authorize_action_boolean(ctx.actor(), item.id.into(), Action::Read, true)?;
        if !listed {
            debug!(item_id = %item.id, "Item is unlisted");
        }
        Ok(listed)
    }

    /// The owning collection, or the collection a template belongs to
    pub fn get_parent_object(&self, item: &Item) -> Option<CollectionId> {
        item.owning_collection.or(item.template_item_of)
    }

    /// Touch the item and report the change
    pub fn update_last_modified(&self, ctx: &mut Context, id: &ItemId) -> Result<()> {
        let mut item = self.get(id)?;
        item.last_modified = Timestamp::now();
        self.save(&item)?;
        ctx.add_event(
            Event::new(EventKind::Modify, *id)
                .with_identifiers(self.services.identifiers_of(*id)?),
        );
        Ok(())
    }

    /// Archived items of the collection
    pub fn count_items(&self, collection: &CollectionId) -> Result<usize> {
        let filter = ItemFilter::archived().in_collection(*collection);
        Ok(self.services.store.count_items(&filter)?)
    }

    /// Archived items anywhere below the community, each counted once
    pub fn count_items_in_community(&self, community: &CommunityId) -> Result<usize> {
        let mut seen: HashSet<ItemId> = HashSet::new();
        for collection in self.communities().get_all_collections(community)? {
            let filter = ItemFilter::archived().in_collection(collection.id);
            for item in self.services.store.find_items(&filter, Page::all())? {
                seen.insert(item.id);
            }
        }
        Ok(seen.len())
    }

    pub fn count_total(&self) -> Result<usize> {
        Ok(self.services.store.items().count_rows()?)
    }

    pub fn count_not_archived(&self) -> Result<usize> {
        Ok(self.services.store.count_items(&ItemFilter::not_archived())?)
    }

    pub fn count_withdrawn(&self) -> Result<usize> {
        Ok(self.services.store.count_items(&ItemFilter::withdrawn())?)
    }
}
