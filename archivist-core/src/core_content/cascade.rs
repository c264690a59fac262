//! Work-list driven community removal
//!
//! Deleting a community touches its whole subtree. Instead of recursing,
//! each step pushes the steps it implies onto an explicit stack, so depth
//! is bounded by the heap and the ordering is visible in one place:
//! descendants are finished before their ancestor's record goes, and the
//! REMOVE event for a node is raised only after its subtree is gone.

use super::bitstreams::delete_bitstream;
use super::community::CommunityManager;
use super::context::Context;
use crate::core_authz::Action;
use crate::core_event::{Event, EventKind};
use crate::core_store::{CollectionId, CommunityId};
use crate::error::{Error, Result};
use tracing::{info, trace};

#[derive(Debug)]
pub(crate) enum Step {
    /// Authorize, then either detach from the parent or purge a top-level node
    Delete(CommunityId),
    /// Unlink a child from its parent, then purge it
    Detach {
        parent: CommunityId,
        child: CommunityId,
    },
    /// Raise DELETE and schedule removal of everything the node contains
    Purge(CommunityId),
    /// Drop logo, policies, handle, record and admin group of an emptied node
    Finish(CommunityId),
    RemoveCollection {
        community: CommunityId,
        collection: CollectionId,
    },
    Emit(Event),
}

pub(crate) struct Cascade<'a> {
    communities: &'a CommunityManager,
    stack: Vec<Step>,
}

impl<'a> Cascade<'a> {
    pub(crate) fn new(communities: &'a CommunityManager, first: Step) -> Self {
        Self {
            communities,
            stack: vec![first],
        }
    }

    pub(crate) fn run(mut self, ctx: &mut Context) -> Result<()> {
        while let Some(step) = self.stack.pop() {
            trace!(step = ?step, pending = self.stack.len(), "Cascade step");
            match step {
                Step::Delete(id) => self.delete(ctx, id)?,
                Step::Detach { parent, child } => self.detach(ctx, parent, child)?,
                Step::Purge(id) => self.purge(ctx, id)?,
                Step::Finish(id) => self.finish(ctx, id)?,
                Step::RemoveCollection {
                    community,
                    collection,
                } => self.remove_collection(ctx, community, collection)?,
                Step::Emit(event) => ctx.add_event(event),
            }
        }
        Ok(())
    }

    /// Queue steps to run in the given order, ahead of anything already queued
    fn schedule(&mut self, steps: Vec<Step>) {
        self.stack.extend(steps.into_iter().rev());
    }

    fn delete(&mut self, ctx: &mut Context, id: CommunityId) -> Result<()> {
        let services = self.communities.services();
        let community = self.communities.get(&id)?;

        let removable_from_parent = match community.parent {
            Some(parent) => services.authz.authorize_action_boolean(
                ctx.actor(),
                parent.into(),
                Action::Remove,
                true,
            )?,
            None => false,
        };
        if !removable_from_parent {
            services
                .authz
                .authorize_action(ctx.actor(), id.into(), Action::Delete, true)?;
        }

        match community.parent {
            Some(parent) => {
                let mut steps: Vec<Step> = community
                    .subcommunities
                    .iter()
                    .map(|sub| Step::Delete(*sub))
                    .collect();
                steps.push(Step::Detach { parent, child: id });
                self.schedule(steps);
            }
            None => {
                let removal = Event::new(EventKind::Remove, services.site())
                    .with_object(id)
                    .with_detail(community.handle.clone())
                    .with_identifiers(services.identifiers_of(id)?);
                self.schedule(vec![Step::Purge(id), Step::Emit(removal)]);
            }
        }
        Ok(())
    }

    fn detach(&mut self, ctx: &mut Context, parent_id: CommunityId, child_id: CommunityId) -> Result<()> {
        let services = self.communities.services();
        services
            .authz
            .authorize_action(ctx.actor(), parent_id.into(), Action::Remove, true)?;

        let mut parent = self.communities.get(&parent_id)?;
        let mut child = self.communities.get(&child_id)?;
        if child.parent != Some(parent_id) || !parent.remove_subcommunity(&child_id) {
            return Err(Error::InvalidArgument(format!(
                "community {} is not a subcommunity of {}",
                child_id, parent_id
            )));
        }
        let removal = Event::new(EventKind::Remove, parent_id)
            .with_object(child_id)
            .with_detail(child.handle.clone())
            .with_identifiers(services.identifiers_of(parent_id)?);

        child.parent = None;
        services.store.communities().save(&parent)?;
        services.store.communities().save(&child)?;
        info!(community_id = %parent_id, child_id = %child_id, "Removed subcommunity");

        self.schedule(vec![Step::Purge(child_id), Step::Emit(removal)]);
        Ok(())
    }

    fn purge(&mut self, ctx: &mut Context, id: CommunityId) -> Result<()> {
        let services = self.communities.services();
        let community = self.communities.get(&id)?;
        info!(community_id = %id, handle = ?community.handle, "Deleting community");
        ctx.add_event(
            Event::new(EventKind::Delete, id)
                .with_detail(community.handle.clone())
                .with_identifiers(services.identifiers_of(id)?),
        );

        let mut steps: Vec<Step> = community
            .collections
            .iter()
            .map(|collection| Step::RemoveCollection {
                community: id,
                collection: *collection,
            })
            .collect();
        steps.extend(community.subcommunities.iter().map(|sub| Step::Delete(*sub)));
        steps.push(Step::Finish(id));
        self.schedule(steps);
        Ok(())
    }

    fn finish(&mut self, ctx: &mut Context, id: CommunityId) -> Result<()> {
        let services = self.communities.services();
        let community = self.communities.get(&id)?;
        if let Some(logo) = community.logo {
            let deletable = services
                .authz
                .authorize_action_boolean(ctx.actor(), id.into(), Action::Delete, true)?;
            if !deletable {
                self.communities.can_edit(ctx, &id)?;
            }
            delete_bitstream(services, &logo)?;
        }

        services.authz.remove_all_policies(id.into())?;
        services.identifiers.unbind_handle(id.into())?;
        services.store.communities().delete(&id)?;
        if let Some(admins) = community.admins {
            services.groups.delete(&admins)?;
        }
        trace!(community_id = %id, "Community record removed");
        Ok(())
    }

    fn remove_collection(
        &mut self,
        ctx: &mut Context,
        community_id: CommunityId,
        collection_id: CollectionId,
    ) -> Result<()> {
        let services = self.communities.services();
        services
            .authz
            .authorize_action(ctx.actor(), community_id.into(), Action::Remove, true)?;

        let collections = self.communities.collections();
        let mut collection = collections.get(&collection_id)?;
        if !collection.communities.contains(&community_id) {
            return Err(Error::InvalidArgument(format!(
                "collection {} is not in community {}",
                collection_id, community_id
            )));
        }
        let removal = Event::new(EventKind::Remove, community_id)
            .with_object(collection_id)
            .with_detail(collection.handle.clone())
            .with_identifiers(services.identifiers_of(community_id)?);

        if collection.communities.len() == 1 {
            collections.delete(ctx, &collection_id)?;
        } else {
            let mut community = self.communities.get(&community_id)?;
            community.remove_collection(&collection_id);
            collection.remove_community(&community_id);
            services.store.communities().save(&community)?;
            services.store.collections().save(&collection)?;
        }
        info!(community_id = %community_id, collection_id = %collection_id, "Removed collection");
        ctx.add_event(removal);
        Ok(())
    }
}
