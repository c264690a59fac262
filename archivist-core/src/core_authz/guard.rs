//! Delegated administration rules for container role groups and item status

use super::action::Action;
use super::service::AuthorizeService;
use crate::config::AuthorizationConfig;
use crate::core_model::{Collection, Community};
use crate::core_store::EPersonId;
use crate::error::{Error, Result};

/// Applies the configurable "who may manage what" delegation rules.
///
/// A site administrator always passes. Collection and community
/// administrators pass when the matching flag is enabled.
pub struct RoleGuard<'a> {
    authz: &'a dyn AuthorizeService,
    flags: &'a AuthorizationConfig,
}

impl<'a> RoleGuard<'a> {
    pub fn new(authz: &'a dyn AuthorizeService, flags: &'a AuthorizationConfig) -> Self {
        Self { authz, flags }
    }

    fn is_collection_admin(&self, actor: Option<EPersonId>, collection: &Collection) -> Result<bool> {
        self.authz
            .authorize_action_boolean(actor, collection.id.into(), Action::Admin, false)
    }

    fn is_admin_of_any_parent(
        &self,
        actor: Option<EPersonId>,
        collection: &Collection,
    ) -> Result<bool> {
        for community in &collection.communities {
            if self
                .authz
                .authorize_action_boolean(actor, community.into(), Action::Admin, true)?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn site_admin_or_deny(&self, actor: Option<EPersonId>, what: &str) -> Result<()> {
        if self.authz.is_admin(actor)? {
            Ok(())
        } else {
            Err(Error::denied(format!(
                "Only system administrators can {}",
                what
            )))
        }
    }

    fn collection_role(
        &self,
        actor: Option<EPersonId>,
        collection: &Collection,
        collection_admin_allowed: bool,
        community_admin_allowed: bool,
        what: &str,
    ) -> Result<()> {
        if collection_admin_allowed && self.is_collection_admin(actor, collection)? {
            return Ok(());
        }
        if community_admin_allowed && self.is_admin_of_any_parent(actor, collection)? {
            return Ok(());
        }
        self.site_admin_or_deny(actor, what)
    }

    pub fn manage_submitters_group(&self, actor: Option<EPersonId>, collection: &Collection) -> Result<()> {
        self.collection_role(
            actor,
            collection,
            self.flags.collection_admin_manage_submitters,
            self.flags.community_admin_manage_collection_submitters,
            "manage the submitters group",
        )
    }

    pub fn manage_workflows_group(&self, actor: Option<EPersonId>, collection: &Collection) -> Result<()> {
        self.collection_role(
            actor,
            collection,
            self.flags.collection_admin_manage_workflows,
            self.flags.community_admin_manage_collection_workflows,
            "manage workflow groups",
        )
    }

    pub fn manage_admin_group(&self, actor: Option<EPersonId>, collection: &Collection) -> Result<()> {
        self.collection_role(
            actor,
            collection,
            self.flags.collection_admin_manage_admin_group,
            self.flags.community_admin_manage_collection_admin_group,
            "manage the collection admin group",
        )
    }

    /// Only a parent community administrator can drop a collection's admin group
    pub fn remove_admin_group(&self, actor: Option<EPersonId>, collection: &Collection) -> Result<()> {
        self.collection_role(
            actor,
            collection,
            false,
            self.flags.community_admin_manage_collection_admin_group,
            "remove the collection admin group",
        )
    }

    pub fn manage_template_item(&self, actor: Option<EPersonId>, collection: &Collection) -> Result<()> {
        self.collection_role(
            actor,
            collection,
            self.flags.collection_admin_manage_template_item,
            self.flags.community_admin_manage_collection_template_item,
            "manage the template item",
        )
    }

    pub fn manage_community_admin_group(
        &self,
        actor: Option<EPersonId>,
        community: &Community,
    ) -> Result<()> {
        if self.flags.community_admin_manage_admin_group
            && self
                .authz
                .authorize_action_boolean(actor, community.id.into(), Action::Admin, true)?
        {
            return Ok(());
        }
        self.site_admin_or_deny(actor, "manage the community admin group")
    }

    pub fn remove_community_admin_group(
        &self,
        actor: Option<EPersonId>,
        community: &Community,
    ) -> Result<()> {
        if let Some(parent) = community.parent {
            if self.flags.community_admin_manage_admin_group
                && self
                    .authz
                    .authorize_action_boolean(actor, parent.into(), Action::Admin, true)?
            {
                return Ok(());
            }
        }
        self.site_admin_or_deny(actor, "remove the community admin group")
    }

    /// Falls back to REMOVE on the owning collection when no admin rule applies
    pub fn withdraw_item(&self, actor: Option<EPersonId>, owning: Option<&Collection>) -> Result<()> {
        let Some(collection) = owning else {
            return self.site_admin_or_deny(actor, "withdraw an item without an owning collection");
        };
        if self.flags.collection_admin_withdraw_item && self.is_collection_admin(actor, collection)? {
            return Ok(());
        }
        if self.flags.community_admin_withdraw_item && self.is_admin_of_any_parent(actor, collection)? {
            return Ok(());
        }
        self.authz
            .authorize_action(actor, collection.id.into(), Action::Remove, false)
    }

    /// Every collection the item sits in must accept the actor
    pub fn reinstate_item(&self, actor: Option<EPersonId>, collections: &[Collection]) -> Result<()> {
        for collection in collections {
            if self.flags.collection_admin_reinstate_item
                && self.is_collection_admin(actor, collection)?
            {
                continue;
            }
            if self.flags.community_admin_reinstate_item
                && self.is_admin_of_any_parent(actor, collection)?
            {
                continue;
            }
            self.authz
                .authorize_action(actor, collection.id.into(), Action::Add, true)?;
        }
        Ok(())
    }
}
