//! Scoped authority for operations that bypass per-caller checks

use super::action::Action;
use super::service::AuthorizeService;
use crate::core_store::{EPersonId, ResourceRef};
use crate::error::Result;

/// Proof that the current call runs with system privileges.
///
/// Only this crate can mint one, and only for the duration of
/// [`SystemCapability::scope`]; holders cannot keep it past the closure.
#[derive(Debug)]
pub struct SystemCapability {
    _private: (),
}

impl SystemCapability {
    pub(crate) fn scope<T>(f: impl FnOnce(&SystemCapability) -> T) -> T {
        let capability = SystemCapability { _private: () };
        f(&capability)
    }
}

/// Whose permissions an internal step is checked against
#[derive(Debug, Clone, Copy)]
pub enum Authority<'a> {
    /// The actor on the request context
    Caller,
    /// Checks are skipped
    System(&'a SystemCapability),
}

impl Authority<'_> {
    pub fn require(
        &self,
        authz: &dyn AuthorizeService,
        actor: Option<EPersonId>,
        resource: ResourceRef,
        action: Action,
    ) -> Result<()> {
        match self {
            Authority::Caller => authz.authorize_action(actor, resource, action, true),
            Authority::System(_) => Ok(()),
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Authority::System(_))
    }
}
