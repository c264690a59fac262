//! Authorization: actions, resource policies and the decision engine

mod action;
mod capability;
mod engine;
mod guard;
mod policy;
mod service;

pub use action::{Action, PolicyType};
pub use capability::{Authority, SystemCapability};
pub use engine::PolicyEngine;
pub use guard::RoleGuard;
pub use policy::ResourcePolicy;
pub use service::{AuthorizeService, PrincipalGroups};
