//! Service layer for a hierarchical digital repository.
//!
//! Communities nest into a tree, collections hang off one or more
//! communities and items live in one or more collections. The managers in
//! [`core_content`] enforce authorization, keep both sides of every
//! relationship consistent, cascade deletions and record lifecycle events
//! on a per-request [`core_content::Context`].

pub mod config;
pub mod core_authz;
pub mod core_content;
pub mod core_event;
pub mod core_model;
pub mod core_store;
pub mod error;
pub mod logging;
pub mod test_utils;

pub use config::Config;
pub use core_content::{CollectionManager, CommunityManager, Context, ItemManager, Repository};
pub use error::{Error, Result};
pub use logging::{init_logging, LogLevel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = LogLevel::Info;
        let _ = Config::default();
    }
}
