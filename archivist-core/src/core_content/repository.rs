//! Entry point bundling the managers over one set of services

use super::collection::CollectionManager;
use super::community::CommunityManager;
use super::context::Context;
use super::item::ItemManager;
use super::services::Services;
use crate::config::Config;
use crate::core_event::EventLog;
use crate::core_store::memory::MemoryStore;
use crate::core_store::EPersonId;
use crate::error::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Hands out managers and request contexts
#[derive(Clone)]
pub struct Repository {
    services: Arc<Services>,
}

impl Repository {
    pub fn new(services: Services) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    /// Repository backed entirely by one [`MemoryStore`]
    pub fn in_memory(config: Config, events: Arc<dyn EventLog>) -> (Self, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(&config.content.handle_prefix));
        info!(handle_prefix = %config.content.handle_prefix, "Opening in-memory repository");
        let repository = Self::new(Services::in_memory(config, store.clone(), events));
        (repository, store)
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn communities(&self) -> CommunityManager {
        CommunityManager::new(self.services.clone())
    }

    pub fn collections(&self) -> CollectionManager {
        CollectionManager::new(self.services.clone())
    }

    pub fn items(&self) -> ItemManager {
        ItemManager::new(self.services.clone())
    }

    /// Open a context acting as `actor` (`None` for anonymous)
    pub fn begin(&self, actor: Option<EPersonId>) -> Result<Context> {
        Context::begin(&self.services, actor)
    }

    /// Run `f` in its own context: commit on `Ok`, roll back on `Err`
    pub fn transaction<T>(
        &self,
        actor: Option<EPersonId>,
        f: impl FnOnce(&mut Context) -> Result<T>,
    ) -> Result<T> {
        let mut ctx = self.begin(actor)?;
        match f(&mut ctx) {
            Ok(value) => {
                ctx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = ctx.rollback() {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}
