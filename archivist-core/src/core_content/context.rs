//! Per-request unit of work

use super::services::Services;
use crate::core_event::{Event, EventLog};
use crate::core_store::{EPersonId, TransactionManager};
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, warn};

/// The acting principal plus the events raised so far in this request.
///
/// Store writes become durable on [`Context::commit`], which then hands the
/// queued events to the event log in the order they were raised. Dropping
/// an uncommitted context rolls the store back and discards the events.
pub struct Context {
    actor: Option<EPersonId>,
    pending: Vec<Event>,
    transactions: Arc<dyn TransactionManager>,
    log: Arc<dyn EventLog>,
    open: bool,
}

impl Context {
    pub fn begin(services: &Services, actor: Option<EPersonId>) -> Result<Self> {
        services.transactions.begin()?;
        debug!(actor = ?actor, "Context opened");
        Ok(Self {
            actor,
            pending: Vec::new(),
            transactions: services.transactions.clone(),
            log: services.events.clone(),
            open: true,
        })
    }

    /// `None` for anonymous requests
    pub fn actor(&self) -> Option<EPersonId> {
        self.actor
    }

    pub fn add_event(&mut self, event: Event) {
        debug!(event = %event, "Event queued");
        self.pending.push(event);
    }

    pub fn pending_events(&self) -> &[Event] {
        &self.pending
    }

    /// Commit the store, then flush queued events; returns what was flushed
    pub fn commit(mut self) -> Result<Vec<Event>> {
        self.transactions.commit()?;
        self.open = false;
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            self.log.append(event)?;
        }
        debug!(events = events.len(), "Context committed");
        Ok(events)
    }

    /// Discard every write and event of this request
    pub fn rollback(mut self) -> Result<()> {
        self.open = false;
        self.pending.clear();
        self.transactions.rollback()?;
        debug!("Context rolled back");
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.transactions.rollback() {
                warn!(error = %e, "Rollback of abandoned context failed");
            } else {
                debug!(discarded = self.pending.len(), "Abandoned context rolled back");
            }
        }
    }
}
