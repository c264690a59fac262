//! Event log sinks

use super::event::Event;
use crate::error::Result;
use std::sync::RwLock;
use tracing::{info, warn};

/// Append-only destination for committed events
pub trait EventLog: Send + Sync {
    fn append(&self, event: &Event) -> Result<()>;
}

/// Keeps every event in memory, in commit order
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: RwLock<Vec<Event>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        match self.events.read() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self.events.write() {
            Ok(mut events) => events.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl EventLog for MemoryEventLog {
    fn append(&self, event: &Event) -> Result<()> {
        match self.events.write() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
        Ok(())
    }
}

/// Writes each event as a structured log line under the `archivist::events` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventLog;

impl EventLog for TracingEventLog {
    fn append(&self, event: &Event) -> Result<()> {
        match event.to_json() {
            Ok(json) => info!(
                target: "archivist::events",
                kind = %event.kind(),
                subject = %event.subject(),
                event = %json,
                "Event dispatched"
            ),
            Err(e) => warn!(target: "archivist::events", error = %e, event = %event, "Event not serializable"),
        }
        Ok(())
    }
}
