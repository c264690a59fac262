//! Lifecycle events and the logs they are committed to

mod event;
mod log;

pub use event::{Event, EventKind};
pub use log::{EventLog, MemoryEventLog, TracingEventLog};
