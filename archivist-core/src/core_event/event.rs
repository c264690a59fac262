//! Lifecycle events

use crate::core_store::{ResourceRef, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Create,
    Modify,
    ModifyMetadata,
    Add,
    Remove,
    Delete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "CREATE",
            EventKind::Modify => "MODIFY",
            EventKind::ModifyMetadata => "MODIFY_METADATA",
            EventKind::Add => "ADD",
            EventKind::Remove => "REMOVE",
            EventKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable once built; recorded on the request context and flushed on commit.
///
/// `ADD` and `REMOVE` carry the container as subject and the member as object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    kind: EventKind,
    subject: ResourceRef,
    object: Option<ResourceRef>,
    detail: Option<String>,
    identifiers: Vec<String>,
    timestamp: Timestamp,
}

impl Event {
    pub fn new(kind: EventKind, subject: impl Into<ResourceRef>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            object: None,
            detail: None,
            identifiers: Vec::new(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn with_object(mut self, object: impl Into<ResourceRef>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn with_detail<S: Into<String>>(mut self, detail: Option<S>) -> Self {
        self.detail = detail.map(Into::into);
        self
    }

    /// Identifiers of the subject, captured before it can disappear
    pub fn with_identifiers(mut self, identifiers: Vec<String>) -> Self {
        self.identifiers = identifiers;
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn subject(&self) -> ResourceRef {
        self.subject
    }

    pub fn object(&self) -> Option<ResourceRef> {
        self.object
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.subject)?;
        if let Some(object) = &self.object {
            write!(f, " -> {}", object)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}
