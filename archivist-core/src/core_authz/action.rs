//! Actions a resource policy can grant

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Read,
    Write,
    Delete,
    Add,
    Remove,
    Admin,
    /// Template for READ on items submitted to a collection
    DefaultItemRead,
    /// Template for READ on bitstreams of items submitted to a collection
    DefaultBitstreamRead,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "READ",
            Action::Write => "WRITE",
            Action::Delete => "DELETE",
            Action::Add => "ADD",
            Action::Remove => "REMOVE",
            Action::Admin => "ADMIN",
            Action::DefaultItemRead => "DEFAULT_ITEM_READ",
            Action::DefaultBitstreamRead => "DEFAULT_BITSTREAM_READ",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a policy exists; drives which policies lifecycle operations strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyType {
    /// Granted while an item is in submission
    Submission,
    /// Granted to reviewers while an item is in workflow
    Workflow,
    /// Copied from a container's defaults
    Inherited,
    /// Set explicitly by an administrator; survives withdrawal
    Custom,
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyType::Submission => "TYPE_SUBMISSION",
            PolicyType::Workflow => "TYPE_WORKFLOW",
            PolicyType::Inherited => "TYPE_INHERITED",
            PolicyType::Custom => "TYPE_CUSTOM",
        };
        f.write_str(name)
    }
}
