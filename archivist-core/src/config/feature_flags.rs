//! Feature flags for optional code paths

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Answer collection permission listings from policy queries instead of
    /// checking every collection
    pub find_authorized_optimize: bool,

    /// Custom feature flags (key-value pairs)
    pub custom: HashMap<String, bool>,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            find_authorized_optimize: false,
            custom: HashMap::new(),
        }
    }
}

impl FeatureFlags {
    /// Look up a custom flag, treating unknown names as disabled
    pub fn is_enabled(&self, name: &str) -> bool {
        self.custom.get(name).copied().unwrap_or(false)
    }

    pub fn set_custom(&mut self, name: impl Into<String>, enabled: bool) {
        self.custom.insert(name.into(), enabled);
    }
}
