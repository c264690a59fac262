//! Configuration management
//!
//! Settings come from defaults, a TOML file or `ARCHIVIST_*` environment
//! variables, and are validated before use.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::logging::LogLevel;

mod error;
mod feature_flags;

pub use error::ConfigError;
pub use feature_flags::FeatureFlags;

/// Main repository configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Content defaults
    pub content: ContentConfig,

    /// Delegated administration rules
    pub authorization: AuthorizationConfig,

    /// Feature flags
    pub features: FeatureFlags,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Title stored when a container name is set blank
    pub untitled_name: String,

    /// License text for collections without their own
    pub default_license: String,

    /// Language tag on provenance notes
    pub provenance_language: String,

    /// Prefix for minted handles
    pub handle_prefix: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            untitled_name: "Untitled".to_string(),
            default_license: "NOTE: PLACE YOUR OWN LICENSE HERE".to_string(),
            provenance_language: "en".to_string(),
            handle_prefix: "123456789".to_string(),
        }
    }
}

/// Which administrators may act on the groups and items beneath them.
///
/// Site administrators are never restricted by these flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    pub community_admin_manage_admin_group: bool,
    pub community_admin_manage_collection_submitters: bool,
    pub community_admin_manage_collection_workflows: bool,
    pub community_admin_manage_collection_admin_group: bool,
    pub community_admin_manage_collection_template_item: bool,
    pub community_admin_withdraw_item: bool,
    pub community_admin_reinstate_item: bool,
    pub collection_admin_manage_submitters: bool,
    pub collection_admin_manage_workflows: bool,
    pub collection_admin_manage_admin_group: bool,
    pub collection_admin_manage_template_item: bool,
    pub collection_admin_withdraw_item: bool,
    pub collection_admin_reinstate_item: bool,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            community_admin_manage_admin_group: true,
            community_admin_manage_collection_submitters: true,
            community_admin_manage_collection_workflows: true,
            community_admin_manage_collection_admin_group: true,
            community_admin_manage_collection_template_item: true,
            community_admin_withdraw_item: true,
            community_admin_reinstate_item: true,
            collection_admin_manage_submitters: true,
            collection_admin_manage_workflows: true,
            collection_admin_manage_admin_group: true,
            collection_admin_manage_template_item: true,
            collection_admin_withdraw_item: true,
            collection_admin_reinstate_item: true,
        }
    }
}

fn parse_flag(raw: &str, key: &str) -> Result<bool, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: ARCHIVIST_<SECTION>_<KEY>
    /// Example: ARCHIVIST_CONTENT_HANDLE_PREFIX=10673
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Logging config
        if let Some(level) = lookup("ARCHIVIST_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(json) = lookup("ARCHIVIST_LOG_JSON") {
            config.logging.json_format = parse_flag(&json, "ARCHIVIST_LOG_JSON")?;
        }

        // Content config
        if let Some(name) = lookup("ARCHIVIST_CONTENT_UNTITLED_NAME") {
            config.content.untitled_name = name;
        }
        if let Some(license) = lookup("ARCHIVIST_CONTENT_DEFAULT_LICENSE") {
            config.content.default_license = license;
        }
        if let Some(language) = lookup("ARCHIVIST_CONTENT_PROVENANCE_LANGUAGE") {
            config.content.provenance_language = language;
        }
        if let Some(prefix) = lookup("ARCHIVIST_CONTENT_HANDLE_PREFIX") {
            config.content.handle_prefix = prefix;
        }

        // Feature flags
        if let Some(optimize) = lookup("ARCHIVIST_FEATURES_FIND_AUTHORIZED_OPTIMIZE") {
            config.features.find_authorized_optimize =
                parse_flag(&optimize, "ARCHIVIST_FEATURES_FIND_AUTHORIZED_OPTIMIZE")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file; sections and keys it omits keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.parse::<LogLevel>().is_err() {
            return Err(ConfigError::Validation(format!(
                "unknown log level {:?}",
                self.logging.level
            )));
        }

        if self.content.untitled_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "untitled_name must not be blank".to_string(),
            ));
        }

        if self.content.provenance_language.trim().is_empty() {
            return Err(ConfigError::Validation(
                "provenance_language must not be blank".to_string(),
            ));
        }

        let prefix = self.content.handle_prefix.trim();
        if prefix.is_empty() || prefix.contains('/') {
            return Err(ConfigError::Validation(format!(
                "Invalid handle prefix: {:?}",
                self.content.handle_prefix
            )));
        }

        Ok(())
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
