//! Structured logging setup on top of `tracing`
//!
//! `RUST_LOG` overrides the configured level when set.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub with_timestamp: bool,
    pub with_target: bool,
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamp: true,
            with_target: true,
            json_format: false,
        }
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.with_timestamp = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }
}

impl TryFrom<&LoggingConfig> for LogConfig {
    type Error = LoggingError;

    fn try_from(section: &LoggingConfig) -> Result<Self, Self::Error> {
        Ok(LogConfig::new(section.level.parse()?)
            .with_timestamp(section.with_timestamp)
            .with_target(section.with_target)
            .json_format(section.json_format))
    }
}

/// Initialize logging with the default configuration
///
/// # Example
/// ```
/// use archivist_core::logging::init_logging;
///
/// init_logging().expect("Failed to initialize logging");
/// ```
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize logging from the `[logging]` section of the repository config
pub fn init_from_config(section: &LoggingConfig) -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::try_from(section)?)
}

/// Install the global subscriber; fails if one is already installed
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let fmt_layer = fmt::layer().with_target(config.with_target);
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match (config.json_format, config.with_timestamp) {
        (true, true) => registry.with(fmt_layer.json()).try_init(),
        (true, false) => registry.with(fmt_layer.json().without_time()).try_init(),
        (false, true) => registry.with(fmt_layer).try_init(),
        (false, false) => registry.with(fmt_layer.without_time()).try_init(),
    };

    result.map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}
