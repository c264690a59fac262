//! Errors raised while loading or saving the repository configuration

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("configuration cannot be serialized: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An environment override could not be parsed
    #[error("bad value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("configuration rejected: {0}")]
    Validation(String),
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        crate::Error::Configuration(err.to_string())
    }
}
