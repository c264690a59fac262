use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoggingError {
    /// A global subscriber is already installed, or setup failed
    #[error("logging setup failed: {0}")]
    InitializationFailed(String),

    #[error("bad logging settings: {0}")]
    InvalidConfiguration(String),
}
