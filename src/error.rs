use thiserror::Error;

/// Engine-level errors using thiserror for structured error handling.
///
/// Only malformed input is an error. A frame without a ball or without
/// targets is a normal outcome and is reported as `None` / an empty set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unsupported frame format: {0}")]
    UnsupportedFrameFormat(String),

    #[error("Invalid processing mode: {0:?} (expected fast, accurate or balanced)")]
    InvalidMode(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
