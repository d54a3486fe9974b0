//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration decoding.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while decoding the flat configuration map.
///
/// These are surfaced before any provider call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required key: {0}")]
    Missing(String),

    #[error("invalid boolean for {key}: {value:?} (expected \"true\" or \"false\")")]
    InvalidBool { key: String, value: String },

    #[error("invalid zone: {0:?}")]
    InvalidZone(String),

    #[error("invalid scale direction: {0:?}")]
    InvalidDirection(String),

    #[error("invalid assignment {0:?}: expected key=value")]
    Assignment(String),

    #[error("value for {0} must be a scalar or a list of scalars")]
    NotScalar(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(String),
}
