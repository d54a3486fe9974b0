//! Target error types.

use std::time::Duration;

use scalepilot_cluster::ClusterError;
use scalepilot_core::ConfigError;
use scalepilot_provider::ProviderError;
use thiserror::Error;

/// Result type alias for target operations.
pub type TargetResult<T> = Result<T, TargetError>;

/// Errors returned by `Target::scale` and `Target::status`.
///
/// Failures of individual work units are not errors here; they are
/// recorded in the `ScaleReport`.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("target is not configured; call set_config first")]
    NotConfigured,

    #[error("a scale operation is already in progress")]
    ScaleInProgress,

    #[error("instance count must not be negative, got {0}")]
    NegativeCount(i64),

    #[error("scale did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("cluster selected unknown instance {0}")]
    UnknownCandidate(String),

    #[error("worker task failed: {0}")]
    Worker(String),
}
