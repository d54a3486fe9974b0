//! Cluster coordination error types.

use thiserror::Error;

/// Result type alias for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors raised by cluster coordinators and node lookups.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The node does not carry the attribute used to identify its instance.
    #[error("node {node} has no {attribute:?} attribute")]
    MissingAttribute { node: String, attribute: String },

    /// No remote instance matches the node's identity.
    #[error("no remote instance found for {0}")]
    NotFound(String),

    /// The lookup could not be completed.
    #[error("node lookup failed: {0}")]
    Lookup(String),

    /// Fewer nodes qualify for scale-in than were requested.
    #[error("requested {requested} nodes for scale-in but only {available} qualify")]
    InsufficientNodes { requested: usize, available: usize },

    #[error("cluster error: {0}")]
    Other(String),
}
