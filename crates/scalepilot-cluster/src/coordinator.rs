//! The cluster-side hooks around scale-in.

use async_trait::async_trait;
use scalepilot_core::{ConfigMap, InstanceId};

use crate::error::ClusterResult;
use crate::node::{ClusterNode, NodeResourceId};

/// Maps a cluster node to the id of the remote instance running it.
#[async_trait]
pub trait NodeIdLookup: Send + Sync {
    async fn remote_id(&self, node: &ClusterNode) -> ClusterResult<InstanceId>;
}

/// Coordination with the cluster manager that schedules work onto the pool.
///
/// Scale-in is bracketed: `run_pre_scale_in` picks and drains nodes whose
/// instances are about to be deleted, and `run_post_scale_in` forgets them
/// once the instances are gone.
#[async_trait]
pub trait ClusterCoordinator: Send + Sync {
    /// Pick `n` nodes backed by one of `remote_ids` and prepare them for removal.
    async fn run_pre_scale_in(
        &self,
        config: &ConfigMap,
        remote_ids: &[InstanceId],
        n: usize,
        lookup: &dyn NodeIdLookup,
    ) -> ClusterResult<Vec<NodeResourceId>>;

    /// Clean up after the instances behind `nodes` were deleted.
    async fn run_post_scale_in(
        &self,
        config: &ConfigMap,
        nodes: &[NodeResourceId],
    ) -> ClusterResult<()>;

    /// Whether the cluster considers the pool settled.
    async fn is_pool_ready(&self, config: &ConfigMap) -> ClusterResult<bool>;
}
