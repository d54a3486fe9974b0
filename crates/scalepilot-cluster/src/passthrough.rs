//! Coordinator for pools that run without a cluster manager.
//!
//! Every remote instance is its own node: scale-in takes the first `n`
//! candidates as given and there is nothing to drain or clean up.

use async_trait::async_trait;
use scalepilot_core::{ConfigMap, InstanceId};
use tracing::debug;

use crate::coordinator::{ClusterCoordinator, NodeIdLookup};
use crate::error::{ClusterError, ClusterResult};
use crate::node::NodeResourceId;

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCluster;

#[async_trait]
impl ClusterCoordinator for PassthroughCluster {
    async fn run_pre_scale_in(
        &self,
        _config: &ConfigMap,
        remote_ids: &[InstanceId],
        n: usize,
        _lookup: &dyn NodeIdLookup,
    ) -> ClusterResult<Vec<NodeResourceId>> {
        if remote_ids.len() < n {
            return Err(ClusterError::InsufficientNodes {
                requested: n,
                available: remote_ids.len(),
            });
        }
        let selected: Vec<NodeResourceId> = remote_ids[..n]
            .iter()
            .map(|id| NodeResourceId::new(id.clone(), id.clone()))
            .collect();
        debug!(selected = selected.len(), "passthrough scale-in selection");
        Ok(selected)
    }

    async fn run_post_scale_in(
        &self,
        _config: &ConfigMap,
        _nodes: &[NodeResourceId],
    ) -> ClusterResult<()> {
        Ok(())
    }

    async fn is_pool_ready(&self, _config: &ConfigMap) -> ClusterResult<bool> {
        Ok(true)
    }
}
