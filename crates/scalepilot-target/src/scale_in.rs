//! Scale-in coordination shim.
//!
//! Before anything is deleted the cluster coordinator picks which
//! instances go, so running work can be drained first. Nodes are tied to
//! instances by hostname: a node's `unique.hostname` attribute must equal
//! the name of exactly one instance in the zone.

use std::sync::Arc;

use async_trait::async_trait;
use scalepilot_cluster::{
    ClusterCoordinator, ClusterError, ClusterNode, ClusterResult, HOSTNAME_ATTRIBUTE,
    NodeIdLookup, NodeResourceId,
};
use scalepilot_core::{Blueprint, ConfigMap, Instance, InstanceId, Zone};
use scalepilot_provider::{ComputeProvider, list_all};
use tracing::{debug, info};

use crate::error::{TargetError, TargetResult};

/// Resolves cluster nodes to instances by listing the provider.
pub struct InventoryNodeLookup {
    provider: Arc<dyn ComputeProvider>,
    zone: Option<Zone>,
}

impl InventoryNodeLookup {
    pub fn new(provider: Arc<dyn ComputeProvider>, zone: Option<Zone>) -> Self {
        Self { provider, zone }
    }
}

#[async_trait]
impl NodeIdLookup for InventoryNodeLookup {
    async fn remote_id(&self, node: &ClusterNode) -> ClusterResult<InstanceId> {
        let hostname = node
            .hostname()
            .ok_or_else(|| ClusterError::MissingAttribute {
                node: node.id.clone(),
                attribute: HOSTNAME_ATTRIBUTE.to_string(),
            })?;

        let by_name = Blueprint {
            zone: self.zone.clone(),
            ..Blueprint::named(hostname)
        };
        let inventory = list_all(self.provider.as_ref(), &by_name)
            .await
            .map_err(|e| ClusterError::Lookup(e.to_string()))?;

        let instance = inventory
            .with_name(hostname)
            .ok_or_else(|| ClusterError::NotFound(hostname.to_string()))?;
        debug!(node_id = %node.id, server = %instance.id, "resolved node to instance");
        Ok(instance.id.clone())
    }
}

/// A node picked for removal and the instance backing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedNode {
    pub node: NodeResourceId,
    pub instance: Instance,
}

/// Ask the coordinator for `n` nodes to remove from the pool.
///
/// The pool is listed afresh; the returned instances carry their volumes
/// so the deletion can release them.
pub async fn select_candidates(
    provider: &Arc<dyn ComputeProvider>,
    cluster: &dyn ClusterCoordinator,
    blueprint: &Blueprint,
    config: &ConfigMap,
    n: usize,
) -> TargetResult<Vec<SelectedNode>> {
    let inventory = list_all(provider.as_ref(), blueprint).await?;
    let lookup = InventoryNodeLookup::new(Arc::clone(provider), blueprint.zone.clone());

    let nodes = cluster
        .run_pre_scale_in(config, &inventory.ids(), n, &lookup)
        .await?;

    let selected = nodes
        .into_iter()
        .map(|node| {
            let instance = inventory
                .with_id(&node.remote_resource_id)
                .cloned()
                .ok_or_else(|| TargetError::UnknownCandidate(node.remote_resource_id.clone()))?;
            Ok(SelectedNode { node, instance })
        })
        .collect::<TargetResult<Vec<_>>>()?;

    info!(requested = n, selected = selected.len(), "scale-in candidates selected");
    Ok(selected)
}

/// Tell the coordinator the instances behind `nodes` are gone.
pub async fn post_scale_in(
    cluster: &dyn ClusterCoordinator,
    config: &ConfigMap,
    nodes: &[NodeResourceId],
) -> TargetResult<()> {
    if nodes.is_empty() {
        return Ok(());
    }
    cluster.run_post_scale_in(config, nodes).await?;
    debug!(nodes = nodes.len(), "post scale-in tasks finished");
    Ok(())
}
