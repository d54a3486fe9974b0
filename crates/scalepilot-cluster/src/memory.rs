//! In-memory cluster coordinator.
//!
//! Tracks node records directly instead of asking a cluster manager.
//! Scale-in drains the oldest qualifying nodes first and forgets them once
//! their instances are deleted. Set `node_class` in the config map to
//! restrict every hook to nodes of that class.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use scalepilot_core::{ConfigMap, InstanceId};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::coordinator::{ClusterCoordinator, NodeIdLookup};
use crate::error::{ClusterError, ClusterResult};
use crate::node::{ClusterNode, NodeResourceId, NodeStatus};

/// Config key restricting the coordinator to one node class.
pub const NODE_CLASS_KEY: &str = "node_class";

/// Cluster coordinator backed by an in-memory node table.
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    nodes: Mutex<Vec<ClusterNode>>,
    /// Hook invocations, for observing that a caller left the cluster alone.
    calls: AtomicUsize,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `nodes` already registered.
    pub fn with_nodes(nodes: Vec<ClusterNode>) -> Self {
        Self {
            nodes: Mutex::new(nodes),
            calls: AtomicUsize::new(0),
        }
    }

    /// Register a node, replacing any node with the same id.
    pub async fn join(&self, node: ClusterNode) {
        let mut nodes = self.nodes.lock().await;
        nodes.retain(|n| n.id != node.id);
        info!(node_id = %node.id, name = %node.name, "node joined cluster");
        nodes.push(node);
    }

    /// Remove a node. Returns whether it was known.
    pub async fn leave(&self, node_id: &str) -> bool {
        let mut nodes = self.nodes.lock().await;
        let before = nodes.len();
        nodes.retain(|n| n.id != node_id);
        let existed = nodes.len() != before;
        if existed {
            info!(%node_id, "node left cluster");
        }
        existed
    }

    /// Update a node's status. Returns whether it was known.
    pub async fn set_status(&self, node_id: &str, status: NodeStatus) -> bool {
        let mut nodes = self.nodes.lock().await;
        match nodes.iter_mut().find(|n| n.id == node_id) {
            Some(node) => {
                node.status = status;
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, node_id: &str) -> Option<ClusterNode> {
        self.nodes
            .lock()
            .await
            .iter()
            .find(|n| n.id == node_id)
            .cloned()
    }

    pub async fn nodes(&self) -> Vec<ClusterNode> {
        self.nodes.lock().await.clone()
    }

    /// Number of hook calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn in_class(config: &ConfigMap, node: &ClusterNode) -> bool {
    config
        .get(NODE_CLASS_KEY)
        .filter(|c| !c.is_empty())
        .is_none_or(|class| &node.node_class == class)
}

#[async_trait]
impl ClusterCoordinator for InMemoryCluster {
    async fn run_pre_scale_in(
        &self,
        config: &ConfigMap,
        remote_ids: &[InstanceId],
        n: usize,
        lookup: &dyn NodeIdLookup,
    ) -> ClusterResult<Vec<NodeResourceId>> {
        self.record_call();
        if n == 0 {
            return Ok(Vec::new());
        }

        // Snapshot so the table is not locked across lookups.
        let mut candidates: Vec<ClusterNode> = self
            .nodes
            .lock()
            .await
            .iter()
            .filter(|node| node.is_scale_in_candidate() && in_class(config, node))
            .cloned()
            .collect();
        candidates.sort_by_key(|node| node.create_index);

        let mut selected = Vec::with_capacity(n);
        for node in &candidates {
            if selected.len() == n {
                break;
            }
            match lookup.remote_id(node).await {
                Ok(remote) if remote_ids.contains(&remote) => {
                    selected.push(NodeResourceId::new(node.id.clone(), remote));
                }
                Ok(remote) => {
                    debug!(node_id = %node.id, %remote, "node not backed by a pool instance");
                }
                Err(e) => {
                    warn!(node_id = %node.id, error = %e, "skipping node without matching instance");
                }
            }
        }

        if selected.len() < n {
            return Err(ClusterError::InsufficientNodes {
                requested: n,
                available: selected.len(),
            });
        }

        let chosen: HashSet<&str> = selected.iter().map(|s| s.node_id.as_str()).collect();
        let mut nodes = self.nodes.lock().await;
        for node in nodes.iter_mut().filter(|n| chosen.contains(n.id.as_str())) {
            node.drain = true;
            node.eligible = false;
            info!(node_id = %node.id, "node draining for scale-in");
        }

        Ok(selected)
    }

    async fn run_post_scale_in(
        &self,
        _config: &ConfigMap,
        nodes: &[NodeResourceId],
    ) -> ClusterResult<()> {
        self.record_call();
        let mut table = self.nodes.lock().await;
        for selected in nodes {
            let before = table.len();
            table.retain(|n| n.id != selected.node_id);
            if table.len() == before {
                warn!(node_id = %selected.node_id, "scaled-in node already gone");
            } else {
                debug!(
                    node_id = %selected.node_id,
                    remote = %selected.remote_resource_id,
                    "scaled-in node removed"
                );
            }
        }
        Ok(())
    }

    async fn is_pool_ready(&self, config: &ConfigMap) -> ClusterResult<bool> {
        self.record_call();
        let nodes = self.nodes.lock().await;
        Ok(nodes
            .iter()
            .filter(|node| in_class(config, node))
            .all(|node| node.status != NodeStatus::Initializing && !node.drain))
    }
}
