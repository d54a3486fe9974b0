//! Cluster node records and the identities exchanged during scale-in.

use std::collections::HashMap;
use std::fmt;

use scalepilot_core::InstanceId;
use serde::{Deserialize, Serialize};

/// Node attribute holding the hostname the node registered with.
pub const HOSTNAME_ATTRIBUTE: &str = "unique.hostname";

/// Scheduling status of a cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Initializing,
    Ready,
    Down,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Initializing => f.write_str("initializing"),
            NodeStatus::Ready => f.write_str("ready"),
            NodeStatus::Down => f.write_str("down"),
        }
    }
}

/// A node as known to the cluster manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub node_class: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    pub status: NodeStatus,
    /// Set while the node is being drained of work.
    #[serde(default)]
    pub drain: bool,
    /// Whether the scheduler may place new work on the node.
    pub eligible: bool,
    /// Registration order; lower is older.
    pub create_index: u64,
}

impl ClusterNode {
    /// A ready, eligible node reporting `hostname`.
    pub fn ready(id: impl Into<String>, hostname: impl Into<String>, create_index: u64) -> Self {
        let hostname = hostname.into();
        Self {
            id: id.into(),
            name: hostname.clone(),
            node_class: String::new(),
            attributes: HashMap::from([(HOSTNAME_ATTRIBUTE.to_string(), hostname)]),
            status: NodeStatus::Ready,
            drain: false,
            eligible: true,
            create_index,
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        self.attributes.get(HOSTNAME_ATTRIBUTE).map(String::as_str)
    }

    /// Whether the node may be picked for scale-in.
    pub fn is_scale_in_candidate(&self) -> bool {
        self.status == NodeStatus::Ready && self.eligible && !self.drain
    }
}

/// A node chosen for scale-in, paired with the remote instance backing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeResourceId {
    pub node_id: String,
    pub remote_resource_id: InstanceId,
}

impl NodeResourceId {
    pub fn new(node_id: impl Into<String>, remote_resource_id: impl Into<InstanceId>) -> Self {
        Self {
            node_id: node_id.into(),
            remote_resource_id: remote_resource_id.into(),
        }
    }
}
