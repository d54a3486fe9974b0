//! scalepilot-cluster: coordination with the cluster manager scheduling
//! work onto the pool.
//!
//! Removing an instance that still runs work loses that work, so scale-in
//! is bracketed by cluster hooks:
//!
//! ```text
//! Target::scale(Down, n)
//!   ├── ClusterCoordinator::run_pre_scale_in(remote_ids, n, lookup)
//!   │   ├── picks n eligible nodes, oldest first
//!   │   ├── NodeIdLookup maps each node → remote instance id
//!   │   └── drains the picked nodes
//!   ├── (instances deleted by the target)
//!   └── ClusterCoordinator::run_post_scale_in(nodes)
//!       └── forgets the drained nodes
//!
//! Target::status()
//!   └── ClusterCoordinator::is_pool_ready()
//! ```

pub mod coordinator;
pub mod error;
pub mod memory;
pub mod node;
pub mod passthrough;

pub use coordinator::{ClusterCoordinator, NodeIdLookup};
pub use error::{ClusterError, ClusterResult};
pub use memory::InMemoryCluster;
pub use node::{ClusterNode, HOSTNAME_ATTRIBUTE, NodeResourceId, NodeStatus};
pub use passthrough::PassthroughCluster;
