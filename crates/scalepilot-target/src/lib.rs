//! scalepilot-target: converge a Scaleway instance pool toward a desired
//! count.
//!
//! # Scale flow
//!
//! ```text
//! Target::scale(action, config)
//!   ├── StateGuard::enter()          Idle → Active, Idle again on drop
//!   ├── dry run?  → return
//!   ├── decode Blueprint / PostCreateOptions
//!   ├── direction None?  → return
//!   └── within SCALE_DEADLINE:
//!       ├── list_all()               observed count
//!       ├── Up:   n = count − observed
//!       │   └── n × create unit  ──► run_batch (min(n, 5) workers)
//!       └── Down: n = observed − count
//!           ├── select_candidates()  cluster pre-scale-in
//!           ├── n × delete unit  ──► run_batch (min(n, 5) workers)
//!           └── post_scale_in()      deleted nodes only
//! ```
//!
//! A create unit runs create → user data → power on. A delete unit runs
//! power off → delete → release volumes. Each unit stops at its first
//! failing step without affecting the others.

pub mod error;
pub mod orchestrator;
pub mod pool;
pub mod report;
pub mod scale_in;
pub mod state;
pub mod target;

pub use error::{TargetError, TargetResult};
pub use pool::{Batch, MAX_WORKERS, WorkUnit};
pub use report::{ScaleReport, UnitOutcome};
pub use scale_in::{InventoryNodeLookup, SelectedNode};
pub use state::{ActiveGuard, PoolState, StateGuard};
pub use target::{PLUGIN_NAME, PluginInfo, SCALE_DEADLINE, Target};
