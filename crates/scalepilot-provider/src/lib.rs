//! scalepilot-provider: the remote compute boundary.
//!
//! Everything that talks to the compute provider lives here, behind the
//! narrow [`ComputeProvider`] trait so the orchestration logic can be
//! exercised against an in-memory fake.
//!
//! # Architecture
//!
//! ```text
//! ComputeProvider (trait)
//!   ├── ScalewayClient      Instance API v1 over HTTPS
//!   └── testing::FakeProvider (feature "testing")
//!
//! inventory::list_all()     paged listing until an empty page
//! lifecycle::provision()    create → user data → power on (3m)
//! lifecycle::deprovision()  power off (5m) → delete → release volumes
//! ```
//!
//! No call in this crate retries. Failures surface to the caller with the
//! stage they happened in.

pub mod api;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod scaleway;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::{ComputeProvider, CreateRequest, ListFilter, PowerAction, ServerPage};
pub use error::{ProviderError, ProviderResult};
pub use inventory::{Inventory, PAGE_SIZE, list_all};
pub use lifecycle::{
    ProvisionError, ProvisionStage, Teardown, TeardownError, TeardownStage, deprovision,
    provision,
};
pub use scaleway::ScalewayClient;
