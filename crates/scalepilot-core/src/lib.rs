//! scalepilot-core: shared types and configuration decoding.
//!
//! The calling orchestrator hands every component the same flat
//! `String → String` map. This crate turns that map into typed values
//! (`Blueprint`, `PostCreateOptions`, `ProviderConfig`) and defines the
//! domain types the provider, cluster, and target crates exchange.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConfigMap, ProviderConfig};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
