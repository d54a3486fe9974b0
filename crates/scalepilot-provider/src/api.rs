//! The provider capability surface.
//!
//! Six operations are all the orchestration core needs: paged listing,
//! create, user data, power actions with a bounded wait, delete, and
//! volume deletion.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use scalepilot_core::{Blueprint, Instance, InstanceStatus, PROVENANCE_TAGS, Zone};
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;

/// Power state transition requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerAction {
    #[serde(rename = "poweron")]
    PowerOn,
    #[serde(rename = "poweroff")]
    PowerOff,
}

impl PowerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PowerAction::PowerOn => "poweron",
            PowerAction::PowerOff => "poweroff",
        }
    }

    /// Whether `status` is the state this action settles in.
    pub fn is_reached(self, status: InstanceStatus) -> bool {
        match self {
            PowerAction::PowerOn => status == InstanceStatus::Running,
            PowerAction::PowerOff => status.is_stopped(),
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing filter derived from a blueprint's non-empty fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub name: Option<String>,
    pub zone: Option<Zone>,
    pub commercial_type: Option<String>,
    pub tags: Vec<String>,
}

impl ListFilter {
    /// Whether `instance` passes this filter.
    pub fn matches(&self, instance: &Instance) -> bool {
        self.name.as_ref().is_none_or(|n| &instance.name == n)
            && self.zone.as_ref().is_none_or(|z| &instance.zone == z)
            && self
                .commercial_type
                .as_ref()
                .is_none_or(|c| &instance.commercial_type == c)
            && self.tags.iter().all(|t| instance.tags.contains(t))
    }
}

impl From<&Blueprint> for ListFilter {
    fn from(bp: &Blueprint) -> Self {
        Self {
            name: Some(bp.name.clone()).filter(|n| !n.is_empty()),
            zone: bp.zone.clone(),
            commercial_type: Some(bp.commercial_type.clone()).filter(|c| !c.is_empty()),
            tags: bp.tags.clone(),
        }
    }
}

/// Everything the provider needs to create one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub name: String,
    /// Falls back to the provider's default zone when unset.
    pub zone: Option<Zone>,
    pub commercial_type: String,
    pub image: Option<String>,
    pub tags: Vec<String>,
    pub security_group: Option<String>,
    pub placement_group: Option<String>,
    pub dynamic_ip_required: bool,
    pub enable_ipv6: bool,
}

impl CreateRequest {
    /// Build a create request, making sure the provenance tags are present.
    pub fn from_blueprint(bp: &Blueprint) -> Self {
        let mut tags = bp.tags.clone();
        for tag in PROVENANCE_TAGS {
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }

        Self {
            name: bp.name.clone(),
            zone: bp.zone.clone(),
            commercial_type: bp.commercial_type.clone(),
            image: bp.image.clone(),
            tags,
            security_group: bp.security_group.clone(),
            placement_group: bp.placement_group.clone(),
            dynamic_ip_required: bp.dynamic_ip,
            enable_ipv6: bp.enable_ipv6,
        }
    }
}

/// One page of a server listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerPage {
    pub servers: Vec<Instance>,
    /// Total matching servers across all pages, as reported by the provider.
    pub total_count: u32,
}

/// Capability boundary to the remote compute provider.
///
/// Implementations must be shareable across worker tasks.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Fetch page `page` (1-based) of servers matching `filter`.
    async fn list_page(
        &self,
        filter: &ListFilter,
        page: u32,
        per_page: u32,
    ) -> ProviderResult<ServerPage>;

    /// Create a server. The returned instance exists but is not powered on.
    async fn create(&self, request: &CreateRequest) -> ProviderResult<Instance>;

    /// Replace the server's user data with exactly `data`.
    async fn set_user_data(
        &self,
        instance: &Instance,
        data: &BTreeMap<String, String>,
    ) -> ProviderResult<()>;

    /// Run a power action and block until it settles or `timeout` elapses.
    async fn action_and_wait(
        &self,
        instance: &Instance,
        action: PowerAction,
        timeout: Duration,
    ) -> ProviderResult<()>;

    /// Delete a stopped server. Its volumes are left behind.
    async fn delete(&self, instance: &Instance) -> ProviderResult<()>;

    /// Delete a detached volume.
    async fn delete_volume(&self, zone: &Zone, volume_id: &str) -> ProviderResult<()>;
}
