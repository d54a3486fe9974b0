//! Domain types shared across scalepilot crates.
//!
//! Instances are local copies of remote truth. They are rebuilt from a
//! fresh listing on every call and never cached between calls.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Provider-assigned identifier of a server.
pub type InstanceId = String;

/// Provider-assigned identifier of a storage volume.
pub type VolumeId = String;

/// Tags added to every instance this adapter creates.
pub const PROVENANCE_TAGS: [&str; 3] = ["nomad", "client", "autoscaler"];

/// Action count the orchestrator sends when it only wants a plan.
pub const DRY_RUN_COUNT: i64 = -1;

static ZONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}-[a-z]{3}-[1-9]$").expect("zone pattern is valid"));

// ── Zone ───────────────────────────────────────────────────────────

/// An availability zone such as `fr-par-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Zone(String);

impl Zone {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Zone {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let zone = match s {
            // Legacy identifiers still accepted by the API.
            "par1" => "fr-par-1",
            "ams1" => "nl-ams-1",
            other => other,
        };
        if ZONE_PATTERN.is_match(zone) {
            Ok(Zone(zone.to_string()))
        } else {
            Err(ConfigError::InvalidZone(s.to_string()))
        }
    }
}

impl TryFrom<String> for Zone {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Zone> for String {
    fn from(zone: Zone) -> Self {
        zone.0
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Blueprint ──────────────────────────────────────────────────────

/// Template for new instances and filter for inventory listings.
///
/// Built once per call from configuration and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    /// Exact server name filter; also the name given to new servers.
    pub name: String,
    pub zone: Option<Zone>,
    /// Machine type, e.g. `DEV1-S`.
    pub commercial_type: String,
    pub tags: Vec<String>,
    pub image: Option<String>,
    pub security_group: Option<String>,
    pub placement_group: Option<String>,
    pub dynamic_ip: bool,
    pub enable_ipv6: bool,
}

impl Blueprint {
    /// A blueprint that only filters by name.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// True when listing with this blueprint would return the whole pool.
    pub fn is_unfiltered(&self) -> bool {
        self.name.is_empty()
            && self.zone.is_none()
            && self.commercial_type.is_empty()
            && self.tags.is_empty()
    }
}

/// Options applied to a server after it is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCreateOptions {
    /// Key/value user data, values already resolved from files.
    pub user_data: Option<BTreeMap<String, String>>,
}

impl PostCreateOptions {
    pub fn is_empty(&self) -> bool {
        self.user_data.is_none()
    }
}

// ── Instance ───────────────────────────────────────────────────────

/// Lifecycle state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
    #[serde(rename = "stopped in place")]
    StoppedInPlace,
    Deleting,
    Locked,
    #[serde(other)]
    Unknown,
}

impl InstanceStatus {
    /// Whether the server is powered off (with or without its local volumes).
    pub fn is_stopped(self) -> bool {
        matches!(self, InstanceStatus::Stopped | InstanceStatus::StoppedInPlace)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::Starting => "starting",
            InstanceStatus::Running => "running",
            InstanceStatus::Stopping => "stopping",
            InstanceStatus::Stopped => "stopped",
            InstanceStatus::StoppedInPlace => "stopped in place",
            InstanceStatus::Deleting => "deleting",
            InstanceStatus::Locked => "locked",
            InstanceStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One remote server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub name: String,
    pub zone: Zone,
    pub commercial_type: String,
    pub tags: Vec<String>,
    pub status: InstanceStatus,
    /// Attached volumes, in attachment order.
    pub volumes: Vec<VolumeId>,
}

impl Instance {
    /// A bare reference to a server known only by id and zone.
    pub fn reference(id: &str, zone: Zone) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            zone,
            commercial_type: String::new(),
            tags: Vec::new(),
            status: InstanceStatus::Unknown,
            volumes: Vec::new(),
        }
    }
}

// ── Scaling ────────────────────────────────────────────────────────

/// Direction of a scaling action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleDirection {
    Up,
    Down,
    None,
}

impl FromStr for ScaleDirection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(ScaleDirection::Up),
            "down" => Ok(ScaleDirection::Down),
            "none" => Ok(ScaleDirection::None),
            _ => Err(ConfigError::InvalidDirection(s.to_string())),
        }
    }
}

impl fmt::Display for ScaleDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleDirection::Up => f.write_str("up"),
            ScaleDirection::Down => f.write_str("down"),
            ScaleDirection::None => f.write_str("none"),
        }
    }
}

/// A request from the orchestrator to move the pool to `count` instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingAction {
    pub count: i64,
    pub direction: ScaleDirection,
    #[serde(default)]
    pub reason: String,
}

impl ScalingAction {
    pub fn new(direction: ScaleDirection, count: i64) -> Self {
        Self {
            count,
            direction,
            reason: String::new(),
        }
    }

    pub fn dry_run(direction: ScaleDirection) -> Self {
        Self::new(direction, DRY_RUN_COUNT)
    }

    pub fn is_dry_run(&self) -> bool {
        self.count == DRY_RUN_COUNT
    }
}

/// Pool readiness reported back to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetStatus {
    pub ready: bool,
    pub count: i64,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl TargetStatus {
    pub fn not_ready() -> Self {
        Self::default()
    }
}
