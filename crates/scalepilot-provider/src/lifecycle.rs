//! Lifecycle driver: bring one server into or out of service.
//!
//! Both sequences are plain ordered step lists re-derived from remote state;
//! nothing is tracked locally between calls.
//!
//! ```text
//! provision:    Requested → Created → Configured → Running
//! deprovision:  Running → PoweredOff → Deleted → VolumesReleased
//! ```
//!
//! A failing step ends the sequence for that server only. The error records
//! the stage it stopped at so operators know what was left behind.

use std::fmt;
use std::time::Duration;

use scalepilot_core::{Blueprint, Instance, InstanceId, InstanceStatus, PostCreateOptions, VolumeId};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ComputeProvider, CreateRequest, PowerAction};
use crate::error::ProviderError;

/// Upper bound on waiting for a new server to report running.
pub const POWER_ON_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Upper bound on waiting for a server to report stopped.
pub const POWER_OFF_TIMEOUT: Duration = Duration::from_secs(5 * 60);

// ── Provisioning ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStage {
    Create,
    Configure,
    PowerOn,
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionStage::Create => f.write_str("create"),
            ProvisionStage::Configure => f.write_str("configure"),
            ProvisionStage::PowerOn => f.write_str("power on"),
        }
    }
}

/// Provisioning stopped at `stage`.
///
/// `instance_id` is set once the server exists remotely, in which case it
/// is left in place for the next reconcile.
#[derive(Debug, Error)]
#[error("provisioning failed at {stage} (server {}): {source}", .instance_id.as_deref().unwrap_or("not created"))]
pub struct ProvisionError {
    pub stage: ProvisionStage,
    pub instance_id: Option<InstanceId>,
    pub source: ProviderError,
}

/// Create a server from `blueprint`, apply user data, and power it on.
pub async fn provision(
    provider: &dyn ComputeProvider,
    blueprint: &Blueprint,
    options: &PostCreateOptions,
) -> Result<Instance, ProvisionError> {
    let request = CreateRequest::from_blueprint(blueprint);
    let mut instance = provider
        .create(&request)
        .await
        .map_err(|source| ProvisionError {
            stage: ProvisionStage::Create,
            instance_id: None,
            source,
        })?;
    debug!(server = %instance.id, zone = %instance.zone, "server created");

    let fail = |stage, source| ProvisionError {
        stage,
        instance_id: Some(instance.id.clone()),
        source,
    };

    if let Some(data) = &options.user_data {
        provider
            .set_user_data(&instance, data)
            .await
            .map_err(|e| fail(ProvisionStage::Configure, e))?;
        debug!(server = %instance.id, keys = data.len(), "user data applied");
    }

    provider
        .action_and_wait(&instance, PowerAction::PowerOn, POWER_ON_TIMEOUT)
        .await
        .map_err(|e| fail(ProvisionStage::PowerOn, e))?;

    instance.status = InstanceStatus::Running;
    info!(server = %instance.id, name = %instance.name, "server provisioned");
    Ok(instance)
}

// ── Deprovisioning ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownStage {
    PowerOff,
    Delete,
    ReleaseVolumes,
}

impl fmt::Display for TeardownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownStage::PowerOff => f.write_str("power off"),
            TeardownStage::Delete => f.write_str("delete"),
            TeardownStage::ReleaseVolumes => f.write_str("release volumes"),
        }
    }
}

/// A completed teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Teardown {
    pub instance_id: InstanceId,
    pub released_volumes: Vec<VolumeId>,
}

/// Teardown stopped at `stage`.
///
/// Volumes already released stay released. `remaining_volumes` lists the
/// ones still to clean up by hand, starting with the one that failed.
#[derive(Debug, Error)]
#[error(
    "teardown of server {instance_id} failed at {stage} ({} volumes released, {} remaining): {source}",
    .released_volumes.len(),
    .remaining_volumes.len()
)]
pub struct TeardownError {
    pub stage: TeardownStage,
    pub instance_id: InstanceId,
    pub released_volumes: Vec<VolumeId>,
    pub remaining_volumes: Vec<VolumeId>,
    pub source: ProviderError,
}

/// Power off, delete, then release every volume attached to `instance`.
///
/// The provider refuses to delete a running server or an attached volume,
/// so each step only starts after the previous one has completed.
pub async fn deprovision(
    provider: &dyn ComputeProvider,
    instance: &Instance,
) -> Result<Teardown, TeardownError> {
    let fail = |stage, released: &[VolumeId], remaining: &[VolumeId], source| TeardownError {
        stage,
        instance_id: instance.id.clone(),
        released_volumes: released.to_vec(),
        remaining_volumes: remaining.to_vec(),
        source,
    };

    provider
        .action_and_wait(instance, PowerAction::PowerOff, POWER_OFF_TIMEOUT)
        .await
        .map_err(|e| fail(TeardownStage::PowerOff, &[], &instance.volumes, e))?;
    debug!(server = %instance.id, "server powered off");

    provider
        .delete(instance)
        .await
        .map_err(|e| fail(TeardownStage::Delete, &[], &instance.volumes, e))?;
    debug!(server = %instance.id, "server deleted");

    for (i, volume) in instance.volumes.iter().enumerate() {
        if let Err(e) = provider.delete_volume(&instance.zone, volume).await {
            let (released, remaining) = instance.volumes.split_at(i);
            warn!(
                server = %instance.id,
                volume = %volume,
                remaining = remaining.len(),
                "volume release failed, leaving remaining volumes"
            );
            return Err(fail(TeardownStage::ReleaseVolumes, released, remaining, e));
        }
    }

    info!(
        server = %instance.id,
        volumes = instance.volumes.len(),
        "server deprovisioned"
    );
    Ok(Teardown {
        instance_id: instance.id.clone(),
        released_volumes: instance.volumes.clone(),
    })
}
