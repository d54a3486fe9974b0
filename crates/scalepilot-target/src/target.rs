//! The target facade called by the orchestrator.
//!
//! `scale` and `status` re-derive everything from the provider on each
//! call; the pool state is the only thing kept between calls.

use std::sync::Arc;
use std::time::Duration;

use scalepilot_cluster::{ClusterCoordinator, PassthroughCluster};
use scalepilot_core::{
    Blueprint, ConfigMap, PostCreateOptions, ProviderConfig, ScaleDirection, ScalingAction,
    TargetStatus,
};
use scalepilot_provider::{ComputeProvider, ScalewayClient, list_all};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{TargetError, TargetResult};
use crate::orchestrator::{scale_down, scale_up};
use crate::pool::Batch;
use crate::report::ScaleReport;
use crate::state::StateGuard;

/// Name the target registers under.
pub const PLUGIN_NAME: &str = "scaleway";

/// Upper bound on the provider-facing part of one `scale` call.
pub const SCALE_DEADLINE: Duration = Duration::from_secs(60 * 60);

/// Identity reported to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: &'static str,
    pub plugin_type: &'static str,
    pub version: &'static str,
}

/// Autoscaling target for a pool of Scaleway instances.
pub struct Target {
    state: StateGuard,
    provider: Option<Arc<dyn ComputeProvider>>,
    cluster: Arc<dyn ClusterCoordinator>,
    deadline: Duration,
}

impl Default for Target {
    fn default() -> Self {
        Self::new()
    }
}

impl Target {
    /// An unconfigured target without a cluster manager.
    pub fn new() -> Self {
        Self {
            state: StateGuard::new(),
            provider: None,
            cluster: Arc::new(PassthroughCluster),
            deadline: SCALE_DEADLINE,
        }
    }

    /// A target wired to explicit backends. `set_config` is not needed.
    pub fn with_backends(
        provider: Arc<dyn ComputeProvider>,
        cluster: Arc<dyn ClusterCoordinator>,
    ) -> Self {
        Self {
            provider: Some(provider),
            cluster,
            ..Self::new()
        }
    }

    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterCoordinator>) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn plugin_info() -> PluginInfo {
        PluginInfo {
            name: PLUGIN_NAME,
            plugin_type: "target",
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn state(&self) -> &StateGuard {
        &self.state
    }

    /// Decode credentials from `config` and build the Scaleway client.
    pub fn set_config(&mut self, config: &ConfigMap) -> TargetResult<()> {
        debug!(keys = config.len(), "set config");
        let provider_config = ProviderConfig::from_config(config)?;
        let client = ScalewayClient::new(&provider_config)?;
        self.provider = Some(Arc::new(client));
        Ok(())
    }

    fn provider(&self) -> TargetResult<Arc<dyn ComputeProvider>> {
        self.provider.clone().ok_or(TargetError::NotConfigured)
    }

    /// Move the pool toward `action.count` instances.
    ///
    /// Dry runs and the `None` direction succeed immediately without
    /// taking the pool; any other call is rejected with `ScaleInProgress`
    /// while another one is running. Individual instance failures are
    /// logged and reported in the returned `ScaleReport`, not as an error.
    ///
    /// When the deadline elapses the call returns `DeadlineExceeded` and
    /// the pool goes back to Idle, but workers already started keep
    /// creating or deleting instances in the background. A scale issued
    /// right after may list the pool while they are still changing it.
    pub async fn scale(
        &self,
        action: ScalingAction,
        config: &ConfigMap,
    ) -> TargetResult<ScaleReport> {
        debug!(
            count = action.count,
            direction = %action.direction,
            reason = %action.reason,
            "received scale action"
        );
        if action.is_dry_run() {
            info!(direction = %action.direction, "dry run, nothing to do");
            return Ok(ScaleReport::skipped(action.direction, true));
        }

        let blueprint = Blueprint::from_config(config)?;
        let options = PostCreateOptions::from_config(config)?;
        if action.direction == ScaleDirection::None {
            return Ok(ScaleReport::skipped(ScaleDirection::None, false));
        }

        let _active = self.state.enter()?;
        let provider = self.provider()?;

        let converge = self.converge(provider, &action, blueprint, options, config);
        let report = match tokio::time::timeout(self.deadline, converge).await {
            Ok(report) => report?,
            Err(_) => {
                warn!(deadline = ?self.deadline, "scale deadline exceeded, workers continue in background");
                return Err(TargetError::DeadlineExceeded(self.deadline));
            }
        };

        info!(
            direction = %report.direction,
            observed = report.observed,
            delta = report.delta,
            workers = report.workers,
            failed = report.failed(),
            "scale finished"
        );
        Ok(report)
    }

    async fn converge(
        &self,
        provider: Arc<dyn ComputeProvider>,
        action: &ScalingAction,
        blueprint: Blueprint,
        options: PostCreateOptions,
        config: &ConfigMap,
    ) -> TargetResult<ScaleReport> {
        let inventory = list_all(provider.as_ref(), &blueprint).await?;
        let observed = inventory.count();
        let delta = action.count - observed;
        debug!(direction = %action.direction, observed, target = action.count, "scaling");

        let batch = match action.direction {
            ScaleDirection::Up => scale_up(provider, blueprint, options, delta).await?,
            ScaleDirection::Down => {
                scale_down(provider, self.cluster.as_ref(), &blueprint, config, -delta).await?
            }
            ScaleDirection::None => Batch::default(),
        };

        Ok(ScaleReport {
            direction: action.direction,
            dry_run: false,
            observed,
            delta,
            workers: batch.workers,
            outcomes: batch.outcomes,
        })
    }

    /// Report pool readiness and size.
    ///
    /// Not ready while a scale is in progress or while the cluster reports
    /// the pool unsettled; neither case lists the provider.
    pub async fn status(&self, config: &ConfigMap) -> TargetResult<TargetStatus> {
        if self.state.is_active() {
            debug!("scale in progress, reporting not ready");
            return Ok(TargetStatus::not_ready());
        }

        let blueprint = Blueprint::from_config(config)?;
        let provider = self.provider()?;

        if !self.cluster.is_pool_ready(config).await? {
            debug!("cluster pool not ready");
            return Ok(TargetStatus::not_ready());
        }

        let inventory = list_all(provider.as_ref(), &blueprint).await?;
        Ok(TargetStatus {
            ready: inventory.ready(),
            count: inventory.count(),
            meta: Default::default(),
        })
    }
}
