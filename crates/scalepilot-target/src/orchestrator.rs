//! Scale-up and scale-down batches.

use std::sync::Arc;

use scalepilot_cluster::ClusterCoordinator;
use scalepilot_core::{Blueprint, ConfigMap, PostCreateOptions};
use scalepilot_provider::ComputeProvider;
use tracing::{info, warn};

use crate::error::{TargetError, TargetResult};
use crate::pool::{Batch, WorkUnit, run_batch};
use crate::scale_in::{post_scale_in, select_candidates};

/// Create `n` instances from `blueprint`.
pub async fn scale_up(
    provider: Arc<dyn ComputeProvider>,
    blueprint: Blueprint,
    options: PostCreateOptions,
    n: i64,
) -> TargetResult<Batch> {
    if n < 0 {
        return Err(TargetError::NegativeCount(n));
    }
    info!(count = n, "scaling up");

    let blueprint = Arc::new(blueprint);
    let options = Arc::new(options);
    let units = (0..n)
        .map(|_| WorkUnit::Create {
            blueprint: Arc::clone(&blueprint),
            options: Arc::clone(&options),
        })
        .collect();
    run_batch(provider, units).await
}

/// Remove `n` instances picked by the cluster coordinator.
///
/// Every selected node is handed to the post-scale-in hook, including
/// nodes whose deletion failed, so none is left draining in the cluster.
pub async fn scale_down(
    provider: Arc<dyn ComputeProvider>,
    cluster: &dyn ClusterCoordinator,
    blueprint: &Blueprint,
    config: &ConfigMap,
    n: i64,
) -> TargetResult<Batch> {
    if n < 0 {
        return Err(TargetError::NegativeCount(n));
    }
    if n == 0 {
        return Ok(Batch::default());
    }
    info!(count = n, "scaling down");

    let selected = select_candidates(&provider, cluster, blueprint, config, n as usize).await?;
    let units = selected
        .iter()
        .map(|s| WorkUnit::Delete {
            instance: s.instance.clone(),
        })
        .collect();
    let batch = run_batch(provider, units).await?;

    let failed = batch.outcomes.iter().filter(|o| o.is_failure()).count();
    if failed > 0 {
        warn!(failed, "some scale-in deletions failed, releasing their nodes anyway");
    }
    let nodes: Vec<_> = selected.into_iter().map(|s| s.node).collect();
    post_scale_in(cluster, config, &nodes).await?;

    Ok(batch)
}
