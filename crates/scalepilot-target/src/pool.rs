//! Bounded worker pool.
//!
//! A batch of work units is drained by `min(units, MAX_WORKERS)` tasks
//! pulling from one shared queue. Each unit runs its lifecycle sequence to
//! completion; a failing unit is logged and recorded, never retried, and
//! does not stop its siblings. `run_batch` returns once every worker has
//! exited.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use scalepilot_core::{Blueprint, Instance, PostCreateOptions};
use scalepilot_provider::{ComputeProvider, deprovision, provision};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{TargetError, TargetResult};
use crate::report::UnitOutcome;

/// Upper bound on concurrent lifecycle sequences per batch.
pub const MAX_WORKERS: usize = 5;

/// One instance to bring into or take out of service.
#[derive(Debug, Clone)]
pub enum WorkUnit {
    Create {
        blueprint: Arc<Blueprint>,
        options: Arc<PostCreateOptions>,
    },
    Delete {
        instance: Instance,
    },
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkUnit::Create { .. } => f.write_str("create"),
            WorkUnit::Delete { instance } => write!(f, "delete {}", instance.id),
        }
    }
}

/// Outcome of a drained batch.
#[derive(Debug, Default)]
pub struct Batch {
    pub workers: usize,
    pub outcomes: Vec<UnitOutcome>,
}

/// Number of workers started for `units` work units.
pub fn worker_count(units: usize) -> usize {
    units.min(MAX_WORKERS)
}

/// Run every unit against `provider` and wait for all workers to exit.
pub async fn run_batch(
    provider: Arc<dyn ComputeProvider>,
    units: Vec<WorkUnit>,
) -> TargetResult<Batch> {
    let workers = worker_count(units.len());
    if workers == 0 {
        return Ok(Batch::default());
    }
    debug!(units = units.len(), workers, "starting batch");

    let queue = Arc::new(Mutex::new(VecDeque::from(units)));
    let handles: Vec<JoinHandle<Vec<UnitOutcome>>> = (0..workers)
        .map(|worker| {
            let queue = Arc::clone(&queue);
            let provider = Arc::clone(&provider);
            tokio::spawn(async move {
                let mut outcomes = Vec::new();
                loop {
                    let Some(unit) = queue.lock().await.pop_front() else {
                        break;
                    };
                    outcomes.push(execute(provider.as_ref(), unit, worker).await);
                }
                debug!(worker, units = outcomes.len(), "worker finished");
                outcomes
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        let worker_outcomes = handle
            .await
            .map_err(|e| TargetError::Worker(e.to_string()))?;
        outcomes.extend(worker_outcomes);
    }

    Ok(Batch { workers, outcomes })
}

async fn execute(provider: &dyn ComputeProvider, unit: WorkUnit, worker: usize) -> UnitOutcome {
    match unit {
        WorkUnit::Create { blueprint, options } => {
            match provision(provider, &blueprint, &options).await {
                Ok(instance) => {
                    info!(worker, server = %instance.id, "instance created");
                    UnitOutcome::Created {
                        instance_id: instance.id,
                    }
                }
                Err(e) => {
                    error!(worker, stage = %e.stage, error = %e, "failed to create instance");
                    UnitOutcome::Failed {
                        instance_id: e.instance_id.clone(),
                        error: e.to_string(),
                    }
                }
            }
        }
        WorkUnit::Delete { instance } => match deprovision(provider, &instance).await {
            Ok(teardown) => {
                info!(worker, server = %teardown.instance_id, "instance deleted");
                UnitOutcome::Deleted {
                    instance_id: teardown.instance_id,
                    released_volumes: teardown.released_volumes,
                }
            }
            Err(e) => {
                error!(
                    worker,
                    server = %e.instance_id,
                    stage = %e.stage,
                    error = %e,
                    "failed to delete instance"
                );
                UnitOutcome::Failed {
                    instance_id: Some(e.instance_id.clone()),
                    error: e.to_string(),
                }
            }
        },
    }
}
