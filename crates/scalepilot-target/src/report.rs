//! What a scale call did, unit by unit.

use scalepilot_core::{InstanceId, ScaleDirection, VolumeId};
use serde::Serialize;

/// Result of one work unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnitOutcome {
    Created {
        instance_id: InstanceId,
    },
    Deleted {
        instance_id: InstanceId,
        released_volumes: Vec<VolumeId>,
    },
    Failed {
        /// The instance the unit targeted, if it exists remotely.
        instance_id: Option<InstanceId>,
        error: String,
    },
}

impl UnitOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, UnitOutcome::Failed { .. })
    }
}

/// Summary of a `Target::scale` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleReport {
    pub direction: ScaleDirection,
    pub dry_run: bool,
    /// Instances listed before acting. Zero when nothing was listed.
    pub observed: i64,
    /// Requested count minus `observed`.
    pub delta: i64,
    /// Workers started for the batch.
    pub workers: usize,
    pub outcomes: Vec<UnitOutcome>,
}

impl ScaleReport {
    /// A report for a call that made no provider calls.
    pub fn skipped(direction: ScaleDirection, dry_run: bool) -> Self {
        Self {
            direction,
            dry_run,
            observed: 0,
            delta: 0,
            workers: 0,
            outcomes: Vec::new(),
        }
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.len() - self.failed()
    }
}
