use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Duration;

/// Per-unit state as drawn on the progress grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitState {
    Processing,
    Processed,
    /// The device refused the discard for this unit; the job carried on
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub completed: usize,
    pub total: usize,
    pub throughput_bps: Option<f64>,
    pub eta: Option<Duration>,
}

impl ProgressReport {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 * 100.0 / self.total as f64
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Completed { message: String },
    Failed { error: String },
    Cancelled,
}

/// Everything a job reports, in emission order.
///
/// Unit events arrive with non-decreasing unit numbers and every job ends
/// with exactly one `Finished`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrimEvent {
    UnitState {
        unit: usize,
        cells: Range<usize>,
        state: UnitState,
    },
    Progress(ProgressReport),
    Finished(JobOutcome),
}

impl TrimEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrimEvent::Finished(_))
    }
}
