//! Outcome types returned by the orchestrator.

use crate::models::{EscalationEvent, SlaSweep};
use serde::{Deserialize, Serialize};

/// Result of a task start request. A blocked start is an expected outcome,
/// not an error; callers surface the prerequisite list to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    Blocked { blocked_by: Vec<String> },
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }
}

/// Aggregate result of one scheduled maintenance sweep. Individual check
/// failures land in `errors`; one failing check never aborts the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduledCheckReport {
    pub sla: SlaSweep,
    pub escalations: Vec<EscalationEvent>,
    /// Tasks instantiated from recurring workflows that came due.
    pub recurring_started: usize,
    pub errors: Vec<String>,
}

impl ScheduledCheckReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
