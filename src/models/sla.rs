//! SLA rules and derived task SLA assessments.

use crate::constants::Priority;
use serde::{Deserialize, Serialize};

/// Per-priority SLA thresholds, in hours before the due date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaRule {
    pub priority: Priority,
    pub warning_hours: f64,
    pub breach_hours: f64,
    pub auto_notify: bool,
}

impl SlaRule {
    /// Seeded defaults per priority tier.
    pub fn default_for(priority: Priority) -> Self {
        let (warning_hours, breach_hours, auto_notify) = match priority {
            Priority::Critical => (4.0, 8.0, true),
            Priority::High => (24.0, 48.0, true),
            Priority::Medium => (72.0, 120.0, true),
            Priority::Low => (168.0, 336.0, false),
        };
        Self {
            priority,
            warning_hours,
            breach_hours,
            auto_notify,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaState {
    Ok,
    Warning,
    Breached,
}

/// SLA classification of one task at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaAssessment {
    pub task_id: String,
    pub status: SlaState,
    /// Hours until the due date; zero when already past due.
    pub hours_remaining: f64,
    /// Hours past the due date; zero when not yet due.
    pub hours_overdue: f64,
}

impl SlaAssessment {
    pub fn ok(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: SlaState::Ok,
            hours_remaining: 0.0,
            hours_overdue: 0.0,
        }
    }
}

/// One task flagged during a breach sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaFlag {
    pub task_id: String,
    pub case_id: String,
    pub priority: Priority,
    pub assigned_to: Option<String>,
    pub assessment: SlaAssessment,
}

/// Result of one `check_breaches` sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlaSweep {
    pub warnings: Vec<SlaFlag>,
    pub breaches: Vec<SlaFlag>,
}
