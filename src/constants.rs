//! # Workflow Constants
//!
//! Status enums, priority tiers, and lifecycle event names shared across the
//! engine. Wire representations are snake_case for tasks and the dashed form
//! for stages, matching the records the persistence collaborator stores.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Initial state when task is created
    Pending,
    /// Task is currently being worked
    InProgress,
    /// Task completed successfully
    Done,
    /// Task was skipped (e.g. via stage skip or conditional rule)
    Skipped,
    /// Task was cancelled
    Cancelled,
}

impl TaskStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped | Self::Cancelled)
    }

    /// Check if this state satisfies a blocking dependency
    pub fn satisfies_dependencies(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is an active state (task is being worked)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
            Self::Skipped => write!(f, "skipped"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "skipped" => Ok(Self::Skipped),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Stage lifecycle states. The wire form uses `in-progress` (dashed), which
/// is how stage records are stored upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for StageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Invalid stage status: {s}")),
        }
    }
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Task priority tiers. Ordering is by urgency: `Low < Medium < High <
/// Critical`, which lets SLA and escalation rules compare tiers directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// All tiers, lowest first. Used to seed per-priority rule tables.
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" | "low" => Ok(Self::Low),
            "Medium" | "medium" => Ok(Self::Medium),
            "High" | "high" => Ok(Self::High),
            "Critical" | "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid priority: {s}")),
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// Lifecycle event names published to the event bus and fanned out to
/// external integrations.
pub mod events {
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_ASSIGNED: &str = "task.assigned";
    pub const TASK_REASSIGNED: &str = "task.reassigned";
    pub const TASK_ESCALATED: &str = "task.escalated";
    pub const TASK_SKIPPED: &str = "task.skipped";
    pub const STAGE_INITIALIZED: &str = "stage.initialized";
    pub const STAGE_STARTED: &str = "stage.started";
    pub const STAGE_COMPLETED: &str = "stage.completed";
    pub const STAGE_SKIPPED: &str = "stage.skipped";
    pub const SLA_WARNING: &str = "sla.warning";
    pub const SLA_BREACHED: &str = "sla.breached";
    pub const APPROVAL_REQUESTED: &str = "approval.requested";
    pub const APPROVAL_COMPLETED: &str = "approval.completed";
    pub const APPROVAL_REJECTED: &str = "approval.rejected";
    pub const PARALLEL_GROUP_COMPLETED: &str = "parallel.group_completed";
    pub const RECURRING_TRIGGERED: &str = "recurring.triggered";
}

/// Source identifier included in every outbound integration payload.
pub mod system {
    pub const INTEGRATION_SOURCE: &str = "matterflow-core";
}
