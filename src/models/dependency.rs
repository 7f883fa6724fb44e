//! Task dependency records and start-readiness results.

use serde::{Deserialize, Serialize};

/// Kind of dependency edge between tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// Prerequisite must reach `done` before the dependent may start.
    Blocking,
    /// Advisory only, never blocks start.
    Informational,
}

/// The dependency edge set for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_id: String,
    pub depends_on: Vec<String>,
    pub dependency_type: DependencyType,
}

/// Result of a start-readiness check. Expected control flow, not an error:
/// a blocked task is a normal answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartCheck {
    pub can_start: bool,
    /// Blocking prerequisite task ids not yet done.
    pub blocked_by: Vec<String>,
}

impl StartCheck {
    pub fn ready() -> Self {
        Self {
            can_start: true,
            blocked_by: Vec::new(),
        }
    }

    pub fn blocked(blocked_by: Vec<String>) -> Self {
        Self {
            can_start: false,
            blocked_by,
        }
    }
}
