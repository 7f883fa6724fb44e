//! Escalation rules and events for overdue tasks.

use crate::constants::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRule {
    pub id: String,
    /// Hours a task must be overdue before this rule fires.
    pub trigger_hours_overdue: f64,
    /// Escalation level never exceeds this.
    pub max_escalation_level: u32,
    pub escalate_to_user: Option<String>,
    pub escalate_to_role: Option<String>,
    /// Reassign the task to `escalate_to_user` when escalating.
    pub auto_reassign: bool,
    pub notify_original_assignee: bool,
    /// Restrict the rule to tasks at or above this priority.
    pub min_priority: Option<Priority>,
}

impl EscalationRule {
    pub fn applies_to(&self, priority: Priority) -> bool {
        self.min_priority.is_none_or(|min| priority >= min)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationEvent {
    pub id: String,
    pub task_id: String,
    pub rule_id: String,
    pub level: u32,
    pub escalated_at: DateTime<Utc>,
    pub escalated_to: Option<String>,
    pub resolved: bool,
}
