//! Task record as stored by the persistence collaborator.

use crate::constants::{Priority, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub stage_id: String,
    pub case_id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assigned_to: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub started_date: Option<DateTime<Utc>>,
    pub completed_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: f64,
    pub sla_warning: bool,
}

impl Task {
    /// Create a pending task with no assignee and no due date.
    pub fn new(
        id: impl Into<String>,
        stage_id: impl Into<String>,
        case_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            stage_id: stage_id.into(),
            case_id: case_id.into(),
            title: title.into(),
            status: TaskStatus::Pending,
            priority: Priority::default(),
            assigned_to: None,
            due_date: None,
            started_date: None,
            completed_date: None,
            estimated_hours: None,
            actual_hours: 0.0,
            sla_warning: false,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_assignee(mut self, user_id: impl Into<String>) -> Self {
        self.assigned_to = Some(user_id.into());
        self
    }

    /// Hours past the due date at `now`. Negative values mean not yet due;
    /// tasks without a due date are never overdue.
    pub fn hours_overdue(&self, now: DateTime<Utc>) -> Option<f64> {
        self.due_date
            .map(|due| (now - due).num_seconds() as f64 / 3600.0)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.hours_overdue(now).is_some_and(|h| h > 0.0)
    }
}
