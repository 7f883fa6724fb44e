//! Recurring workflow definitions.

use crate::constants::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    /// Schedule driven by `cron_expression`.
    Custom,
}

/// Template for one task created each time the workflow fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTaskTemplate {
    pub title: String,
    pub priority: Priority,
    pub estimated_hours: Option<f64>,
    pub assigned_to: Option<String>,
    /// Hours after the run in which the created task is due.
    pub due_in_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringWorkflow {
    pub id: String,
    pub case_id: String,
    pub stage_id: String,
    pub name: String,
    pub pattern: RecurrencePattern,
    /// Required when `pattern` is `Custom`.
    pub cron_expression: Option<String>,
    pub next_run: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub tasks: Vec<RecurringTaskTemplate>,
}
