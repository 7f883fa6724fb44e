//! Time tracking entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub task_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    /// Elapsed hours, set when the timer stops.
    pub hours: Option<f64>,
}

impl TimeEntry {
    pub fn start(task_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            user_id: user_id.into(),
            started_at: Utc::now(),
            stopped_at: None,
            hours: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.stopped_at.is_none()
    }
}
