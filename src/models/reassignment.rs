//! Append-only reassignment history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignmentRecord {
    pub task_id: String,
    pub from_user: Option<String>,
    pub to_user: String,
    pub reason: String,
    pub reassigned_by: String,
    pub timestamp: DateTime<Utc>,
}
