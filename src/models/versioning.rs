//! Workflow template version snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowVersion {
    pub id: String,
    pub template_id: String,
    /// Monotonic per template, starting at 1.
    pub version: u32,
    /// Snapshot of the template's stage definitions.
    pub stages: Value,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub change_note: Option<String>,
    /// At most one active version per template.
    pub is_active: bool,
}

/// Stage-level difference between two versions of a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl StageDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}
