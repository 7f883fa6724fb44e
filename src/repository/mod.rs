//! # Persistence Seam
//!
//! The relational persistence layer is an external collaborator; the engine
//! only consumes `find_by_id` / `find_all` / `create` / `update` against Task
//! and Stage records. These traits are that seam. [`InMemoryRepository`]
//! backs the test suite and embedded usage.

mod memory;

pub use memory::InMemoryRepository;

use crate::constants::{StageStatus, TaskStatus};
use crate::error::Result;
use crate::models::{Stage, Task};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Filter for task queries. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub case_id: Option<String>,
    pub stage_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<String>,
    /// Match only tasks whose due date is before this instant.
    pub due_before: Option<DateTime<Utc>>,
}

impl TaskFilter {
    pub fn for_case(case_id: impl Into<String>) -> Self {
        Self {
            case_id: Some(case_id.into()),
            ..Default::default()
        }
    }

    pub fn for_stage(stage_id: impl Into<String>) -> Self {
        Self {
            stage_id: Some(stage_id.into()),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn due_before(mut self, instant: DateTime<Utc>) -> Self {
        self.due_before = Some(instant);
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(case_id) = &self.case_id {
            if &task.case_id != case_id {
                return false;
            }
        }
        if let Some(stage_id) = &self.stage_id {
            if &task.stage_id != stage_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(assigned_to) = &self.assigned_to {
            if task.assigned_to.as_deref() != Some(assigned_to.as_str()) {
                return false;
            }
        }
        if let Some(due_before) = self.due_before {
            match task.due_date {
                Some(due) if due < due_before => {}
                _ => return false,
            }
        }
        true
    }
}

/// Filter for stage queries.
#[derive(Debug, Clone, Default)]
pub struct StageFilter {
    pub case_id: Option<String>,
    pub status: Option<StageStatus>,
}

impl StageFilter {
    pub fn for_case(case_id: impl Into<String>) -> Self {
        Self {
            case_id: Some(case_id.into()),
            status: None,
        }
    }

    pub fn matches(&self, stage: &Stage) -> bool {
        if let Some(case_id) = &self.case_id {
            if &stage.case_id != case_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if stage.status != status {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn find_by_id(&self, task_id: &str) -> Result<Option<Task>>;
    async fn find_all(&self, filter: &TaskFilter) -> Result<Vec<Task>>;
    async fn create(&self, task: Task) -> Result<Task>;
    async fn update(&self, task: Task) -> Result<Task>;
}

#[async_trait]
pub trait StageRepository: Send + Sync {
    async fn find_by_id(&self, stage_id: &str) -> Result<Option<Stage>>;
    async fn find_all(&self, filter: &StageFilter) -> Result<Vec<Stage>>;
    async fn create(&self, stage: Stage) -> Result<Stage>;
    async fn update(&self, stage: Stage) -> Result<Stage>;
}
