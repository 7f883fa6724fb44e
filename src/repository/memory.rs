//! In-memory Task/Stage repository used by tests and embedded deployments.

use super::{StageFilter, StageRepository, TaskFilter, TaskRepository};
use crate::error::{Result, WorkflowEngineError};
use crate::models::{Stage, Task};
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tasks: DashMap<String, Task>,
    stages: DashMap<String, Stage>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

#[async_trait]
impl TaskRepository for InMemoryRepository {
    async fn find_by_id(&self, task_id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.get(task_id).map(|t| t.clone()))
    }

    async fn find_all(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut matched: Vec<Task> = self
            .tasks
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matched)
    }

    async fn create(&self, task: Task) -> Result<Task> {
        if self.tasks.contains_key(&task.id) {
            return Err(WorkflowEngineError::Validation {
                message: format!("task already exists: {}", task.id),
            });
        }
        self.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn update(&self, task: Task) -> Result<Task> {
        match self.tasks.get_mut(&task.id) {
            Some(mut entry) => {
                *entry = task.clone();
                Ok(task)
            }
            None => Err(WorkflowEngineError::TaskNotFound { task_id: task.id }),
        }
    }
}

#[async_trait]
impl StageRepository for InMemoryRepository {
    async fn find_by_id(&self, stage_id: &str) -> Result<Option<Stage>> {
        Ok(self.stages.get(stage_id).map(|s| s.clone()))
    }

    async fn find_all(&self, filter: &StageFilter) -> Result<Vec<Stage>> {
        let mut matched: Vec<Stage> = self
            .stages
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by_key(|s| s.order);
        Ok(matched)
    }

    async fn create(&self, stage: Stage) -> Result<Stage> {
        if self.stages.contains_key(&stage.id) {
            return Err(WorkflowEngineError::Validation {
                message: format!("stage already exists: {}", stage.id),
            });
        }
        self.stages.insert(stage.id.clone(), stage.clone());
        Ok(stage)
    }

    async fn update(&self, stage: Stage) -> Result<Stage> {
        match self.stages.get_mut(&stage.id) {
            Some(mut entry) => {
                *entry = stage.clone();
                Ok(stage)
            }
            None => Err(WorkflowEngineError::StageNotFound { stage_id: stage.id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TaskStatus;

    #[tokio::test]
    async fn test_task_crud_round_trip() {
        let repo = InMemoryRepository::new();
        let task = Task::new("t1", "s1", "c1", "Review contract");
        TaskRepository::create(&repo, task.clone()).await.unwrap();

        let found = TaskRepository::find_by_id(&repo, "t1").await.unwrap().unwrap();
        assert_eq!(found.title, "Review contract");

        let mut updated = found;
        updated.status = TaskStatus::InProgress;
        TaskRepository::update(&repo, updated).await.unwrap();

        let tasks = TaskRepository::find_all(&repo, &TaskFilter::for_case("c1").with_status(TaskStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let repo = InMemoryRepository::new();
        let task = Task::new("t1", "s1", "c1", "Review contract");
        TaskRepository::create(&repo, task.clone()).await.unwrap();
        assert!(TaskRepository::create(&repo, task).await.is_err());
    }

    #[tokio::test]
    async fn test_update_missing_task_fails() {
        let repo = InMemoryRepository::new();
        let task = Task::new("missing", "s1", "c1", "x");
        let err = TaskRepository::update(&repo, task).await.unwrap_err();
        assert_eq!(err.code(), "TASK_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_stage_filter_by_case() {
        let repo = InMemoryRepository::new();
        StageRepository::create(&repo, Stage::new("s1", "c1", "Discovery", 1)).await.unwrap();
        StageRepository::create(&repo, Stage::new("s2", "c2", "Filing", 1)).await.unwrap();

        let stages = StageRepository::find_all(&repo, &StageFilter::for_case("c1"))
            .await
            .unwrap();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].name, "Discovery");
    }
}
