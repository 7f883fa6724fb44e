//! # Time Tracking Service
//!
//! Per-assignee task timers. One timer may run per (task, user); stopping a
//! timer folds the elapsed hours into the task's `actual_hours`.

use crate::error::{Result, WorkflowEngineError};
use crate::models::{Task, TimeEntry};
use crate::repository::TaskRepository;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

pub struct TimeTrackingService {
    tasks: Arc<dyn TaskRepository>,
    /// (task id, user id) -> running timer.
    active: DashMap<(String, String), TimeEntry>,
    /// task id -> closed entries.
    entries: DashMap<String, Vec<TimeEntry>>,
}

impl TimeTrackingService {
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self {
            tasks,
            active: DashMap::new(),
            entries: DashMap::new(),
        }
    }

    pub async fn start_timer(&self, task_id: &str, user_id: &str) -> Result<TimeEntry> {
        if self.tasks.find_by_id(task_id).await?.is_none() {
            return Err(WorkflowEngineError::TaskNotFound {
                task_id: task_id.to_string(),
            });
        }
        let key = (task_id.to_string(), user_id.to_string());
        if self.active.contains_key(&key) {
            return Err(WorkflowEngineError::Validation {
                message: format!("timer already running for task {task_id} and user {user_id}"),
            });
        }
        let entry = TimeEntry::start(task_id, user_id);
        self.active.insert(key, entry.clone());
        debug!(task_id, user_id, "timer started");
        Ok(entry)
    }

    /// Stop a running timer, folding elapsed hours into the task. Returns the
    /// closed entry.
    pub async fn stop_timer(&self, task_id: &str, user_id: &str) -> Result<TimeEntry> {
        let key = (task_id.to_string(), user_id.to_string());
        let (_, mut entry) =
            self.active
                .remove(&key)
                .ok_or_else(|| WorkflowEngineError::Validation {
                    message: format!("no running timer for task {task_id} and user {user_id}"),
                })?;

        let now = Utc::now();
        let hours = (now - entry.started_at).num_seconds() as f64 / 3600.0;
        entry.stopped_at = Some(now);
        entry.hours = Some(hours);

        if let Some(mut task) = self.tasks.find_by_id(task_id).await? {
            task.actual_hours += hours;
            self.tasks.update(task).await?;
        }

        self.entries
            .entry(task_id.to_string())
            .or_default()
            .push(entry.clone());
        debug!(task_id, user_id, hours, "timer stopped");
        Ok(entry)
    }

    /// Stop every running timer on a task (stage pause, task completion).
    pub async fn stop_all_for_task(&self, task_id: &str) -> Result<Vec<TimeEntry>> {
        let users: Vec<String> = self
            .active
            .iter()
            .filter(|e| e.key().0 == task_id)
            .map(|e| e.key().1.clone())
            .collect();
        let mut stopped = Vec::new();
        for user in users {
            stopped.push(self.stop_timer(task_id, &user).await?);
        }
        Ok(stopped)
    }

    /// Restart timers for a task's assignee (stage resume).
    pub async fn restart_for_assignee(&self, task: &Task) -> Result<Option<TimeEntry>> {
        match &task.assigned_to {
            Some(user) => {
                let key = (task.id.clone(), user.clone());
                if self.active.contains_key(&key) {
                    return Ok(None);
                }
                Ok(Some(self.start_timer(&task.id, user).await?))
            }
            None => Ok(None),
        }
    }

    pub fn active_timers(&self) -> Vec<TimeEntry> {
        self.active.iter().map(|e| e.value().clone()).collect()
    }

    pub fn entries_for_task(&self, task_id: &str) -> Vec<TimeEntry> {
        self.entries
            .get(task_id)
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;

    async fn setup() -> (Arc<InMemoryRepository>, TimeTrackingService) {
        let repo = Arc::new(InMemoryRepository::new());
        repo.create(Task::new("t1", "s1", "c1", "Research precedent").with_assignee("alice"))
            .await
            .unwrap();
        let service = TimeTrackingService::new(repo.clone());
        (repo, service)
    }

    #[tokio::test]
    async fn test_start_stop_accumulates_hours() {
        let (repo, service) = setup().await;
        service.start_timer("t1", "alice").await.unwrap();
        let entry = service.stop_timer("t1", "alice").await.unwrap();
        assert!(entry.hours.unwrap() >= 0.0);

        let task = TaskRepository::find_by_id(repo.as_ref(), "t1")
            .await
            .unwrap()
            .unwrap();
        assert!(task.actual_hours >= 0.0);
        assert_eq!(service.entries_for_task("t1").len(), 1);
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let (_repo, service) = setup().await;
        service.start_timer("t1", "alice").await.unwrap();
        assert!(service.start_timer("t1", "alice").await.is_err());
    }

    #[tokio::test]
    async fn test_stop_without_start_rejected() {
        let (_repo, service) = setup().await;
        assert!(service.stop_timer("t1", "alice").await.is_err());
    }

    #[tokio::test]
    async fn test_stop_all_for_task() {
        let (_repo, service) = setup().await;
        service.start_timer("t1", "alice").await.unwrap();
        service.start_timer("t1", "bob").await.unwrap();
        let stopped = service.stop_all_for_task("t1").await.unwrap();
        assert_eq!(stopped.len(), 2);
        assert!(service.active_timers().is_empty());
    }
}
