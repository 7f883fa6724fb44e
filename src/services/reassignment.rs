//! # Reassignment Service
//!
//! Moves a task between assignees, keeping an append-only history and
//! notifying both parties.

use crate::error::{Result, WorkflowEngineError};
use crate::models::{Notification, ReassignmentRecord, Task};
use crate::repository::TaskRepository;
use crate::services::NotificationService;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

pub struct ReassignmentService {
    tasks: Arc<dyn TaskRepository>,
    notifications: Arc<NotificationService>,
    history: DashMap<String, Vec<ReassignmentRecord>>,
}

impl ReassignmentService {
    pub fn new(tasks: Arc<dyn TaskRepository>, notifications: Arc<NotificationService>) -> Self {
        Self {
            tasks,
            notifications,
            history: DashMap::new(),
        }
    }

    /// Reassign a task, recording history and notifying the previous and new
    /// assignees. Returns the updated task.
    pub async fn reassign(
        &self,
        task_id: &str,
        to_user: &str,
        reason: &str,
        reassigned_by: &str,
    ) -> Result<Task> {
        let mut task = self
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| WorkflowEngineError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;

        if task.status.is_terminal() {
            return Err(WorkflowEngineError::Validation {
                message: format!("cannot reassign task {task_id} in terminal state"),
            });
        }
        if task.assigned_to.as_deref() == Some(to_user) {
            return Err(WorkflowEngineError::Validation {
                message: format!("task {task_id} is already assigned to {to_user}"),
            });
        }

        let from_user = task.assigned_to.clone();
        task.assigned_to = Some(to_user.to_string());
        let task = self.tasks.update(task).await?;

        let record = ReassignmentRecord {
            task_id: task_id.to_string(),
            from_user: from_user.clone(),
            to_user: to_user.to_string(),
            reason: reason.to_string(),
            reassigned_by: reassigned_by.to_string(),
            timestamp: Utc::now(),
        };
        self.history
            .entry(task_id.to_string())
            .or_default()
            .push(record);

        info!(task_id, from = ?from_user, to = to_user, "task reassigned");

        if let Some(from) = &from_user {
            self.notifications.notify(
                Notification::new(
                    from,
                    "reassignment",
                    "Task reassigned away",
                    format!("Task '{}' was reassigned to {to_user}: {reason}", task.title),
                )
                .for_task(task_id),
            );
        }
        self.notifications.notify(
            Notification::new(
                to_user,
                "reassignment",
                "Task assigned to you",
                format!("Task '{}' was assigned to you: {reason}", task.title),
            )
            .for_task(task_id),
        );

        Ok(task)
    }

    pub fn history(&self, task_id: &str) -> Vec<ReassignmentRecord> {
        self.history
            .get(task_id)
            .map(|h| h.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TaskStatus;
    use crate::repository::InMemoryRepository;

    async fn setup() -> (Arc<InMemoryRepository>, Arc<NotificationService>, ReassignmentService) {
        let repo = Arc::new(InMemoryRepository::new());
        let notifications = Arc::new(NotificationService::new(100));
        repo.create(Task::new("t1", "s1", "c1", "Depose witness").with_assignee("alice"))
            .await
            .unwrap();
        let service = ReassignmentService::new(repo.clone(), notifications.clone());
        (repo, notifications, service)
    }

    #[tokio::test]
    async fn test_reassign_updates_task_history_and_notifies_both() {
        let (repo, notifications, service) = setup().await;

        let task = service
            .reassign("t1", "bob", "workload balancing", "manager")
            .await
            .unwrap();
        assert_eq!(task.assigned_to.as_deref(), Some("bob"));

        let stored = TaskRepository::find_by_id(repo.as_ref(), "t1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.assigned_to.as_deref(), Some("bob"));

        let history = service.history("t1");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_user.as_deref(), Some("alice"));
        assert_eq!(history[0].to_user, "bob");

        assert_eq!(notifications.unread_count("alice"), 1);
        assert_eq!(notifications.unread_count("bob"), 1);
    }

    #[tokio::test]
    async fn test_reassign_to_current_assignee_rejected() {
        let (_repo, _notifications, service) = setup().await;
        let err = service
            .reassign("t1", "alice", "noop", "manager")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_reassign_terminal_task_rejected() {
        let (repo, _notifications, service) = setup().await;
        let mut task = TaskRepository::find_by_id(repo.as_ref(), "t1")
            .await
            .unwrap()
            .unwrap();
        task.status = TaskStatus::Done;
        TaskRepository::update(repo.as_ref(), task).await.unwrap();

        assert!(service.reassign("t1", "bob", "late", "manager").await.is_err());
    }
}
