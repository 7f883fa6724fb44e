//! # Parallel Service
//!
//! Parallel task groups: a set of tasks whose collective completion (by an
//! all/any/percentage rule) gates activation of a subsequent task. The
//! orchestrator reports completions here and activates `next_task_id` when
//! the group's rule is satisfied.

use crate::error::{Result, WorkflowEngineError};
use crate::models::{CompletionRule, GroupCompletion, ParallelGroup, ParallelGroupStatus};
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

pub struct ParallelService {
    groups: DashMap<String, ParallelGroup>,
    /// task id -> owning group id.
    task_index: DashMap<String, String>,
}

impl ParallelService {
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
            task_index: DashMap::new(),
        }
    }

    /// Create a group over at least two tasks. The percentage rule requires a
    /// threshold in (0, 100].
    pub fn create_group(
        &self,
        stage_id: &str,
        task_ids: Vec<String>,
        completion_rule: CompletionRule,
        completion_threshold: Option<f64>,
        next_task_id: Option<String>,
    ) -> Result<ParallelGroup> {
        if task_ids.len() < 2 {
            return Err(WorkflowEngineError::Validation {
                message: "parallel group requires at least two tasks".into(),
            });
        }
        if completion_rule == CompletionRule::Percentage {
            match completion_threshold {
                Some(t) if t > 0.0 && t <= 100.0 => {}
                _ => {
                    return Err(WorkflowEngineError::Validation {
                        message: "percentage rule requires a threshold in (0, 100]".into(),
                    })
                }
            }
        }
        for task_id in &task_ids {
            if self.task_index.contains_key(task_id) {
                return Err(WorkflowEngineError::Validation {
                    message: format!("task {task_id} already belongs to a parallel group"),
                });
            }
        }

        let group = ParallelGroup {
            id: Uuid::new_v4().to_string(),
            stage_id: stage_id.to_string(),
            task_ids: task_ids.clone(),
            completion_rule,
            completion_threshold,
            completed_tasks: Vec::new(),
            next_task_id,
            status: ParallelGroupStatus::InProgress,
        };
        for task_id in &task_ids {
            self.task_index.insert(task_id.clone(), group.id.clone());
        }
        self.groups.insert(group.id.clone(), group.clone());
        info!(
            group_id = %group.id,
            stage_id,
            tasks = group.task_ids.len(),
            rule = ?completion_rule,
            "parallel group created"
        );
        Ok(group)
    }

    /// Record a task completion. Returns the group completion when this
    /// completion satisfies the rule; repeat completions are idempotent and a
    /// task outside any group is a normal non-event.
    pub fn mark_task_complete(&self, task_id: &str) -> Option<GroupCompletion> {
        let group_id = self.task_index.get(task_id)?.clone();
        let mut group = self.groups.get_mut(&group_id)?;

        if group.status == ParallelGroupStatus::Completed {
            return None;
        }
        if !group.completed_tasks.iter().any(|t| t == task_id) {
            group.completed_tasks.push(task_id.to_string());
        }

        if group.is_satisfied() {
            group.status = ParallelGroupStatus::Completed;
            info!(
                group_id = %group.id,
                completed = group.completed_tasks.len(),
                total = group.task_ids.len(),
                next_task_id = ?group.next_task_id,
                "parallel group completed"
            );
            Some(GroupCompletion {
                group_id: group.id.clone(),
                stage_id: group.stage_id.clone(),
                next_task_id: group.next_task_id.clone(),
            })
        } else {
            None
        }
    }

    pub fn get_group(&self, group_id: &str) -> Option<ParallelGroup> {
        self.groups.get(group_id).map(|g| g.clone())
    }

    pub fn group_for_task(&self, task_id: &str) -> Option<ParallelGroup> {
        let group_id = self.task_index.get(task_id)?.clone();
        self.get_group(&group_id)
    }

    pub fn groups_for_stage(&self, stage_id: &str) -> Vec<ParallelGroup> {
        self.groups
            .iter()
            .filter(|entry| entry.value().stage_id == stage_id)
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl Default for ParallelService {
    fn default() -> Self {
        Self::new()
    }
}
