//! # Escalation Service
//!
//! Escalates tasks that stay overdue past a rule's trigger threshold, at
//! increasing severity levels. Driven by the scheduled sweep; escalations are
//! resolved when the task completes.

use crate::error::{Result, WorkflowEngineError};
use crate::models::{EscalationEvent, EscalationRule, Notification};
use crate::repository::{TaskFilter, TaskRepository};
use crate::services::{NotificationService, ReassignmentService};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct EscalationService {
    tasks: Arc<dyn TaskRepository>,
    notifications: Arc<NotificationService>,
    reassignment: Arc<ReassignmentService>,
    rules: DashMap<String, EscalationRule>,
    /// task id -> escalation events, oldest first.
    events: DashMap<String, Vec<EscalationEvent>>,
}

impl EscalationService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        notifications: Arc<NotificationService>,
        reassignment: Arc<ReassignmentService>,
    ) -> Self {
        Self {
            tasks,
            notifications,
            reassignment,
            rules: DashMap::new(),
            events: DashMap::new(),
        }
    }

    pub fn add_rule(&self, mut rule: EscalationRule) -> Result<EscalationRule> {
        if rule.trigger_hours_overdue <= 0.0 {
            return Err(WorkflowEngineError::Validation {
                message: "trigger_hours_overdue must be positive".into(),
            });
        }
        if rule.max_escalation_level == 0 {
            return Err(WorkflowEngineError::Validation {
                message: "max_escalation_level must be at least 1".into(),
            });
        }
        if rule.auto_reassign && rule.escalate_to_user.is_none() {
            return Err(WorkflowEngineError::Validation {
                message: "auto_reassign requires escalate_to_user".into(),
            });
        }
        if rule.id.is_empty() {
            rule.id = Uuid::new_v4().to_string();
        }
        self.rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    pub fn get_rules(&self) -> Vec<EscalationRule> {
        self.rules.iter().map(|e| e.value().clone()).collect()
    }

    pub fn remove_rule(&self, rule_id: &str) -> bool {
        self.rules.remove(rule_id).is_some()
    }

    /// Sweep all overdue, non-terminal tasks and escalate where a rule's
    /// trigger is exceeded and the level ceiling not yet reached. Idempotent
    /// per sweep: a task with an open escalation only escalates again once
    /// another full trigger window has elapsed since the last event.
    pub async fn check_and_escalate(&self, now: DateTime<Utc>) -> Result<Vec<EscalationEvent>> {
        let filter = TaskFilter::default().due_before(now);
        let tasks = self.tasks.find_all(&filter).await?;

        let mut escalated = Vec::new();
        for task in tasks {
            if task.status.is_terminal() {
                continue;
            }
            let hours_overdue = match task.hours_overdue(now) {
                Some(h) if h > 0.0 => h,
                _ => continue,
            };

            let rule = match self
                .rules
                .iter()
                .find(|r| r.value().applies_to(task.priority))
                .map(|r| r.value().clone())
            {
                Some(rule) => rule,
                None => continue,
            };
            if hours_overdue < rule.trigger_hours_overdue {
                continue;
            }

            let (current_level, last_escalated_at) = {
                let open: Option<EscalationEvent> = self
                    .events
                    .get(task.id.as_str())
                    .and_then(|events| events.iter().rev().find(|e| !e.resolved).cloned());
                match open {
                    Some(e) => (e.level, Some(e.escalated_at)),
                    None => (0, None),
                }
            };
            if current_level >= rule.max_escalation_level {
                continue;
            }
            // Re-escalate only after another trigger window has passed.
            if let Some(last) = last_escalated_at {
                let hours_since = (now - last).num_seconds() as f64 / 3600.0;
                if hours_since < rule.trigger_hours_overdue {
                    continue;
                }
            }

            let escalated_to = rule
                .escalate_to_user
                .clone()
                .or_else(|| rule.escalate_to_role.clone());
            let event = EscalationEvent {
                id: Uuid::new_v4().to_string(),
                task_id: task.id.clone(),
                rule_id: rule.id.clone(),
                level: current_level + 1,
                escalated_at: now,
                escalated_to: escalated_to.clone(),
                resolved: false,
            };
            warn!(
                task_id = %task.id,
                level = event.level,
                hours_overdue,
                escalated_to = ?escalated_to,
                "task escalated"
            );
            self.events
                .entry(task.id.clone())
                .or_default()
                .push(event.clone());

            if rule.auto_reassign {
                if let Some(target) = &rule.escalate_to_user {
                    if task.assigned_to.as_deref() != Some(target.as_str()) {
                        // History and both-party notification come with the
                        // reassignment; its failure must not halt the sweep.
                        if let Err(e) = self
                            .reassignment
                            .reassign(
                                &task.id,
                                target,
                                &format!("escalation level {}", event.level),
                                "escalation",
                            )
                            .await
                        {
                            warn!(task_id = %task.id, error = %e, "escalation auto-reassign failed");
                        }
                    }
                }
            }

            if let Some(target) = &escalated_to {
                self.notifications.notify(
                    Notification::new(
                        target,
                        "escalation",
                        "Task escalated to you",
                        format!(
                            "Task '{}' is {hours_overdue:.1}h overdue (level {})",
                            task.title, event.level
                        ),
                    )
                    .for_task(&task.id),
                );
            }
            if rule.notify_original_assignee {
                if let Some(assignee) = &task.assigned_to {
                    self.notifications.notify(
                        Notification::new(
                            assignee,
                            "escalation",
                            "Your task was escalated",
                            format!(
                                "Task '{}' reached escalation level {}",
                                task.title, event.level
                            ),
                        )
                        .for_task(&task.id),
                    );
                }
            }

            escalated.push(event);
        }

        Ok(escalated)
    }

    /// Mark all open escalation events for a task resolved; called on task
    /// completion.
    pub fn resolve(&self, task_id: &str) -> usize {
        let mut resolved = 0;
        if let Some(mut events) = self.events.get_mut(task_id) {
            for event in events.iter_mut().filter(|e| !e.resolved) {
                event.resolved = true;
                resolved += 1;
            }
        }
        if resolved > 0 {
            info!(task_id, resolved, "escalations resolved");
        }
        resolved
    }

    pub fn events_for_task(&self, task_id: &str) -> Vec<EscalationEvent> {
        self.events
            .get(task_id)
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn open_events(&self) -> Vec<EscalationEvent> {
        self.events
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|e| !e.resolved)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
