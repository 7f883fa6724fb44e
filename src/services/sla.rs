//! # SLA Service
//!
//! Classifies tasks against per-priority SLA thresholds and runs the breach
//! sweep. A task is `warning` once the remaining time to its due date is
//! within the rule's warning window and `breached` once past due; done tasks
//! are always `ok`.

use crate::constants::Priority;
use crate::error::{Result, WorkflowEngineError};
use crate::models::{Notification, SlaAssessment, SlaFlag, SlaRule, SlaState, SlaSweep, Task};
use crate::repository::{TaskFilter, TaskRepository};
use crate::services::NotificationService;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct SlaService {
    tasks: Arc<dyn TaskRepository>,
    notifications: Arc<NotificationService>,
    rules: DashMap<Priority, SlaRule>,
}

impl SlaService {
    pub fn new(tasks: Arc<dyn TaskRepository>, notifications: Arc<NotificationService>) -> Self {
        let rules = DashMap::new();
        for priority in Priority::ALL {
            rules.insert(priority, SlaRule::default_for(priority));
        }
        Self {
            tasks,
            notifications,
            rules,
        }
    }

    pub fn get_rule(&self, priority: Priority) -> SlaRule {
        self.rules
            .get(&priority)
            .map(|r| r.clone())
            .unwrap_or_else(|| SlaRule::default_for(priority))
    }

    pub fn get_rules(&self) -> Vec<SlaRule> {
        Priority::ALL.iter().map(|p| self.get_rule(*p)).collect()
    }

    pub fn update_rule(&self, rule: SlaRule) -> Result<()> {
        if rule.warning_hours <= 0.0 || rule.breach_hours <= 0.0 {
            return Err(WorkflowEngineError::Sla {
                message: "SLA thresholds must be positive".into(),
            });
        }
        if rule.warning_hours >= rule.breach_hours {
            return Err(WorkflowEngineError::Sla {
                message: format!(
                    "warning_hours ({}) must be below breach_hours ({})",
                    rule.warning_hours, rule.breach_hours
                ),
            });
        }
        self.rules.insert(rule.priority, rule);
        Ok(())
    }

    /// Classify one task by id.
    pub async fn get_task_sla_status(&self, task_id: &str) -> Result<SlaAssessment> {
        let task = self
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| WorkflowEngineError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;
        Ok(self.assess(&task, Utc::now()))
    }

    /// Classify a task at a given instant. Done tasks and tasks without a
    /// due date are `ok`.
    pub fn assess(&self, task: &Task, now: DateTime<Utc>) -> SlaAssessment {
        if task.status.is_terminal() {
            return SlaAssessment::ok(&task.id);
        }
        let due = match task.due_date {
            Some(due) => due,
            None => return SlaAssessment::ok(&task.id),
        };

        let rule = self.get_rule(task.priority);
        let remaining_hours = (due - now).num_seconds() as f64 / 3600.0;

        if remaining_hours < 0.0 {
            SlaAssessment {
                task_id: task.id.clone(),
                status: SlaState::Breached,
                hours_remaining: 0.0,
                hours_overdue: -remaining_hours,
            }
        } else if remaining_hours <= rule.warning_hours {
            SlaAssessment {
                task_id: task.id.clone(),
                status: SlaState::Warning,
                hours_remaining: remaining_hours,
                hours_overdue: 0.0,
            }
        } else {
            SlaAssessment {
                task_id: task.id.clone(),
                status: SlaState::Ok,
                hours_remaining: remaining_hours,
                hours_overdue: 0.0,
            }
        }
    }

    /// Sweep all non-done tasks (optionally scoped to a case), persisting the
    /// `sla_warning` flag on newly breached tasks and notifying assignees
    /// where the rule auto-notifies. Safe to run concurrently with request
    /// flow: flag writes are idempotent.
    pub async fn check_breaches(&self, case_id: Option<&str>) -> Result<SlaSweep> {
        let now = Utc::now();
        let filter = match case_id {
            Some(case_id) => TaskFilter::for_case(case_id),
            None => TaskFilter::default(),
        };
        let tasks = self.tasks.find_all(&filter).await?;

        let mut sweep = SlaSweep::default();
        for task in tasks {
            if task.status.is_terminal() {
                continue;
            }
            let assessment = self.assess(&task, now);
            let flag = SlaFlag {
                task_id: task.id.clone(),
                case_id: task.case_id.clone(),
                priority: task.priority,
                assigned_to: task.assigned_to.clone(),
                assessment: assessment.clone(),
            };
            match assessment.status {
                SlaState::Warning => sweep.warnings.push(flag),
                SlaState::Breached => {
                    if !task.sla_warning {
                        let mut updated = task.clone();
                        updated.sla_warning = true;
                        self.tasks.update(updated).await?;
                        warn!(
                            task_id = %task.id,
                            hours_overdue = assessment.hours_overdue,
                            "SLA breached"
                        );
                    }
                    let rule = self.get_rule(task.priority);
                    if rule.auto_notify {
                        if let Some(assignee) = &task.assigned_to {
                            self.notifications.notify(
                                Notification::new(
                                    assignee,
                                    "sla_breach",
                                    "SLA breached",
                                    format!(
                                        "Task '{}' is {:.1}h past its due date",
                                        task.title, assessment.hours_overdue
                                    ),
                                )
                                .for_task(&task.id),
                            );
                        }
                    }
                    sweep.breaches.push(flag);
                }
                SlaState::Ok => {}
            }
        }

        info!(
            warnings = sweep.warnings.len(),
            breaches = sweep.breaches.len(),
            case_id = ?case_id,
            "SLA sweep complete"
        );
        Ok(sweep)
    }
}
