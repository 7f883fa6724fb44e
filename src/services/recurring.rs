//! # Recurring Service
//!
//! Recurring workflow definitions and due processing. Fixed patterns advance
//! by calendar-ish intervals; the custom pattern follows a cron expression.

use crate::error::{Result, WorkflowEngineError};
use crate::models::{RecurrencePattern, RecurringWorkflow};
use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use dashmap::DashMap;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

pub struct RecurringService {
    workflows: DashMap<String, RecurringWorkflow>,
}

impl RecurringService {
    pub fn new() -> Self {
        Self {
            workflows: DashMap::new(),
        }
    }

    pub fn create(&self, mut workflow: RecurringWorkflow) -> Result<RecurringWorkflow> {
        if workflow.pattern == RecurrencePattern::Custom {
            let expr = workflow.cron_expression.as_deref().ok_or_else(|| {
                WorkflowEngineError::Validation {
                    message: "custom pattern requires a cron expression".into(),
                }
            })?;
            Schedule::from_str(expr).map_err(|e| WorkflowEngineError::Validation {
                message: format!("invalid cron expression '{expr}': {e}"),
            })?;
        }
        if workflow.tasks.is_empty() {
            return Err(WorkflowEngineError::Validation {
                message: "recurring workflow requires at least one task template".into(),
            });
        }
        if workflow.id.is_empty() {
            workflow.id = Uuid::new_v4().to_string();
        }
        self.workflows.insert(workflow.id.clone(), workflow.clone());
        Ok(workflow)
    }

    pub fn get(&self, id: &str) -> Option<RecurringWorkflow> {
        self.workflows.get(id).map(|w| w.clone())
    }

    pub fn list(&self) -> Vec<RecurringWorkflow> {
        self.workflows.iter().map(|e| e.value().clone()).collect()
    }

    pub fn remove(&self, id: &str) -> bool {
        self.workflows.remove(id).is_some()
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let mut workflow =
            self.workflows
                .get_mut(id)
                .ok_or_else(|| WorkflowEngineError::Validation {
                    message: format!("no recurring workflow {id}"),
                })?;
        workflow.enabled = enabled;
        Ok(())
    }

    /// Collect enabled workflows whose `next_run` has arrived, advancing each
    /// schedule and stamping `last_run`. Returns the fired definitions so the
    /// orchestrator can instantiate their tasks.
    pub fn process_due(&self, now: DateTime<Utc>) -> Result<Vec<RecurringWorkflow>> {
        let due_ids: Vec<String> = self
            .workflows
            .iter()
            .filter(|e| e.value().enabled && e.value().next_run <= now)
            .map(|e| e.key().clone())
            .collect();

        let mut fired = Vec::new();
        for id in due_ids {
            if let Some(mut workflow) = self.workflows.get_mut(&id) {
                let next = next_run_after(&workflow, now)?;
                workflow.last_run = Some(now);
                workflow.next_run = next;
                info!(
                    workflow_id = %workflow.id,
                    name = %workflow.name,
                    next_run = %next,
                    "recurring workflow due"
                );
                fired.push(workflow.clone());
            }
        }
        Ok(fired)
    }
}

impl Default for RecurringService {
    fn default() -> Self {
        Self::new()
    }
}

fn next_run_after(workflow: &RecurringWorkflow, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let next = match workflow.pattern {
        RecurrencePattern::Daily => now + Duration::days(1),
        RecurrencePattern::Weekly => now + Duration::days(7),
        RecurrencePattern::Monthly => now + Duration::days(30),
        RecurrencePattern::Quarterly => now + Duration::days(91),
        RecurrencePattern::Yearly => now + Duration::days(365),
        RecurrencePattern::Custom => {
            let expr = workflow.cron_expression.as_deref().ok_or_else(|| {
                WorkflowEngineError::Validation {
                    message: "custom pattern requires a cron expression".into(),
                }
            })?;
            let schedule =
                Schedule::from_str(expr).map_err(|e| WorkflowEngineError::Validation {
                    message: format!("invalid cron expression '{expr}': {e}"),
                })?;
            schedule
                .after(&now)
                .next()
                .ok_or_else(|| WorkflowEngineError::Validation {
                    message: format!("cron expression '{expr}' yields no future run"),
                })?
        }
    };
    Ok(next)
}
