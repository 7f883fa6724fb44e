//! # Workflow Engine
//!
//! Composition root for the matter workflow engine. Owns every domain
//! service, wires them at construction (no runtime lookup), and implements
//! the cross-service flows: task start gating, completion fan-out, approval
//! driven completion, stage lifecycle, conditional branching, and the
//! scheduled maintenance sweep.
//!
//! Single-service operations are exposed as thin pass-throughs via the
//! service accessors; only flows that span services live here.

use crate::config::EngineConfig;
use crate::constants::{events, Priority, StageStatus, TaskStatus};
use crate::error::{Result, WorkflowEngineError};
use crate::events::EventPublisher;
use crate::models::{
    ApprovalChain, ApprovalDecision, ApprovalOutcome, AuditLogEntry, Notification, RuleAction,
    RuleMatch, Stage, Task,
};
use crate::orchestration::{RecoveryService, ScheduledCheckReport, StartOutcome};
use crate::repository::{StageRepository, TaskFilter, TaskRepository};
use crate::resilience::CircuitBreaker;
use crate::services::{
    AnalyticsService, ApprovalService, AuditService, ConditionalService, CustomFieldsService,
    DependencyService, EscalationService, ExternalIntegrationService, IntegrationDispatcher,
    IntegrationTransport, LoggingTransport, NotificationService, ParallelService,
    RecurringService, ReassignmentService, SlaService, TimeTrackingService, VersioningService,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct WorkflowEngine {
    tasks: Arc<dyn TaskRepository>,
    stages: Arc<dyn StageRepository>,
    config: EngineConfig,
    events: EventPublisher,
    notifications: Arc<NotificationService>,
    audit: Arc<AuditService>,
    dependencies: Arc<DependencyService>,
    sla: Arc<SlaService>,
    approvals: Arc<ApprovalService>,
    parallel: Arc<ParallelService>,
    conditional: Arc<ConditionalService>,
    escalation: Arc<EscalationService>,
    reassignment: Arc<ReassignmentService>,
    time_tracking: Arc<TimeTrackingService>,
    custom_fields: Arc<CustomFieldsService>,
    recurring: Arc<RecurringService>,
    versioning: Arc<VersioningService>,
    analytics: Arc<AnalyticsService>,
    integrations: Arc<ExternalIntegrationService>,
    dispatcher: IntegrationDispatcher,
    recovery: Arc<RecoveryService>,
    cache_evictor: tokio::task::JoinHandle<()>,
}

impl WorkflowEngine {
    /// Build an engine over the given persistence collaborators, with the
    /// log-only integration transport.
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        stages: Arc<dyn StageRepository>,
        config: EngineConfig,
    ) -> Result<Self> {
        Self::with_transport(tasks, stages, config, Arc::new(LoggingTransport))
    }

    /// Build an engine with a caller-supplied integration transport.
    pub fn with_transport(
        tasks: Arc<dyn TaskRepository>,
        stages: Arc<dyn StageRepository>,
        config: EngineConfig,
        transport: Arc<dyn IntegrationTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let notifications = Arc::new(NotificationService::new(config.notification_retention));
        let audit = Arc::new(AuditService::new(config.audit_capacity));
        let reassignment = Arc::new(ReassignmentService::new(
            tasks.clone(),
            notifications.clone(),
        ));
        let integrations = Arc::new(ExternalIntegrationService::new(
            transport,
            config.integration_breaker.clone(),
        ));
        let dispatcher = IntegrationDispatcher::spawn(
            integrations.clone(),
            config.integration_queue_capacity,
        );
        let analytics = Arc::new(AnalyticsService::new(tasks.clone(), stages.clone()));
        let cache_evictor = analytics.spawn_cache_evictor(config.sweep_interval);
        let recovery = Arc::new(RecoveryService::new(
            Arc::new(CircuitBreaker::new(
                "workflow-recovery",
                config.recovery_breaker.clone(),
            )),
            audit.clone(),
            config.max_retries,
        ));

        info!(
            max_retries = config.max_retries,
            sweep_interval_secs = config.sweep_interval.as_secs(),
            "workflow engine initialized"
        );

        Ok(Self {
            dependencies: Arc::new(DependencyService::new(tasks.clone())),
            sla: Arc::new(SlaService::new(tasks.clone(), notifications.clone())),
            approvals: Arc::new(ApprovalService::new(tasks.clone())),
            parallel: Arc::new(ParallelService::new()),
            conditional: Arc::new(ConditionalService::new()),
            escalation: Arc::new(EscalationService::new(
                tasks.clone(),
                notifications.clone(),
                reassignment.clone(),
            )),
            time_tracking: Arc::new(TimeTrackingService::new(tasks.clone())),
            custom_fields: Arc::new(CustomFieldsService::new()),
            recurring: Arc::new(RecurringService::new()),
            versioning: Arc::new(VersioningService::new()),
            analytics,
            events: EventPublisher::default(),
            reassignment,
            notifications,
            audit,
            integrations,
            dispatcher,
            recovery,
            cache_evictor,
            tasks,
            stages,
            config,
        })
    }

    // ---- task lifecycle ----------------------------------------------------

    pub async fn create_task(&self, task: Task) -> Result<Task> {
        let task = self.tasks.create(task).await?;
        self.audit
            .record(AuditLogEntry::new("task", &task.id, "created"));
        Ok(task)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.tasks
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| WorkflowEngineError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }

    /// Start a task. Incomplete blocking dependencies make this a `Blocked`
    /// outcome rather than an error; the prerequisite list is returned so the
    /// caller can surface it.
    pub async fn start_task(&self, task_id: &str) -> Result<StartOutcome> {
        let mut task = self.get_task(task_id).await?;
        if task.status.is_terminal() {
            return Err(WorkflowEngineError::Validation {
                message: format!("cannot start task {task_id} in terminal state"),
            });
        }

        let check = self.dependencies.can_start_task(task_id).await?;
        if !check.can_start {
            debug!(task_id, blocked_by = ?check.blocked_by, "task start blocked");
            return Ok(StartOutcome::Blocked {
                blocked_by: check.blocked_by,
            });
        }

        task.status = TaskStatus::InProgress;
        if task.started_date.is_none() {
            task.started_date = Some(Utc::now());
        }
        let task = self
            .recovery
            .execute_with_recovery(task_id, "start_task", || {
                let task = task.clone();
                async move { self.tasks.update(task).await }
            })
            .await?;

        if let Err(e) = self.mark_stage_in_progress(&task.stage_id).await {
            warn!(stage_id = %task.stage_id, error = %e, "stage status refresh failed");
        }
        if let Err(e) = self.time_tracking.restart_for_assignee(&task).await {
            warn!(task_id, error = %e, "timer start failed");
        }

        self.events
            .publish(events::TASK_STARTED, json!({ "task_id": task_id }));
        self.audit
            .record(AuditLogEntry::new("task", task_id, "started"));
        info!(task_id, "task started");
        Ok(StartOutcome::Started)
    }

    /// Complete a task. Validates that any approval chain is approved and
    /// that blocking dependencies are done, then runs the completion fan-out.
    /// Gate failures surface immediately; only the persistence write is
    /// retried through the recovery wrapper.
    pub async fn complete_task(&self, task_id: &str, user_id: Option<&str>) -> Result<Task> {
        let task = self.get_task(task_id).await?;
        if task.status.is_terminal() {
            return Err(WorkflowEngineError::Validation {
                message: format!("task {task_id} is already in terminal state"),
            });
        }

        if !self.approvals.completion_permitted(task_id) {
            return Err(WorkflowEngineError::Approval {
                message: format!("task {task_id} requires an approved approval chain"),
            });
        }
        let check = self.dependencies.can_start_task(task_id).await?;
        if !check.can_start {
            return Err(WorkflowEngineError::Dependency {
                task_id: task_id.to_string(),
                blocked_by: check.blocked_by,
            });
        }

        self.finalize_task(task, user_id).await
    }

    /// Mark a task done and run the post-completion fan-out. The approval
    /// path enters here directly once its chain is approved.
    async fn finalize_task(&self, mut task: Task, user_id: Option<&str>) -> Result<Task> {
        let task_id = task.id.clone();

        if let Err(e) = self.time_tracking.stop_all_for_task(&task_id).await {
            warn!(task_id, error = %e, "stopping timers on completion failed");
        }
        // Timers fold hours into the stored record; re-read before updating.
        if let Some(current) = self.tasks.find_by_id(&task_id).await? {
            task = current;
        }
        task.status = TaskStatus::Done;
        task.completed_date = Some(Utc::now());
        let task = self
            .recovery
            .execute_with_recovery(&task_id, "complete_task", || {
                let task = task.clone();
                async move { self.tasks.update(task).await }
            })
            .await?;

        let resolved = self.escalation.resolve(&task_id);
        if resolved > 0 {
            debug!(task_id, resolved, "open escalations resolved on completion");
        }

        if let Some(completion) = self.parallel.mark_task_complete(&task_id) {
            self.events.publish(
                events::PARALLEL_GROUP_COMPLETED,
                json!({ "group_id": completion.group_id, "stage_id": completion.stage_id }),
            );
            if let Some(next_task_id) = completion.next_task_id {
                match self.start_task(&next_task_id).await {
                    Ok(StartOutcome::Started) => {
                        info!(task_id = %next_task_id, "parallel group follow-up task started");
                    }
                    Ok(StartOutcome::Blocked { blocked_by }) => {
                        warn!(task_id = %next_task_id, ?blocked_by, "follow-up task still blocked");
                    }
                    Err(e) => {
                        warn!(task_id = %next_task_id, error = %e, "follow-up task start failed");
                    }
                }
            }
        }

        // Branching rules for the owning stage see the completed task.
        let context = json!({ "task": serde_json::to_value(&task).unwrap_or(Value::Null) });
        if let Err(e) = self
            .evaluate_stage_conditions(&task.stage_id, &context)
            .await
        {
            warn!(stage_id = %task.stage_id, error = %e, "conditional evaluation failed");
        }

        if let Err(e) = self.refresh_stage_progress(&task.stage_id).await {
            warn!(stage_id = %task.stage_id, error = %e, "stage progress refresh failed");
        }

        self.events
            .publish(events::TASK_COMPLETED, json!({ "task_id": task_id }));
        let payload = json!({
            "task_id": task_id,
            "case_id": task.case_id,
            "stage_id": task.stage_id,
            "title": task.title,
        });
        if let Err(e) = self.dispatcher.enqueue(events::TASK_COMPLETED, payload) {
            warn!(task_id, error = %e, "integration dispatch enqueue failed");
        }

        let mut entry = AuditLogEntry::new("task", &task_id, "completed");
        if let Some(user) = user_id {
            entry = entry.by_user(user);
        }
        self.audit.record(entry);
        info!(task_id, "task completed");
        Ok(task)
    }

    /// Recompute a stage's progress from its tasks. When every task is
    /// terminal and at least one is done, the stage completes.
    async fn refresh_stage_progress(&self, stage_id: &str) -> Result<()> {
        let mut stage = self.get_stage(stage_id).await?;
        if stage.status.is_terminal() {
            return Ok(());
        }
        let tasks = self
            .tasks
            .find_all(&TaskFilter::for_stage(stage_id))
            .await?;
        if tasks.is_empty() {
            return Ok(());
        }

        let done = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count();
        let all_terminal = tasks.iter().all(|t| t.status.is_terminal());
        stage.progress = ((done * 100) / tasks.len()) as u8;

        if all_terminal {
            stage.status = StageStatus::Completed;
            stage.progress = 100;
            self.stages.update(stage).await?;
            self.events
                .publish(events::STAGE_COMPLETED, json!({ "stage_id": stage_id }));
            self.audit
                .record(AuditLogEntry::new("stage", stage_id, "completed"));
            info!(stage_id, "stage completed");
        } else {
            if stage.status == StageStatus::Pending
                && tasks.iter().any(|t| t.status != TaskStatus::Pending)
            {
                stage.status = StageStatus::InProgress;
            }
            self.stages.update(stage).await?;
        }
        Ok(())
    }

    /// Promote a pending stage once work on it begins. Tasks may exist
    /// without a registered stage; that is not an error here.
    async fn mark_stage_in_progress(&self, stage_id: &str) -> Result<()> {
        if let Some(mut stage) = self.stages.find_by_id(stage_id).await? {
            if stage.status == StageStatus::Pending {
                stage.status = StageStatus::InProgress;
                self.stages.update(stage).await?;
                self.events
                    .publish(events::STAGE_STARTED, json!({ "stage_id": stage_id }));
            }
        }
        Ok(())
    }

    /// Assign an unassigned task directly; an already-assigned task goes
    /// through reassignment, which records history and notifies both parties.
    pub async fn assign_task(
        &self,
        task_id: &str,
        user_id: &str,
        assigned_by: &str,
    ) -> Result<Task> {
        let mut task = self.get_task(task_id).await?;
        if task.status.is_terminal() {
            return Err(WorkflowEngineError::Validation {
                message: format!("cannot assign task {task_id} in terminal state"),
            });
        }

        match task.assigned_to {
            None => {
                task.assigned_to = Some(user_id.to_string());
                let task = self.tasks.update(task).await?;
                self.notifications.notify(
                    Notification::new(
                        user_id,
                        "assignment",
                        "Task assigned to you",
                        format!("Task '{}' was assigned to you", task.title),
                    )
                    .for_task(task_id),
                );
                self.events.publish(
                    events::TASK_ASSIGNED,
                    json!({ "task_id": task_id, "user_id": user_id }),
                );
                self.audit.record(
                    AuditLogEntry::new("task", task_id, "assigned")
                        .by_user(assigned_by)
                        .with_change(Value::Null, json!(user_id)),
                );
                Ok(task)
            }
            Some(_) => {
                let task = self
                    .reassignment
                    .reassign(task_id, user_id, "manual reassignment", assigned_by)
                    .await?;
                self.events.publish(
                    events::TASK_REASSIGNED,
                    json!({ "task_id": task_id, "user_id": user_id }),
                );
                Ok(task)
            }
        }
    }

    // ---- approvals ---------------------------------------------------------

    pub async fn create_approval_chain(
        &self,
        task_id: &str,
        approver_ids: Vec<String>,
    ) -> Result<ApprovalChain> {
        let chain = self.approvals.create_chain(task_id, approver_ids).await?;
        if let Some(first) = chain.steps.first() {
            self.notifications.notify(
                Notification::new(
                    &first.approver_id,
                    "approval",
                    "Approval requested",
                    format!("Task {task_id} is waiting for your approval"),
                )
                .for_task(task_id),
            );
        }
        self.events
            .publish(events::APPROVAL_REQUESTED, json!({ "task_id": task_id }));
        Ok(chain)
    }

    /// Process one approval decision. A fully approved chain completes the
    /// task; the approval path was already gated on chain order, so it skips
    /// the dependency re-check.
    pub async fn process_approval(
        &self,
        task_id: &str,
        approver_id: &str,
        decision: ApprovalDecision,
        comments: Option<String>,
    ) -> Result<ApprovalOutcome> {
        let outcome = self
            .approvals
            .process_approval(task_id, approver_id, decision, comments)?;

        if outcome.chain_approved {
            self.events
                .publish(events::APPROVAL_COMPLETED, json!({ "task_id": task_id }));
            let task = self.get_task(task_id).await?;
            if !task.status.is_terminal() {
                self.finalize_task(task, Some(approver_id)).await?;
            }
        } else if outcome.chain_status == crate::models::ApprovalChainStatus::Rejected {
            self.events
                .publish(events::APPROVAL_REJECTED, json!({ "task_id": task_id }));
            if let Ok(task) = self.get_task(task_id).await {
                if let Some(assignee) = &task.assigned_to {
                    self.notifications.notify(
                        Notification::new(
                            assignee,
                            "approval",
                            "Approval rejected",
                            format!("Approval for task '{}' was rejected", task.title),
                        )
                        .for_task(task_id),
                    );
                }
            }
        } else if let Some(next) = self.approvals.get_current_approver(task_id) {
            self.notifications.notify(
                Notification::new(
                    &next,
                    "approval",
                    "Approval requested",
                    format!("Task {task_id} is waiting for your approval"),
                )
                .for_task(task_id),
            );
        }

        Ok(outcome)
    }

    // ---- stage lifecycle ---------------------------------------------------

    pub async fn get_stage(&self, stage_id: &str) -> Result<Stage> {
        self.stages
            .find_by_id(stage_id)
            .await?
            .ok_or_else(|| WorkflowEngineError::StageNotFound {
                stage_id: stage_id.to_string(),
            })
    }

    /// Create a stage and its tasks, all pending with zero progress.
    pub async fn initialize_stage(&self, mut stage: Stage, tasks: Vec<Task>) -> Result<Stage> {
        stage.status = StageStatus::Pending;
        stage.progress = 0;
        let stage = self.stages.create(stage).await?;

        for mut task in tasks {
            task.stage_id = stage.id.clone();
            task.case_id = stage.case_id.clone();
            task.status = TaskStatus::Pending;
            self.tasks.create(task).await?;
        }

        self.events
            .publish(events::STAGE_INITIALIZED, json!({ "stage_id": stage.id }));
        self.audit
            .record(AuditLogEntry::new("stage", &stage.id, "initialized"));
        Ok(stage)
    }

    /// Stop every running timer on the stage's in-progress tasks.
    pub async fn pause_stage(&self, stage_id: &str) -> Result<usize> {
        self.get_stage(stage_id).await?;
        let tasks = self
            .tasks
            .find_all(&TaskFilter::for_stage(stage_id).with_status(TaskStatus::InProgress))
            .await?;

        let mut stopped = 0;
        for task in &tasks {
            stopped += self.time_tracking.stop_all_for_task(&task.id).await?.len();
        }
        self.audit.record(
            AuditLogEntry::new("stage", stage_id, "paused")
                .with_metadata(json!({ "timers_stopped": stopped })),
        );
        info!(stage_id, stopped, "stage paused");
        Ok(stopped)
    }

    /// Restart timers for the assignees of the stage's in-progress tasks.
    pub async fn resume_stage(&self, stage_id: &str) -> Result<usize> {
        self.get_stage(stage_id).await?;
        let tasks = self
            .tasks
            .find_all(&TaskFilter::for_stage(stage_id).with_status(TaskStatus::InProgress))
            .await?;

        let mut restarted = 0;
        for task in &tasks {
            if self.time_tracking.restart_for_assignee(task).await?.is_some() {
                restarted += 1;
            }
        }
        self.audit
            .record(AuditLogEntry::new("stage", stage_id, "resumed"));
        info!(stage_id, restarted, "stage resumed");
        Ok(restarted)
    }

    /// Skip a stage and every non-terminal task in it.
    pub async fn skip_stage(&self, stage_id: &str, reason: &str) -> Result<Stage> {
        let mut stage = self.get_stage(stage_id).await?;
        if stage.status.is_terminal() {
            return Err(WorkflowEngineError::Validation {
                message: format!("stage {stage_id} is already in terminal state"),
            });
        }

        let tasks = self.tasks.find_all(&TaskFilter::for_stage(stage_id)).await?;
        for mut task in tasks {
            if task.status.is_terminal() {
                continue;
            }
            if let Err(e) = self.time_tracking.stop_all_for_task(&task.id).await {
                warn!(task_id = %task.id, error = %e, "stopping timers on skip failed");
            }
            task.status = TaskStatus::Skipped;
            let task = self.tasks.update(task).await?;
            self.events
                .publish(events::TASK_SKIPPED, json!({ "task_id": task.id }));
        }

        stage.status = StageStatus::Skipped;
        let stage = self.stages.update(stage).await?;
        self.events
            .publish(events::STAGE_SKIPPED, json!({ "stage_id": stage_id }));
        self.audit.record(
            AuditLogEntry::new("stage", stage_id, "skipped")
                .with_metadata(json!({ "reason": reason })),
        );
        info!(stage_id, reason, "stage skipped");
        Ok(stage)
    }

    /// Assign every non-terminal task in a stage to one user. Returns how
    /// many tasks changed hands.
    pub async fn bulk_assign_stage(
        &self,
        stage_id: &str,
        user_id: &str,
        assigned_by: &str,
    ) -> Result<usize> {
        self.get_stage(stage_id).await?;
        let tasks = self.tasks.find_all(&TaskFilter::for_stage(stage_id)).await?;

        let mut assigned = 0;
        for task in tasks {
            if task.status.is_terminal() || task.assigned_to.as_deref() == Some(user_id) {
                continue;
            }
            self.assign_task(&task.id, user_id, assigned_by).await?;
            assigned += 1;
        }
        Ok(assigned)
    }

    // ---- conditional branching ---------------------------------------------

    /// Evaluate a stage's branching rules and execute the first match.
    pub async fn evaluate_stage_conditions(
        &self,
        stage_id: &str,
        context: &Value,
    ) -> Result<Option<RuleMatch>> {
        let matched = match self.conditional.evaluate(stage_id, context) {
            Some(m) => m,
            None => return Ok(None),
        };
        info!(stage_id, rule_id = %matched.rule_id, action = ?matched.action, "branching rule fired");

        match matched.action {
            RuleAction::SkipStage => {
                self.skip_stage(stage_id, "conditional rule").await?;
            }
            RuleAction::AddTask => {
                let title = matched
                    .value
                    .as_ref()
                    .and_then(Value::as_str)
                    .ok_or_else(|| WorkflowEngineError::Validation {
                        message: "add_task rule requires a task title".into(),
                    })?;
                let stage = self.get_stage(stage_id).await?;
                let task = Task::new(Uuid::new_v4().to_string(), stage_id, stage.case_id, title);
                self.create_task(task).await?;
            }
            RuleAction::AssignTo => {
                let user = matched
                    .value
                    .as_ref()
                    .and_then(Value::as_str)
                    .ok_or_else(|| WorkflowEngineError::Validation {
                        message: "assign_to rule requires a user id".into(),
                    })?;
                self.bulk_assign_stage(stage_id, user, "conditional rule")
                    .await?;
            }
            RuleAction::SetPriority => {
                let priority: Priority = matched
                    .value
                    .as_ref()
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| WorkflowEngineError::Validation {
                        message: "set_priority rule requires a priority name".into(),
                    })?;
                let tasks = self.tasks.find_all(&TaskFilter::for_stage(stage_id)).await?;
                for mut task in tasks {
                    if !task.status.is_terminal() && task.priority != priority {
                        task.priority = priority;
                        self.tasks.update(task).await?;
                    }
                }
            }
            RuleAction::Notify => {
                let user = matched
                    .value
                    .as_ref()
                    .and_then(Value::as_str)
                    .ok_or_else(|| WorkflowEngineError::Validation {
                        message: "notify rule requires a user id".into(),
                    })?;
                self.notifications.notify(Notification::new(
                    user,
                    "conditional",
                    "Workflow rule triggered",
                    format!("A branching rule fired for stage {stage_id}"),
                ));
            }
        }

        self.audit.record(
            AuditLogEntry::new("stage", stage_id, "rule_executed")
                .with_metadata(json!({ "rule_id": matched.rule_id, "action": matched.action })),
        );
        Ok(Some(matched))
    }

    // ---- scheduled maintenance ---------------------------------------------

    /// One maintenance sweep: SLA breaches, escalations, and due recurring
    /// workflows. Each check's failure is collected, never fatal to the rest.
    pub async fn run_scheduled_checks(&self) -> ScheduledCheckReport {
        let now = Utc::now();
        let mut report = ScheduledCheckReport::default();

        match self.sla.check_breaches(None).await {
            Ok(sweep) => {
                for flag in &sweep.breaches {
                    self.events
                        .publish(events::SLA_BREACHED, json!({ "task_id": flag.task_id }));
                }
                for flag in &sweep.warnings {
                    self.events
                        .publish(events::SLA_WARNING, json!({ "task_id": flag.task_id }));
                }
                report.sla = sweep;
            }
            Err(e) => report.errors.push(format!("sla sweep: {e}")),
        }

        match self.escalation.check_and_escalate(now).await {
            Ok(escalated) => {
                for event in &escalated {
                    self.events
                        .publish(events::TASK_ESCALATED, json!({ "task_id": event.task_id }));
                }
                report.escalations = escalated;
            }
            Err(e) => report.errors.push(format!("escalation sweep: {e}")),
        }

        match self.recurring.process_due(now) {
            Ok(fired) => {
                for workflow in fired {
                    match self.instantiate_recurring(&workflow, now).await {
                        Ok(created) => report.recurring_started += created,
                        Err(e) => report
                            .errors
                            .push(format!("recurring '{}': {e}", workflow.name)),
                    }
                }
            }
            Err(e) => report.errors.push(format!("recurring sweep: {e}")),
        }

        info!(
            breaches = report.sla.breaches.len(),
            warnings = report.sla.warnings.len(),
            escalations = report.escalations.len(),
            recurring_started = report.recurring_started,
            errors = report.errors.len(),
            "scheduled checks complete"
        );
        report
    }

    /// Create the tasks of a recurring workflow that just fired.
    async fn instantiate_recurring(
        &self,
        workflow: &crate::models::RecurringWorkflow,
        now: chrono::DateTime<Utc>,
    ) -> Result<usize> {
        let mut created = 0;
        for template in &workflow.tasks {
            let mut task = Task::new(
                Uuid::new_v4().to_string(),
                &workflow.stage_id,
                &workflow.case_id,
                &template.title,
            )
            .with_priority(template.priority);
            task.estimated_hours = template.estimated_hours;
            task.assigned_to = template.assigned_to.clone();
            if let Some(hours) = template.due_in_hours {
                task.due_date = Some(now + Duration::seconds((hours * 3600.0) as i64));
            }
            let task = self.create_task(task).await?;
            if let Some(assignee) = &task.assigned_to {
                self.notifications.notify(
                    Notification::new(
                        assignee,
                        "recurring",
                        "Recurring task created",
                        format!("Task '{}' was created by '{}'", task.title, workflow.name),
                    )
                    .for_task(&task.id),
                );
            }
            created += 1;
        }
        self.events.publish(
            events::RECURRING_TRIGGERED,
            json!({ "workflow_id": workflow.id, "tasks_created": created }),
        );
        Ok(created)
    }

    // ---- service accessors -------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    pub fn dependencies(&self) -> &DependencyService {
        &self.dependencies
    }

    pub fn sla(&self) -> &SlaService {
        &self.sla
    }

    pub fn approvals(&self) -> &ApprovalService {
        &self.approvals
    }

    pub fn parallel(&self) -> &ParallelService {
        &self.parallel
    }

    pub fn conditional(&self) -> &ConditionalService {
        &self.conditional
    }

    pub fn escalation(&self) -> &EscalationService {
        &self.escalation
    }

    pub fn reassignment(&self) -> &ReassignmentService {
        &self.reassignment
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    pub fn audit(&self) -> &AuditService {
        &self.audit
    }

    pub fn time_tracking(&self) -> &TimeTrackingService {
        &self.time_tracking
    }

    pub fn custom_fields(&self) -> &CustomFieldsService {
        &self.custom_fields
    }

    pub fn recurring(&self) -> &RecurringService {
        &self.recurring
    }

    pub fn versioning(&self) -> &VersioningService {
        &self.versioning
    }

    pub fn analytics(&self) -> &AnalyticsService {
        &self.analytics
    }

    pub fn integrations(&self) -> &ExternalIntegrationService {
        &self.integrations
    }

    pub fn recovery(&self) -> &RecoveryService {
        &self.recovery
    }
}

impl Drop for WorkflowEngine {
    fn drop(&mut self) {
        self.dispatcher.shutdown();
        self.cache_evictor.abort();
    }
}
