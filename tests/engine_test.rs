//! End-to-end engine flows over the in-memory repository: dependency gating,
//! completion fan-out, approval driven completion, parallel group
//! activation, and the scheduled maintenance sweep.

use chrono::{Duration, Utc};
use matterflow_core::config::EngineConfig;
use matterflow_core::constants::{Priority, StageStatus, TaskStatus};
use matterflow_core::models::{
    ApprovalDecision, CompletionRule, DependencyType, EscalationRule, RecurrencePattern,
    RecurringTaskTemplate, RecurringWorkflow, Stage, Task,
};
use async_trait::async_trait;
use matterflow_core::error::Result;
use matterflow_core::orchestration::{StartOutcome, WorkflowEngine};
use matterflow_core::repository::{InMemoryRepository, TaskFilter, TaskRepository};
use matterflow_core::WorkflowEngineError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn engine() -> (Arc<InMemoryRepository>, WorkflowEngine) {
    let repo = Arc::new(InMemoryRepository::new());
    let engine = WorkflowEngine::new(repo.clone(), repo.clone(), EngineConfig::default()).unwrap();
    (repo, engine)
}

/// Task repository whose `update` fails a configurable number of times
/// before delegating, standing in for a database with transient outages.
struct FlakyTaskRepository {
    inner: Arc<InMemoryRepository>,
    update_failures_left: AtomicU32,
}

impl FlakyTaskRepository {
    fn fail_next_updates(&self, count: u32) {
        self.update_failures_left.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskRepository for FlakyTaskRepository {
    async fn find_by_id(&self, task_id: &str) -> Result<Option<Task>> {
        TaskRepository::find_by_id(&*self.inner, task_id).await
    }

    async fn find_all(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        TaskRepository::find_all(&*self.inner, filter).await
    }

    async fn create(&self, task: Task) -> Result<Task> {
        TaskRepository::create(&*self.inner, task).await
    }

    async fn update(&self, task: Task) -> Result<Task> {
        let failing = self
            .update_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(WorkflowEngineError::Storage {
                message: "connection reset".into(),
            });
        }
        TaskRepository::update(&*self.inner, task).await
    }
}

#[tokio::test]
async fn dependent_task_is_blocked_until_prerequisite_completes() {
    let (_repo, engine) = engine();
    let mut events = engine.events().subscribe();

    engine
        .initialize_stage(
            Stage::new("s1", "c1", "Discovery", 1),
            vec![
                Task::new("t1", "s1", "c1", "Collect documents"),
                Task::new("t2", "s1", "c1", "Review documents"),
            ],
        )
        .await
        .unwrap();
    engine
        .dependencies()
        .set_dependencies("t2", vec!["t1".into()], DependencyType::Blocking)
        .await
        .unwrap();

    // T2 cannot start while T1 is open.
    let outcome = engine.start_task("t2").await.unwrap();
    assert_eq!(
        outcome,
        StartOutcome::Blocked {
            blocked_by: vec!["t1".into()]
        }
    );
    // Completing T2 out of order is a typed error, not silent success.
    let err = engine.complete_task("t2", None).await.unwrap_err();
    assert_eq!(err.code(), "DEPENDENCY_BLOCKED");

    assert!(engine.start_task("t1").await.unwrap().is_started());
    engine.complete_task("t1", Some("alice")).await.unwrap();

    assert!(engine.start_task("t2").await.unwrap().is_started());
    let t2 = engine.complete_task("t2", Some("alice")).await.unwrap();
    assert_eq!(t2.status, TaskStatus::Done);
    assert!(t2.completed_date.is_some());

    // All tasks done: the stage completes with full progress.
    let stage = engine.get_stage("s1").await.unwrap();
    assert_eq!(stage.status, StageStatus::Completed);
    assert_eq!(stage.progress, 100);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event.name);
    }
    assert!(seen.contains(&"stage.initialized".to_string()));
    assert!(seen.contains(&"task.completed".to_string()));
    assert!(seen.contains(&"stage.completed".to_string()));
}

#[tokio::test]
async fn approval_chain_gates_completion_and_final_approval_completes_task() {
    let (_repo, engine) = engine();
    engine
        .initialize_stage(
            Stage::new("s1", "c1", "Settlement", 1),
            vec![Task::new("t1", "s1", "c1", "Settlement agreement").with_assignee("drafter")],
        )
        .await
        .unwrap();
    engine
        .create_approval_chain("t1", vec!["partner".into(), "client".into()])
        .await
        .unwrap();
    assert_eq!(engine.notifications().unread_count("partner"), 1);

    // Direct completion is blocked while the chain is pending.
    let err = engine.complete_task("t1", Some("drafter")).await.unwrap_err();
    assert_eq!(err.code(), "APPROVAL_ERROR");

    let outcome = engine
        .process_approval("t1", "partner", ApprovalDecision::Approve, None)
        .await
        .unwrap();
    assert!(!outcome.chain_approved);
    // The next approver is notified as the chain advances.
    assert_eq!(engine.notifications().unread_count("client"), 1);

    let outcome = engine
        .process_approval("t1", "client", ApprovalDecision::Approve, Some("approved".into()))
        .await
        .unwrap();
    assert!(outcome.chain_approved);

    // Final approval completed the task without a separate complete call.
    let task = engine.get_task("t1").await.unwrap();
    assert_eq!(task.status, TaskStatus::Done);
}

#[tokio::test]
async fn rejection_keeps_task_open_and_notifies_assignee() {
    let (_repo, engine) = engine();
    engine
        .create_task(Task::new("t1", "s1", "c1", "Fee motion").with_assignee("drafter"))
        .await
        .unwrap();
    engine
        .create_approval_chain("t1", vec!["partner".into()])
        .await
        .unwrap();

    engine
        .process_approval("t1", "partner", ApprovalDecision::Reject, Some("revise".into()))
        .await
        .unwrap();

    let task = engine.get_task("t1").await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(engine
        .notifications()
        .list("drafter", true)
        .iter()
        .any(|n| n.kind == "approval"));
    // A rejected chain permanently blocks completion.
    let err = engine.complete_task("t1", None).await.unwrap_err();
    assert_eq!(err.code(), "APPROVAL_ERROR");
}

#[tokio::test]
async fn parallel_group_completion_activates_follow_up_task() {
    let (_repo, engine) = engine();
    engine
        .initialize_stage(
            Stage::new("s1", "c1", "Diligence", 1),
            vec![
                Task::new("p1", "s1", "c1", "Review contracts"),
                Task::new("p2", "s1", "c1", "Review financials"),
                Task::new("summary", "s1", "c1", "Write summary memo"),
            ],
        )
        .await
        .unwrap();
    engine
        .parallel()
        .create_group(
            "s1",
            vec!["p1".into(), "p2".into()],
            CompletionRule::All,
            None,
            Some("summary".into()),
        )
        .unwrap();

    engine.start_task("p1").await.unwrap();
    engine.start_task("p2").await.unwrap();
    engine.complete_task("p1", None).await.unwrap();
    assert_eq!(
        engine.get_task("summary").await.unwrap().status,
        TaskStatus::Pending
    );

    engine.complete_task("p2", None).await.unwrap();
    // Both group members done: the follow-up task was started.
    assert_eq!(
        engine.get_task("summary").await.unwrap().status,
        TaskStatus::InProgress
    );
}

#[tokio::test]
async fn skip_stage_cascades_to_open_tasks() {
    let (_repo, engine) = engine();
    engine
        .initialize_stage(
            Stage::new("s1", "c1", "Appeal", 1),
            vec![
                Task::new("t1", "s1", "c1", "Notice of appeal"),
                Task::new("t2", "s1", "c1", "Appellate brief"),
            ],
        )
        .await
        .unwrap();
    engine.start_task("t1").await.unwrap();
    engine.complete_task("t1", None).await.unwrap();

    let stage = engine.skip_stage("s1", "matter settled").await.unwrap();
    assert_eq!(stage.status, StageStatus::Skipped);
    // Done tasks stay done; open ones are skipped.
    assert_eq!(engine.get_task("t1").await.unwrap().status, TaskStatus::Done);
    assert_eq!(
        engine.get_task("t2").await.unwrap().status,
        TaskStatus::Skipped
    );
}

#[tokio::test]
async fn scheduled_checks_sweep_sla_escalation_and_recurring() {
    let (_repo, engine) = engine();
    let now = Utc::now();

    engine
        .create_task(
            Task::new("overdue", "s1", "c1", "Respond to motion")
                .with_priority(Priority::Critical)
                .with_assignee("alice")
                .with_due_date(now - Duration::hours(12)),
        )
        .await
        .unwrap();
    engine
        .escalation()
        .add_rule(EscalationRule {
            id: String::new(),
            trigger_hours_overdue: 4.0,
            max_escalation_level: 3,
            escalate_to_user: Some("supervisor".into()),
            escalate_to_role: None,
            auto_reassign: false,
            notify_original_assignee: true,
            min_priority: None,
        })
        .unwrap();
    engine
        .recurring()
        .create(RecurringWorkflow {
            id: String::new(),
            case_id: "c1".into(),
            stage_id: "s1".into(),
            name: "Weekly status".into(),
            pattern: RecurrencePattern::Weekly,
            cron_expression: None,
            next_run: now - Duration::minutes(1),
            last_run: None,
            enabled: true,
            tasks: vec![RecurringTaskTemplate {
                title: "Client status update".into(),
                priority: Priority::Medium,
                estimated_hours: Some(1.0),
                assigned_to: Some("alice".into()),
                due_in_hours: Some(24.0),
            }],
        })
        .unwrap();

    let report = engine.run_scheduled_checks().await;
    assert!(report.is_clean());
    assert_eq!(report.sla.breaches.len(), 1);
    assert_eq!(report.escalations.len(), 1);
    assert_eq!(report.recurring_started, 1);

    // Breach flag persisted, escalation resolved later by completion.
    let task = engine.get_task("overdue").await.unwrap();
    assert!(task.sla_warning);
    assert_eq!(engine.escalation().open_events().len(), 1);
    engine.start_task("overdue").await.unwrap();
    engine.complete_task("overdue", Some("alice")).await.unwrap();
    assert!(engine.escalation().open_events().is_empty());

    // A second sweep within the escalation window does not duplicate events.
    let report = engine.run_scheduled_checks().await;
    assert!(report.escalations.is_empty());
}

#[tokio::test]
async fn recovery_wrapper_exhausts_retries_with_typed_error() {
    let (_repo, engine) = engine();
    let err = engine
        .recovery()
        .execute_with_recovery("t1", "sync_external", || async {
            Err::<(), _>(WorkflowEngineError::Integration {
                integration: "dms".into(),
                message: "connection reset".into(),
            })
        })
        .await
        .unwrap_err();

    match err {
        WorkflowEngineError::MaxRetriesExceeded {
            task_id,
            operation,
            attempts,
        } => {
            assert_eq!(task_id, "t1");
            assert_eq!(operation, "sync_external");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // Each failed attempt left an audit entry.
    assert_eq!(engine.audit().for_entity("task", "t1").len(), 3);
}

#[tokio::test]
async fn conditional_rule_sets_priority_on_stage_tasks() {
    use matterflow_core::models::{Condition, ConditionOperator, RuleAction};
    use serde_json::json;

    let (_repo, engine) = engine();
    engine
        .initialize_stage(
            Stage::new("s1", "c1", "Intake", 1),
            vec![Task::new("t1", "s1", "c1", "Conflict check")],
        )
        .await
        .unwrap();
    engine
        .conditional()
        .add_rule(
            "s1",
            Condition {
                field: "case.amount_in_dispute".into(),
                operator: ConditionOperator::GreaterThan,
                value: Some(json!(1_000_000)),
            },
            RuleAction::SetPriority,
            Some(json!("Critical")),
        )
        .unwrap();

    let matched = engine
        .evaluate_stage_conditions("s1", &json!({ "case": { "amount_in_dispute": 5_000_000 } }))
        .await
        .unwrap();
    assert!(matched.is_some());
    assert_eq!(
        engine.get_task("t1").await.unwrap().priority,
        Priority::Critical
    );
}

#[tokio::test]
async fn bulk_assign_stage_skips_terminal_tasks() {
    let (_repo, engine) = engine();
    engine
        .initialize_stage(
            Stage::new("s1", "c1", "Filing", 1),
            vec![
                Task::new("t1", "s1", "c1", "Draft complaint"),
                Task::new("t2", "s1", "c1", "File complaint"),
            ],
        )
        .await
        .unwrap();
    engine.start_task("t1").await.unwrap();
    engine.complete_task("t1", None).await.unwrap();

    let assigned = engine.bulk_assign_stage("s1", "paralegal", "manager").await.unwrap();
    assert_eq!(assigned, 1);
    assert_eq!(
        engine.get_task("t2").await.unwrap().assigned_to.as_deref(),
        Some("paralegal")
    );
    assert!(engine.get_task("t1").await.unwrap().assigned_to.is_none());
}

#[tokio::test]
async fn stage_moves_to_in_progress_when_work_begins() {
    let (_repo, engine) = engine();
    engine
        .initialize_stage(
            Stage::new("s1", "c1", "Briefing", 1),
            vec![
                Task::new("t1", "s1", "c1", "Opening brief"),
                Task::new("t2", "s1", "c1", "Reply brief"),
            ],
        )
        .await
        .unwrap();
    assert_eq!(
        engine.get_stage("s1").await.unwrap().status,
        StageStatus::Pending
    );

    engine.start_task("t1").await.unwrap();
    assert_eq!(
        engine.get_stage("s1").await.unwrap().status,
        StageStatus::InProgress
    );

    // Half the work done keeps the stage in progress, not pending.
    engine.complete_task("t1", None).await.unwrap();
    let stage = engine.get_stage("s1").await.unwrap();
    assert_eq!(stage.status, StageStatus::InProgress);
    assert_eq!(stage.progress, 50);
}

#[tokio::test]
async fn transient_repository_failures_are_retried_and_audited() {
    let inner = Arc::new(InMemoryRepository::new());
    let flaky = Arc::new(FlakyTaskRepository {
        inner: inner.clone(),
        update_failures_left: AtomicU32::new(0),
    });
    let engine =
        WorkflowEngine::new(flaky.clone(), inner.clone(), EngineConfig::default()).unwrap();

    engine
        .create_task(Task::new("t1", "s1", "c1", "Serve subpoena"))
        .await
        .unwrap();
    engine.start_task("t1").await.unwrap();

    // Two transient write failures, then the store recovers.
    flaky.fail_next_updates(2);
    let task = engine.complete_task("t1", Some("alice")).await.unwrap();
    assert_eq!(task.status, TaskStatus::Done);

    let failures: Vec<_> = engine
        .audit()
        .for_entity("task", "t1")
        .into_iter()
        .filter(|e| e.action == "complete_task_failed")
        .collect();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[1].metadata.as_ref().unwrap()["attempt"], 2);
    assert_eq!(engine.recovery().pending_retries("t1", "complete_task"), 0);
}

#[tokio::test]
async fn persistent_repository_outage_exhausts_the_retry_budget() {
    let inner = Arc::new(InMemoryRepository::new());
    let flaky = Arc::new(FlakyTaskRepository {
        inner: inner.clone(),
        update_failures_left: AtomicU32::new(0),
    });
    let engine =
        WorkflowEngine::new(flaky.clone(), inner.clone(), EngineConfig::default()).unwrap();

    engine
        .create_task(Task::new("t1", "s1", "c1", "File answer"))
        .await
        .unwrap();
    engine.start_task("t1").await.unwrap();

    flaky.fail_next_updates(u32::MAX);
    let err = engine.complete_task("t1", None).await.unwrap_err();
    assert_eq!(err.code(), "MAX_RETRIES_EXCEEDED");
    // The task never reached its terminal state.
    flaky.fail_next_updates(0);
    assert_eq!(
        engine.get_task("t1").await.unwrap().status,
        TaskStatus::InProgress
    );
}
