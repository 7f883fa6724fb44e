//! # Approval Service
//!
//! Ordered approval chains per task. Only the approver at the current step
//! may act; a rejection settles the chain permanently, and approving the
//! final step approves the chain (the orchestrator then completes the task).

use crate::error::{Result, WorkflowEngineError};
use crate::models::{
    ApprovalChain, ApprovalChainStatus, ApprovalDecision, ApprovalOutcome, ApprovalStep,
    ApprovalStepStatus,
};
use crate::repository::TaskRepository;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct ApprovalService {
    tasks: Arc<dyn TaskRepository>,
    /// Keyed by task id; one chain per task.
    chains: DashMap<String, ApprovalChain>,
}

impl ApprovalService {
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self {
            tasks,
            chains: DashMap::new(),
        }
    }

    /// Create an ordered pending chain for a task.
    pub async fn create_chain(
        &self,
        task_id: &str,
        approver_ids: Vec<String>,
    ) -> Result<ApprovalChain> {
        if approver_ids.is_empty() {
            return Err(WorkflowEngineError::Approval {
                message: "approval chain requires at least one approver".into(),
            });
        }
        if self.tasks.find_by_id(task_id).await?.is_none() {
            return Err(WorkflowEngineError::TaskNotFound {
                task_id: task_id.to_string(),
            });
        }
        if self.chains.contains_key(task_id) {
            return Err(WorkflowEngineError::Approval {
                message: format!("task {task_id} already has an approval chain"),
            });
        }

        let chain = ApprovalChain {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            steps: approver_ids.into_iter().map(ApprovalStep::pending).collect(),
            current_step: 0,
            status: ApprovalChainStatus::Pending,
            created_at: Utc::now(),
        };
        self.chains.insert(task_id.to_string(), chain.clone());
        info!(task_id, steps = chain.steps.len(), "approval chain created");
        Ok(chain)
    }

    /// Process one approval decision. Acting out of turn, on a settled chain,
    /// or on a settled step is an `Approval` error.
    pub fn process_approval(
        &self,
        task_id: &str,
        approver_id: &str,
        decision: ApprovalDecision,
        comments: Option<String>,
    ) -> Result<ApprovalOutcome> {
        let mut chain = self
            .chains
            .get_mut(task_id)
            .ok_or_else(|| WorkflowEngineError::Approval {
                message: format!("no approval chain for task {task_id}"),
            })?;

        if chain.status.is_settled() {
            return Err(WorkflowEngineError::Approval {
                message: format!("approval chain for task {task_id} is already settled"),
            });
        }

        let step_index = chain.current_step;
        let step = chain
            .steps
            .get(step_index)
            .ok_or_else(|| WorkflowEngineError::Approval {
                message: format!("approval chain for task {task_id} has no step {step_index}"),
            })?;

        if step.approver_id != approver_id {
            return Err(WorkflowEngineError::Approval {
                message: format!(
                    "approver {approver_id} is not the current approver for task {task_id}"
                ),
            });
        }
        if step.status != ApprovalStepStatus::Pending {
            return Err(WorkflowEngineError::Approval {
                message: format!("step {step_index} for task {task_id} is already settled"),
            });
        }

        let step = &mut chain.steps[step_index];
        step.approved_at = Some(Utc::now());
        step.comments = comments;

        match decision {
            ApprovalDecision::Reject => {
                step.status = ApprovalStepStatus::Rejected;
                chain.status = ApprovalChainStatus::Rejected;
                info!(task_id, approver_id, step = step_index, "approval rejected");
            }
            ApprovalDecision::Approve => {
                step.status = ApprovalStepStatus::Approved;
                chain.current_step += 1;
                if chain.current_step >= chain.steps.len() {
                    chain.status = ApprovalChainStatus::Approved;
                    info!(task_id, "approval chain fully approved");
                } else {
                    info!(task_id, approver_id, step = step_index, "approval advanced");
                }
            }
        }

        Ok(ApprovalOutcome {
            chain_status: chain.status,
            step_index,
            chain_approved: chain.status == ApprovalChainStatus::Approved,
        })
    }

    pub fn get_chain(&self, task_id: &str) -> Option<ApprovalChain> {
        self.chains.get(task_id).map(|c| c.clone())
    }

    /// The approver whose turn it is, or None when the chain is settled or
    /// absent.
    pub fn get_current_approver(&self, task_id: &str) -> Option<String> {
        self.chains.get(task_id).and_then(|chain| {
            if chain.status.is_settled() {
                return None;
            }
            chain
                .steps
                .get(chain.current_step)
                .map(|s| s.approver_id.clone())
        })
    }

    /// Tasks currently waiting on this approver.
    pub fn get_pending_approvals(&self, approver_id: &str) -> Vec<ApprovalChain> {
        self.chains
            .iter()
            .filter(|entry| {
                let chain = entry.value();
                chain.status == ApprovalChainStatus::Pending
                    && chain
                        .steps
                        .get(chain.current_step)
                        .is_some_and(|s| s.approver_id == approver_id)
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Whether task completion is permitted: chain approved or absent.
    pub fn completion_permitted(&self, task_id: &str) -> bool {
        self.chains
            .get(task_id)
            .map(|c| c.status == ApprovalChainStatus::Approved)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;
    use crate::repository::InMemoryRepository;

    async fn setup() -> ApprovalService {
        let repo = Arc::new(InMemoryRepository::new());
        repo.create(Task::new("t1", "s1", "c1", "Settlement memo"))
            .await
            .unwrap();
        ApprovalService::new(repo)
    }

    #[tokio::test]
    async fn test_chain_requires_an_approver() {
        let service = setup().await;
        let err = service.create_chain("t1", vec![]).await.unwrap_err();
        assert_eq!(err.code(), "APPROVAL_ERROR");
    }

    #[tokio::test]
    async fn test_wrong_approver_rejected() {
        let service = setup().await;
        service
            .create_chain("t1", vec!["alice".into(), "bob".into()])
            .await
            .unwrap();

        let err = service
            .process_approval("t1", "bob", ApprovalDecision::Approve, None)
            .unwrap_err();
        assert_eq!(err.code(), "APPROVAL_ERROR");
    }

    #[tokio::test]
    async fn test_full_chain_approves_in_order() {
        let service = setup().await;
        service
            .create_chain("t1", vec!["alice".into(), "bob".into(), "carol".into()])
            .await
            .unwrap();
        assert_eq!(service.get_current_approver("t1").unwrap(), "alice");

        let outcome = service
            .process_approval("t1", "alice", ApprovalDecision::Approve, None)
            .unwrap();
        assert!(!outcome.chain_approved);
        assert_eq!(service.get_current_approver("t1").unwrap(), "bob");

        service
            .process_approval("t1", "bob", ApprovalDecision::Approve, Some("lgtm".into()))
            .unwrap();
        let outcome = service
            .process_approval("t1", "carol", ApprovalDecision::Approve, None)
            .unwrap();
        assert!(outcome.chain_approved);
        assert_eq!(outcome.chain_status, ApprovalChainStatus::Approved);
        assert!(service.completion_permitted("t1"));
        assert!(service.get_current_approver("t1").is_none());
    }

    #[tokio::test]
    async fn test_rejection_is_terminal() {
        let service = setup().await;
        service
            .create_chain("t1", vec!["alice".into(), "bob".into()])
            .await
            .unwrap();

        let outcome = service
            .process_approval("t1", "alice", ApprovalDecision::Reject, Some("revise".into()))
            .unwrap();
        assert_eq!(outcome.chain_status, ApprovalChainStatus::Rejected);
        assert!(!service.completion_permitted("t1"));

        let err = service
            .process_approval("t1", "bob", ApprovalDecision::Approve, None)
            .unwrap_err();
        assert_eq!(err.code(), "APPROVAL_ERROR");
    }

    #[tokio::test]
    async fn test_pending_approvals_query() {
        let service = setup().await;
        service
            .create_chain("t1", vec!["alice".into(), "bob".into()])
            .await
            .unwrap();

        assert_eq!(service.get_pending_approvals("alice").len(), 1);
        assert!(service.get_pending_approvals("bob").is_empty());

        service
            .process_approval("t1", "alice", ApprovalDecision::Approve, None)
            .unwrap();
        assert!(service.get_pending_approvals("alice").is_empty());
        assert_eq!(service.get_pending_approvals("bob").len(), 1);
    }

    #[tokio::test]
    async fn test_completion_permitted_without_chain() {
        let service = setup().await;
        assert!(service.completion_permitted("t1"));
    }
}
