//! Approval chain records. Steps execute strictly in order; a rejection
//! halts the chain permanently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStepStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalChainStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalChainStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Decision submitted by an approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub approver_id: String,
    pub status: ApprovalStepStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub comments: Option<String>,
}

impl ApprovalStep {
    pub fn pending(approver_id: impl Into<String>) -> Self {
        Self {
            approver_id: approver_id.into(),
            status: ApprovalStepStatus::Pending,
            approved_at: None,
            comments: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalChain {
    pub id: String,
    pub task_id: String,
    pub steps: Vec<ApprovalStep>,
    pub current_step: usize,
    pub status: ApprovalChainStatus,
    pub created_at: DateTime<Utc>,
}

/// Outcome of processing one approval decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub chain_status: ApprovalChainStatus,
    /// Index of the step that was acted on.
    pub step_index: usize,
    /// True when this decision approved the final step, meaning the
    /// underlying task should be completed.
    pub chain_approved: bool,
}
