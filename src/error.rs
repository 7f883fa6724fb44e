//! # Structured Error Handling
//!
//! Typed error hierarchy for the workflow engine. Every domain service raises
//! the specific variant for its failure mode; the orchestrator's recovery
//! wrapper is the only place that converts repeated failures into
//! `MaxRetriesExceeded`. Each variant carries a stable machine-readable code
//! and a JSON context map that is surfaced to callers unchanged.

use serde_json::{json, Value};

/// Errors raised by the workflow engine and its domain services.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowEngineError {
    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("stage not found: {stage_id}")]
    StageNotFound { stage_id: String },

    #[error("task {task_id} is blocked by {} incomplete dependencies", blocked_by.len())]
    Dependency {
        task_id: String,
        blocked_by: Vec<String>,
    },

    #[error("circular dependency detected for task {task_id}: {}", chain.join(" -> "))]
    CircularDependency {
        task_id: String,
        chain: Vec<String>,
    },

    #[error("approval error: {message}")]
    Approval { message: String },

    #[error("SLA error: {message}")]
    Sla { message: String },

    #[error("integration '{integration}' failed: {message}")]
    Integration {
        integration: String,
        message: String,
    },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("rate limited: {message}")]
    RateLimit { message: String },

    #[error("operation '{operation}' on task {task_id} exceeded {attempts} retries")]
    MaxRetriesExceeded {
        task_id: String,
        operation: String,
        attempts: u32,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("storage error: {message}")]
    Storage { message: String },
}

impl WorkflowEngineError {
    /// Stable machine-readable error code, suitable for API responses
    /// and audit entries.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TaskNotFound { .. } => "TASK_NOT_FOUND",
            Self::StageNotFound { .. } => "STAGE_NOT_FOUND",
            Self::Dependency { .. } => "DEPENDENCY_BLOCKED",
            Self::CircularDependency { .. } => "CIRCULAR_DEPENDENCY",
            Self::Approval { .. } => "APPROVAL_ERROR",
            Self::Sla { .. } => "SLA_ERROR",
            Self::Integration { .. } => "INTEGRATION_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::RateLimit { .. } => "RATE_LIMITED",
            Self::MaxRetriesExceeded { .. } => "MAX_RETRIES_EXCEEDED",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
        }
    }

    /// Structured context for the error, surfaced unchanged to callers.
    pub fn context(&self) -> Value {
        match self {
            Self::TaskNotFound { task_id } => json!({ "task_id": task_id }),
            Self::StageNotFound { stage_id } => json!({ "stage_id": stage_id }),
            Self::Dependency { task_id, blocked_by } => {
                json!({ "task_id": task_id, "blocked_by": blocked_by })
            }
            Self::CircularDependency { task_id, chain } => {
                json!({ "task_id": task_id, "chain": chain })
            }
            Self::MaxRetriesExceeded {
                task_id,
                operation,
                attempts,
            } => json!({ "task_id": task_id, "operation": operation, "attempts": attempts }),
            Self::Integration {
                integration,
                message,
            } => json!({ "integration": integration, "message": message }),
            Self::Approval { message }
            | Self::Sla { message }
            | Self::Validation { message }
            | Self::RateLimit { message }
            | Self::Configuration { message }
            | Self::Storage { message } => json!({ "message": message }),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowEngineError>;
