//! # Recovery Wrapper
//!
//! Bounded retry around fallible workflow operations. Every failure is
//! audited with its attempt number; once the retry budget for a
//! (task, operation) pair is spent the wrapper raises `MaxRetriesExceeded`
//! and discards the pair's state. A shared circuit breaker sits in front of
//! every attempt so a systemic outage fails fast instead of burning retries.

use crate::error::{Result, WorkflowEngineError};
use crate::models::AuditLogEntry;
use crate::resilience::{CircuitBreaker, CircuitBreakerError};
use crate::services::AuditService;
use dashmap::DashMap;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct RecoveryService {
    breaker: Arc<CircuitBreaker>,
    audit: Arc<AuditService>,
    max_retries: u32,
    /// (task id, operation) -> failures so far.
    attempts: DashMap<(String, String), u32>,
}

impl RecoveryService {
    pub fn new(breaker: Arc<CircuitBreaker>, audit: Arc<AuditService>, max_retries: u32) -> Self {
        Self {
            breaker,
            audit,
            max_retries,
            attempts: DashMap::new(),
        }
    }

    /// Run an operation, retrying up to the configured budget. Success clears
    /// the pair's retry state; exhausting the budget discards it and raises
    /// `MaxRetriesExceeded`. An open circuit surfaces as `RateLimit` without
    /// consuming retries.
    pub async fn execute_with_recovery<F, Fut, T>(
        &self,
        task_id: &str,
        operation: &str,
        run: F,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = (task_id.to_string(), operation.to_string());

        loop {
            match self.breaker.call(&run).await {
                Ok(value) => {
                    if self.attempts.remove(&key).is_some() {
                        debug!(task_id, operation, "operation recovered, retry state cleared");
                    }
                    return Ok(value);
                }
                Err(CircuitBreakerError::CircuitOpen { component }) => {
                    return Err(WorkflowEngineError::RateLimit {
                        message: format!("circuit breaker open for {component}"),
                    });
                }
                Err(CircuitBreakerError::OperationFailed(err)) => {
                    let attempt = {
                        let mut count = self.attempts.entry(key.clone()).or_insert(0);
                        *count += 1;
                        *count
                    };
                    warn!(
                        task_id,
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        error = %err,
                        "operation failed"
                    );
                    self.audit.record(
                        AuditLogEntry::new("task", task_id, format!("{operation}_failed"))
                            .with_metadata(json!({
                                "attempt": attempt,
                                "max_retries": self.max_retries,
                                "error_code": err.code(),
                                "error": err.to_string(),
                            })),
                    );

                    if attempt >= self.max_retries {
                        self.attempts.remove(&key);
                        return Err(WorkflowEngineError::MaxRetriesExceeded {
                            task_id: task_id.to_string(),
                            operation: operation.to_string(),
                            attempts: attempt,
                        });
                    }
                }
            }
        }
    }

    /// Failures recorded so far for a pair, for diagnostics.
    pub fn pending_retries(&self, task_id: &str, operation: &str) -> u32 {
        self.attempts
            .get(&(task_id.to_string(), operation.to_string()))
            .map(|c| *c)
            .unwrap_or(0)
    }
}
