//! Circuit breaker configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Time to wait in the open state before allowing a trial call.
    pub timeout: Duration,

    /// Consecutive half-open successes required to close the circuit.
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    /// Settings for external API targets (webhooks, chat integrations).
    pub fn for_external_api() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(45),
            success_threshold: 2,
        }
    }

    /// Settings for orchestrator operation recovery.
    pub fn for_recovery() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }
        if self.failure_threshold > 100 {
            return Err("failure_threshold should not exceed 100".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }
        if self.success_threshold == 0 {
            return Err("success_threshold must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}
