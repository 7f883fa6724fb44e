//! Engine configuration, loaded from environment variables with parse
//! validation. Defaults are suitable for development and tests.

use crate::error::{Result, WorkflowEngineError};
use crate::resilience::CircuitBreakerConfig;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum retry attempts per (task, operation) before the recovery
    /// wrapper raises MAX_RETRIES_EXCEEDED.
    pub max_retries: u32,
    /// Audit trail ring buffer capacity.
    pub audit_capacity: usize,
    /// Most recent notifications retained per user.
    pub notification_retention: usize,
    /// Bounded capacity of the background integration dispatch queue.
    pub integration_queue_capacity: usize,
    /// Interval between scheduled maintenance sweeps.
    pub sweep_interval: Duration,
    /// Circuit breaker settings shared by the recovery wrapper.
    pub recovery_breaker: CircuitBreakerConfig,
    /// Circuit breaker settings applied per external integration.
    pub integration_breaker: CircuitBreakerConfig,
    pub custom_settings: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            audit_capacity: 10_000,
            notification_retention: 500,
            integration_queue_capacity: 256,
            sweep_interval: Duration::from_secs(300),
            recovery_breaker: CircuitBreakerConfig::default(),
            integration_breaker: CircuitBreakerConfig::for_external_api(),
            custom_settings: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(max_retries) = std::env::var("MATTERFLOW_MAX_RETRIES") {
            config.max_retries = max_retries.parse().map_err(|e| {
                WorkflowEngineError::Configuration {
                    message: format!("Invalid max_retries: {e}"),
                }
            })?;
        }

        if let Ok(capacity) = std::env::var("MATTERFLOW_AUDIT_CAPACITY") {
            config.audit_capacity = capacity.parse().map_err(|e| {
                WorkflowEngineError::Configuration {
                    message: format!("Invalid audit_capacity: {e}"),
                }
            })?;
        }

        if let Ok(secs) = std::env::var("MATTERFLOW_SWEEP_INTERVAL_SECS") {
            let secs: u64 = secs.parse().map_err(|e| {
                WorkflowEngineError::Configuration {
                    message: format!("Invalid sweep_interval_secs: {e}"),
                }
            })?;
            config.sweep_interval = Duration::from_secs(secs);
        }

        if let Ok(capacity) = std::env::var("MATTERFLOW_INTEGRATION_QUEUE_CAPACITY") {
            config.integration_queue_capacity = capacity.parse().map_err(|e| {
                WorkflowEngineError::Configuration {
                    message: format!("Invalid integration_queue_capacity: {e}"),
                }
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(WorkflowEngineError::Configuration {
                message: "max_retries must be greater than 0".into(),
            });
        }
        if self.audit_capacity == 0 {
            return Err(WorkflowEngineError::Configuration {
                message: "audit_capacity must be greater than 0".into(),
            });
        }
        if self.integration_queue_capacity == 0 {
            return Err(WorkflowEngineError::Configuration {
                message: "integration_queue_capacity must be greater than 0".into(),
            });
        }
        self.recovery_breaker
            .validate()
            .map_err(|message| WorkflowEngineError::Configuration { message })?;
        self.integration_breaker
            .validate()
            .map_err(|message| WorkflowEngineError::Configuration { message })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.audit_capacity, 10_000);
    }

    #[test]
    fn test_zero_retries_rejected() {
        let config = EngineConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
