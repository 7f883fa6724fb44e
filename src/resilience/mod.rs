//! # Resilience
//!
//! Fault isolation primitives for the engine. Every external integration is
//! wrapped in its own [`CircuitBreaker`] so one failing downstream target
//! never starves the others, and the orchestrator's recovery wrapper shares
//! one breaker across retried operations. The breaker is the engine's only
//! backpressure mechanism: once open it rejects calls without executing them
//! until its timeout elapses.

pub mod circuit_breaker;
pub mod config;
pub mod metrics;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use config::CircuitBreakerConfig;
pub use metrics::CircuitBreakerMetrics;
