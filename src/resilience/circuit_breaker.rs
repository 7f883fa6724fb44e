//! # Circuit Breaker
//!
//! Classic three-state circuit breaker: Closed (normal operation), Open
//! (failing fast until the timeout elapses), and Half-Open (a single trial
//! call at a time probes recovery). `success_threshold` consecutive half-open
//! successes close the circuit; any half-open failure reopens it.

use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Circuit breaker states representing the current operational mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation, all calls allowed through.
    Closed = 0,
    /// Failure mode, all calls fail fast without executing.
    Open = 1,
    /// Testing recovery, one trial call at a time.
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open,
        }
    }
}

/// Errors surfaced by circuit breaker calls.
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting all calls.
    #[error("circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// The protected operation itself failed.
    #[error("operation failed: {0}")]
    OperationFailed(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and metrics.
    name: String,

    /// Current circuit state, atomic so reads never contend.
    state: AtomicU8,

    config: CircuitBreakerConfig,

    /// Guards the single half-open trial slot.
    trial_in_flight: AtomicBool,

    metrics: Mutex<CircuitBreakerMetrics>,

    /// When the circuit was opened, for timeout calculations.
    opened_at: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        debug!(
            component = %name,
            failure_threshold = config.failure_threshold,
            timeout_secs = config.timeout.as_secs(),
            success_threshold = config.success_threshold,
            "circuit breaker initialized"
        );
        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            config,
            trial_in_flight: AtomicBool::new(false),
            metrics: Mutex::new(CircuitBreakerMetrics::new()),
            opened_at: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an operation under circuit breaker protection.
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let trial = match self.admit().await {
            Admission::Allowed => false,
            Admission::Trial => true,
            Admission::Rejected => {
                return Err(CircuitBreakerError::CircuitOpen {
                    component: self.name.clone(),
                })
            }
        };

        let start = Instant::now();
        let result = operation().await;
        let duration = start.elapsed();

        if trial {
            self.trial_in_flight.store(false, Ordering::Release);
        }

        match &result {
            Ok(_) => self.record_success(duration).await,
            Err(_) => self.record_failure(duration).await,
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    async fn admit(&self) -> Admission {
        match self.state() {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => {
                let opened_at = self.opened_at.lock().await;
                match *opened_at {
                    Some(at) if at.elapsed() >= self.config.timeout => {
                        drop(opened_at);
                        self.transition_to_half_open().await;
                        self.try_claim_trial()
                    }
                    Some(_) => Admission::Rejected,
                    None => {
                        // Open without a timestamp should not happen; allow the
                        // call rather than wedge the component.
                        warn!(component = %self.name, "circuit open but no timestamp recorded");
                        Admission::Allowed
                    }
                }
            }
            CircuitState::HalfOpen => self.try_claim_trial(),
        }
    }

    fn try_claim_trial(&self) -> Admission {
        if self
            .trial_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Admission::Trial
        } else {
            Admission::Rejected
        }
    }

    async fn record_success(&self, duration: Duration) {
        let mut metrics = self.metrics.lock().await;
        metrics.total_calls += 1;
        metrics.success_count += 1;
        metrics.total_duration += duration;

        match self.state() {
            CircuitState::HalfOpen => {
                metrics.half_open_successes += 1;
                if metrics.half_open_successes >= u64::from(self.config.success_threshold) {
                    drop(metrics);
                    self.transition_to_closed().await;
                }
            }
            CircuitState::Closed => {
                metrics.consecutive_failures = 0;
            }
            CircuitState::Open => {
                warn!(component = %self.name, "success recorded while circuit is open");
            }
        }
    }

    async fn record_failure(&self, duration: Duration) {
        let mut metrics = self.metrics.lock().await;
        metrics.total_calls += 1;
        metrics.failure_count += 1;
        metrics.total_duration += duration;

        match self.state() {
            CircuitState::Closed => {
                metrics.consecutive_failures += 1;
                if metrics.consecutive_failures >= u64::from(self.config.failure_threshold) {
                    drop(metrics);
                    self.transition_to_open().await;
                }
            }
            CircuitState::HalfOpen => {
                // Any half-open failure immediately reopens the circuit.
                drop(metrics);
                self.transition_to_open().await;
            }
            CircuitState::Open => {}
        }
    }

    async fn transition_to_closed(&self) {
        self.state
            .store(CircuitState::Closed as u8, Ordering::Release);

        let mut metrics = self.metrics.lock().await;
        metrics.consecutive_failures = 0;
        metrics.half_open_successes = 0;

        let mut opened_at = self.opened_at.lock().await;
        *opened_at = None;

        info!(
            component = %self.name,
            total_calls = metrics.total_calls,
            "circuit breaker closed (recovered)"
        );
    }

    async fn transition_to_open(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);

        let mut opened_at = self.opened_at.lock().await;
        *opened_at = Some(Instant::now());

        let mut metrics = self.metrics.lock().await;
        metrics.half_open_successes = 0;
        self.trial_in_flight.store(false, Ordering::Release);

        warn!(
            component = %self.name,
            consecutive_failures = metrics.consecutive_failures,
            failure_threshold = self.config.failure_threshold,
            timeout_secs = self.config.timeout.as_secs(),
            "circuit breaker opened (failing fast)"
        );
    }

    async fn transition_to_half_open(&self) {
        self.state
            .store(CircuitState::HalfOpen as u8, Ordering::Release);

        let mut metrics = self.metrics.lock().await;
        metrics.half_open_successes = 0;

        info!(
            component = %self.name,
            success_threshold = self.config.success_threshold,
            "circuit breaker half-open (testing recovery)"
        );
    }

    /// Force the circuit open (emergency shutoff).
    pub async fn force_open(&self) {
        warn!(component = %self.name, "circuit breaker forced open");
        self.transition_to_open().await;
    }

    /// Force the circuit closed (emergency recovery).
    pub async fn force_closed(&self) {
        warn!(component = %self.name, "circuit breaker forced closed");
        self.transition_to_closed().await;
    }

    /// Snapshot of current metrics with derived rates.
    pub async fn metrics(&self) -> CircuitBreakerMetrics {
        let metrics = self.metrics.lock().await;
        let mut snapshot = metrics.clone();
        snapshot.current_state = self.state();
        if metrics.total_calls > 0 {
            snapshot.failure_rate = metrics.failure_count as f64 / metrics.total_calls as f64;
        }
        snapshot
    }
}

enum Admission {
    Allowed,
    Trial,
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn config(failure_threshold: u32, timeout_ms: u64, success_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            timeout: Duration::from_millis(timeout_ms),
            success_threshold,
        }
    }

    #[tokio::test]
    async fn test_normal_operation_stays_closed() {
        let circuit = CircuitBreaker::new("test", config(3, 100, 2));
        assert_eq!(circuit.state(), CircuitState::Closed);

        let result = circuit.call(|| async { Ok::<_, String>("success") }).await;
        assert!(result.is_ok());

        let metrics = circuit.metrics().await;
        assert_eq!(metrics.total_calls, 1);
        assert_eq!(metrics.success_count, 1);
        assert_eq!(metrics.failure_count, 0);
    }

    #[tokio::test]
    async fn test_opens_after_failure_threshold() {
        let circuit = CircuitBreaker::new("test", config(3, 100, 1));

        for _ in 0..3 {
            let _ = circuit.call(|| async { Err::<String, _>("boom") }).await;
        }
        assert_eq!(circuit.state(), CircuitState::Open);

        // Fourth call fails fast without executing the operation.
        let executed = std::sync::atomic::AtomicBool::new(false);
        let result = circuit
            .call(|| async {
                executed.store(true, Ordering::SeqCst);
                Ok::<_, String>("should not run")
            })
            .await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen { .. })));
        assert!(!executed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_half_open_permits_single_trial() {
        let circuit = CircuitBreaker::new("test", config(1, 50, 2));

        let _ = circuit.call(|| async { Err::<String, _>("boom") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        sleep(Duration::from_millis(60)).await;

        // One trial allowed; a concurrent second call is rejected while the
        // trial is in flight.
        let slow_trial = circuit.call(|| async {
            sleep(Duration::from_millis(30)).await;
            Ok::<_, String>("ok")
        });
        let racer = async {
            sleep(Duration::from_millis(5)).await;
            circuit.call(|| async { Ok::<_, String>("ok") }).await
        };
        let (trial_result, racer_result) = tokio::join!(slow_trial, racer);
        assert!(trial_result.is_ok());
        assert!(matches!(
            racer_result,
            Err(CircuitBreakerError::CircuitOpen { .. })
        ));
    }

    #[tokio::test]
    async fn test_closes_after_success_threshold() {
        let circuit = CircuitBreaker::new("test", config(1, 50, 2));

        let _ = circuit.call(|| async { Err::<String, _>("boom") }).await;
        sleep(Duration::from_millis(60)).await;

        let _ = circuit.call(|| async { Ok::<_, String>("ok") }).await;
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        let _ = circuit.call(|| async { Ok::<_, String>("ok") }).await;
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let circuit = CircuitBreaker::new("test", config(1, 50, 2));

        let _ = circuit.call(|| async { Err::<String, _>("boom") }).await;
        sleep(Duration::from_millis(60)).await;

        let _ = circuit.call(|| async { Err::<String, _>("still broken") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_force_operations() {
        let circuit = CircuitBreaker::new("test", config(1, 1000, 1));

        circuit.force_open().await;
        assert_eq!(circuit.state(), CircuitState::Open);

        circuit.force_closed().await;
        assert_eq!(circuit.state(), CircuitState::Closed);
    }
}
