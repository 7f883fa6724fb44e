//! # External Integration Service
//!
//! Fans lifecycle events out to configured webhooks, Slack, Teams, email, and
//! Zapier targets. Every integration gets its own circuit breaker so one
//! failing downstream never blocks or poisons the rest, and background
//! dispatch runs through a bounded queue whose outcomes are observable.

use crate::error::{Result, WorkflowEngineError};
use crate::models::{DispatchReport, IntegrationConfig, IntegrationPayload};
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Delivery seam for outbound payloads. Production hosts plug in HTTP/SMTP
/// transports; the default transport only logs, and tests use recording or
/// failing fakes.
#[async_trait]
pub trait IntegrationTransport: Send + Sync {
    async fn deliver(
        &self,
        integration: &IntegrationConfig,
        payload: &IntegrationPayload,
    ) -> anyhow::Result<()>;
}

/// Transport that logs deliveries without performing I/O.
pub struct LoggingTransport;

#[async_trait]
impl IntegrationTransport for LoggingTransport {
    async fn deliver(
        &self,
        integration: &IntegrationConfig,
        payload: &IntegrationPayload,
    ) -> anyhow::Result<()> {
        info!(
            integration = %integration.name,
            kind = ?integration.kind,
            endpoint = %integration.endpoint,
            event = %payload.event,
            "integration delivery"
        );
        Ok(())
    }
}

pub struct ExternalIntegrationService {
    transport: Arc<dyn IntegrationTransport>,
    integrations: DashMap<String, IntegrationConfig>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    breaker_config: CircuitBreakerConfig,
}

impl ExternalIntegrationService {
    pub fn new(
        transport: Arc<dyn IntegrationTransport>,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            transport,
            integrations: DashMap::new(),
            breakers: DashMap::new(),
            breaker_config,
        }
    }

    pub fn register(&self, mut integration: IntegrationConfig) -> Result<IntegrationConfig> {
        if integration.endpoint.trim().is_empty() {
            return Err(WorkflowEngineError::Validation {
                message: "integration endpoint must not be empty".into(),
            });
        }
        if integration.subscribed_events.is_empty() {
            return Err(WorkflowEngineError::Validation {
                message: "integration must subscribe to at least one event".into(),
            });
        }
        if integration.id.is_empty() {
            integration.id = Uuid::new_v4().to_string();
        }
        self.breakers.insert(
            integration.id.clone(),
            Arc::new(CircuitBreaker::new(
                format!("integration:{}", integration.name),
                self.breaker_config.clone(),
            )),
        );
        self.integrations
            .insert(integration.id.clone(), integration.clone());
        Ok(integration)
    }

    pub fn get(&self, id: &str) -> Option<IntegrationConfig> {
        self.integrations.get(id).map(|i| i.clone())
    }

    pub fn list(&self) -> Vec<IntegrationConfig> {
        self.integrations.iter().map(|e| e.value().clone()).collect()
    }

    pub fn remove(&self, id: &str) -> bool {
        self.breakers.remove(id);
        self.integrations.remove(id).is_some()
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let mut integration =
            self.integrations
                .get_mut(id)
                .ok_or_else(|| WorkflowEngineError::Validation {
                    message: format!("no integration {id}"),
                })?;
        integration.enabled = enabled;
        Ok(())
    }

    /// Breaker state for diagnostics.
    pub fn breaker(&self, id: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(id).map(|b| Arc::clone(&b))
    }

    /// Fan an event out to every enabled integration subscribed to it,
    /// concurrently. Failures are isolated per integration and reported, not
    /// aggregated into one fatal error.
    pub async fn trigger_event(&self, event: &str, data: Value) -> DispatchReport {
        let payload = IntegrationPayload::new(event, data);
        let targets: Vec<IntegrationConfig> = self
            .integrations
            .iter()
            .filter(|e| e.value().enabled && e.value().subscribes_to(event))
            .map(|e| e.value().clone())
            .collect();

        let mut report = DispatchReport {
            event: event.to_string(),
            ..Default::default()
        };
        if targets.is_empty() {
            debug!(event, "no integrations subscribed");
            return report;
        }

        let deliveries = targets.into_iter().map(|integration| {
            let payload = payload.clone();
            let transport = Arc::clone(&self.transport);
            let breaker = self.breaker(&integration.id);
            async move {
                let id = integration.id.clone();
                let outcome = match breaker {
                    Some(breaker) => breaker
                        .call(|| transport.deliver(&integration, &payload))
                        .await
                        .map_err(|e| match e {
                            CircuitBreakerError::CircuitOpen { component } => {
                                format!("circuit open for {component}")
                            }
                            CircuitBreakerError::OperationFailed(err) => err.to_string(),
                        }),
                    None => transport
                        .deliver(&integration, &payload)
                        .await
                        .map_err(|e| e.to_string()),
                };
                (id, integration.name, outcome)
            }
        });

        for (id, name, outcome) in futures::future::join_all(deliveries).await {
            match outcome {
                Ok(()) => report.success.push(id),
                Err(reason) => {
                    warn!(integration = %name, event, %reason, "integration delivery failed");
                    report.failed.push((id, reason));
                }
            }
        }
        report
    }
}

/// Queued request for background dispatch.
#[derive(Debug)]
struct DispatchRequest {
    event: String,
    data: Value,
}

/// Bounded background dispatch queue in front of
/// [`ExternalIntegrationService::trigger_event`]. Enqueueing never blocks
/// request flow; a full queue surfaces as `RateLimit` instead of silently
/// dropping events, and each drained report is logged.
pub struct IntegrationDispatcher {
    tx: mpsc::Sender<DispatchRequest>,
    worker: JoinHandle<()>,
}

impl IntegrationDispatcher {
    pub fn spawn(service: Arc<ExternalIntegrationService>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<DispatchRequest>(capacity);
        let worker = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let report = service.trigger_event(&request.event, request.data).await;
                if !report.failed.is_empty() {
                    warn!(
                        event = %report.event,
                        delivered = report.success.len(),
                        failed = report.failed.len(),
                        "background dispatch completed with failures"
                    );
                } else {
                    debug!(
                        event = %report.event,
                        delivered = report.success.len(),
                        "background dispatch completed"
                    );
                }
            }
        });
        Self { tx, worker }
    }

    /// Enqueue an event for background fan-out.
    pub fn enqueue(&self, event: &str, data: Value) -> Result<()> {
        self.tx
            .try_send(DispatchRequest {
                event: event.to_string(),
                data,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => WorkflowEngineError::RateLimit {
                    message: "integration dispatch queue is full".into(),
                },
                mpsc::error::TrySendError::Closed(_) => WorkflowEngineError::Integration {
                    integration: "dispatcher".into(),
                    message: "dispatch worker stopped".into(),
                },
            })
    }

    pub fn shutdown(&self) {
        self.worker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::events;
    use crate::models::IntegrationKind;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;

    /// Transport recording deliveries, optionally failing named targets.
    struct FakeTransport {
        delivered: Mutex<Vec<(String, String)>>,
        fail_for: Vec<String>,
    }

    impl FakeTransport {
        fn new(fail_for: Vec<String>) -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
                fail_for,
            }
        }
    }

    #[async_trait]
    impl IntegrationTransport for FakeTransport {
        async fn deliver(
            &self,
            integration: &IntegrationConfig,
            payload: &IntegrationPayload,
        ) -> anyhow::Result<()> {
            if self.fail_for.contains(&integration.name) {
                anyhow::bail!("connection refused");
            }
            self.delivered
                .lock()
                .push((integration.name.clone(), payload.event.clone()));
            Ok(())
        }
    }

    fn config(name: &str, kind: IntegrationKind, events: Vec<&str>) -> IntegrationConfig {
        IntegrationConfig {
            id: String::new(),
            name: name.into(),
            kind,
            endpoint: "https://example.test/hook".into(),
            enabled: true,
            subscribed_events: events.into_iter().map(str::to_string).collect(),
        }
    }

    fn breaker_config(failure_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            timeout: Duration::from_secs(30),
            success_threshold: 1,
        }
    }

    #[tokio::test]
    async fn test_fan_out_isolates_failures() {
        let transport = Arc::new(FakeTransport::new(vec!["broken-slack".into()]));
        let service =
            ExternalIntegrationService::new(transport.clone(), breaker_config(5));
        let ok = service
            .register(config("ops-webhook", IntegrationKind::Webhook, vec![events::TASK_COMPLETED]))
            .unwrap();
        let bad = service
            .register(config("broken-slack", IntegrationKind::Slack, vec![events::TASK_COMPLETED]))
            .unwrap();

        let report = service
            .trigger_event(events::TASK_COMPLETED, json!({ "task_id": "t1" }))
            .await;
        assert_eq!(report.success, vec![ok.id]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, bad.id);
        assert_eq!(transport.delivered.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribed_and_disabled_skipped() {
        let transport = Arc::new(FakeTransport::new(vec![]));
        let service = ExternalIntegrationService::new(transport.clone(), breaker_config(5));
        service
            .register(config("only-sla", IntegrationKind::Teams, vec![events::SLA_BREACHED]))
            .unwrap();
        let disabled = service
            .register(config("paused", IntegrationKind::Webhook, vec![events::TASK_COMPLETED]))
            .unwrap();
        service.set_enabled(&disabled.id, false).unwrap();

        let report = service
            .trigger_event(events::TASK_COMPLETED, json!({}))
            .await;
        assert!(report.success.is_empty());
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_breaker_opens_per_integration() {
        let transport = Arc::new(FakeTransport::new(vec!["flaky".into()]));
        let service = ExternalIntegrationService::new(transport.clone(), breaker_config(2));
        let flaky = service
            .register(config("flaky", IntegrationKind::Zapier, vec![events::TASK_COMPLETED]))
            .unwrap();
        let healthy = service
            .register(config("healthy", IntegrationKind::Webhook, vec![events::TASK_COMPLETED]))
            .unwrap();

        for _ in 0..3 {
            service
                .trigger_event(events::TASK_COMPLETED, json!({}))
                .await;
        }

        // Flaky target's breaker is open; healthy one keeps delivering.
        use crate::resilience::CircuitState;
        assert_eq!(service.breaker(&flaky.id).unwrap().state(), CircuitState::Open);
        assert_eq!(
            service.breaker(&healthy.id).unwrap().state(),
            CircuitState::Closed
        );
        let report = service
            .trigger_event(events::TASK_COMPLETED, json!({}))
            .await;
        assert!(report.success.contains(&healthy.id));
        assert!(report.failed.iter().any(|(id, reason)| {
            id == &flaky.id && reason.contains("circuit open")
        }));
    }

    #[tokio::test]
    async fn test_background_dispatcher_drains_queue() {
        let transport = Arc::new(FakeTransport::new(vec![]));
        let service = Arc::new(ExternalIntegrationService::new(
            transport.clone(),
            breaker_config(5),
        ));
        service
            .register(config("hook", IntegrationKind::Webhook, vec![events::TASK_COMPLETED]))
            .unwrap();

        let dispatcher = IntegrationDispatcher::spawn(Arc::clone(&service), 8);
        dispatcher
            .enqueue(events::TASK_COMPLETED, json!({ "task_id": "t1" }))
            .unwrap();
        dispatcher
            .enqueue(events::TASK_COMPLETED, json!({ "task_id": "t2" }))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.delivered.lock().len(), 2);
        dispatcher.shutdown();
    }

    #[tokio::test]
    async fn test_full_queue_rate_limits() {
        let transport = Arc::new(FakeTransport::new(vec![]));
        let service = Arc::new(ExternalIntegrationService::new(
            transport,
            breaker_config(5),
        ));
        // No worker draining: spawn then immediately abort it.
        let dispatcher = IntegrationDispatcher::spawn(Arc::clone(&service), 1);
        dispatcher.shutdown();
        tokio::time::sleep(Duration::from_millis(10)).await;

        dispatcher.enqueue("e", json!({})).unwrap();
        let err = dispatcher.enqueue("e", json!({})).unwrap_err();
        assert_eq!(err.code(), "RATE_LIMITED");
    }

    #[tokio::test]
    async fn test_registration_validation() {
        let service = ExternalIntegrationService::new(
            Arc::new(LoggingTransport),
            breaker_config(5),
        );
        let mut bad = config("x", IntegrationKind::Email, vec![events::TASK_COMPLETED]);
        bad.endpoint = "  ".into();
        assert!(service.register(bad).is_err());

        let bad = config("x", IntegrationKind::Email, vec![]);
        assert!(service.register(bad).is_err());
    }
}
