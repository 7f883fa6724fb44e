//! Periodic maintenance loop driving the engine's scheduled checks.

use crate::orchestration::{ScheduledCheckReport, WorkflowEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

pub struct ScheduledMaintenance {
    engine: Arc<WorkflowEngine>,
}

impl ScheduledMaintenance {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }

    pub async fn run_once(&self) -> ScheduledCheckReport {
        self.engine.run_scheduled_checks().await
    }

    /// Run the sweep on a fixed interval until the handle is aborted. A slow
    /// sweep skips missed ticks instead of bursting to catch up.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = interval.as_secs(), "maintenance loop started");
            loop {
                ticker.tick().await;
                let report = self.run_once().await;
                if !report.is_clean() {
                    warn!(errors = ?report.errors, "maintenance sweep reported errors");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::repository::InMemoryRepository;

    #[tokio::test]
    async fn test_run_once_on_empty_engine_is_clean() {
        let repo = Arc::new(InMemoryRepository::new());
        let engine = Arc::new(
            WorkflowEngine::new(repo.clone(), repo, EngineConfig::default()).unwrap(),
        );
        let maintenance = ScheduledMaintenance::new(engine);
        let report = maintenance.run_once().await;
        assert!(report.is_clean());
        assert_eq!(report.recurring_started, 0);
    }
}
