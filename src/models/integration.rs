//! External integration configuration and outbound payloads.

use crate::constants::system;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    Webhook,
    Slack,
    Teams,
    Email,
    Zapier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub id: String,
    pub name: String,
    pub kind: IntegrationKind,
    /// Delivery target: URL for webhooks/Slack/Teams/Zapier, address for email.
    pub endpoint: String,
    pub enabled: bool,
    /// Lifecycle event names this integration receives.
    pub subscribed_events: Vec<String>,
}

impl IntegrationConfig {
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.subscribed_events.iter().any(|e| e == event)
    }
}

/// Wire payload sent to every integration kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationPayload {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
    pub source: String,
}

impl IntegrationPayload {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            timestamp: Utc::now(),
            data,
            source: system::INTEGRATION_SOURCE.to_string(),
        }
    }
}

/// Per-integration outcome of one event fan-out. A failing integration never
/// blocks the others.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchReport {
    pub event: String,
    /// Integration ids that accepted the payload.
    pub success: Vec<String>,
    /// (integration id, failure reason) pairs.
    pub failed: Vec<(String, String)>,
}
