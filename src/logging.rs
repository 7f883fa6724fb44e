//! # Structured Logging
//!
//! Environment-aware structured logging for debugging interleaved async
//! workflow operations. Initialization is idempotent so embedding hosts that
//! already installed a global subscriber keep theirs.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific defaults.
/// `MATTERFLOW_LOG` overrides the filter directive entirely;
/// `MATTERFLOW_LOG_JSON=true` switches to JSON line output.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let directive = std::env::var("MATTERFLOW_LOG")
            .unwrap_or_else(|_| default_log_level(&environment).to_string());
        let json_output = std::env::var("MATTERFLOW_LOG_JSON")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let layer = if json_output {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .json()
                .with_filter(EnvFilter::new(directive.clone()))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(EnvFilter::new(directive.clone()))
                .boxed()
        };
        let subscriber = tracing_subscriber::registry().with(layer);

        // A host application may have installed a subscriber already.
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }

        tracing::info!(
            environment = %environment,
            filter = %directive,
            "structured logging initialized"
        );
    });
}

fn get_environment() -> String {
    std::env::var("MATTERFLOW_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}
