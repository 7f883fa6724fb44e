//! # MatterFlow Core
//!
//! Workflow orchestration engine for legal matter management: task dependency
//! resolution, SLA enforcement, escalation, ordered approval chains, parallel
//! task groups, conditional branching, recurring workflows, and resilient
//! fan-out to external integrations.
//!
//! ## Architecture
//!
//! The engine is a library embedded by a host application. Persistence of
//! Task and Stage records belongs to an external collaborator behind the
//! [`repository`] traits; everything else (dependency graph, approval chains,
//! rules, audit trail) lives in process-local concurrent registries. The
//! [`orchestration::WorkflowEngine`] composition root wires fifteen domain
//! services together at construction and implements the cross-service flows;
//! a periodic [`orchestration::ScheduledMaintenance`] sweep drives SLA
//! breach detection, escalation, and recurring workflow instantiation.
//!
//! External notification goes through per-integration circuit breakers and a
//! bounded background dispatch queue so one failing webhook never blocks the
//! request path.
//!
//! ## Quick start
//!
//! ```no_run
//! use matterflow_core::config::EngineConfig;
//! use matterflow_core::models::Task;
//! use matterflow_core::orchestration::WorkflowEngine;
//! use matterflow_core::repository::InMemoryRepository;
//! use std::sync::Arc;
//!
//! # async fn run() -> matterflow_core::error::Result<()> {
//! let repo = Arc::new(InMemoryRepository::new());
//! let engine = WorkflowEngine::new(repo.clone(), repo, EngineConfig::default())?;
//!
//! engine.create_task(Task::new("t1", "s1", "c1", "Draft motion")).await?;
//! let outcome = engine.start_task("t1").await?;
//! assert!(outcome.is_started());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod repository;
pub mod resilience;
pub mod services;
pub mod store;

pub use config::EngineConfig;
pub use error::{Result, WorkflowEngineError};
pub use orchestration::{ScheduledCheckReport, StartOutcome, WorkflowEngine};
