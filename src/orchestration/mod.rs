//! # Orchestration
//!
//! The engine composition root, the retry/recovery wrapper, the scheduled
//! maintenance loop, and their outcome types.

pub mod engine;
pub mod recovery;
pub mod scheduler;
pub mod types;

pub use engine::WorkflowEngine;
pub use recovery::RecoveryService;
pub use scheduler::ScheduledMaintenance;
pub use types::{ScheduledCheckReport, StartOutcome};
