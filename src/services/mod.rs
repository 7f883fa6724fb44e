//! # Domain Services
//!
//! One service per workflow concern. Services are constructed once at process
//! start and passed to the orchestrator through constructors; there is no
//! runtime service lookup. Registries are process-local concurrent maps, so
//! every service is safe to share across tasks on a multi-threaded runtime.

pub mod analytics;
pub mod approval;
pub mod audit;
pub mod conditional;
pub mod custom_fields;
pub mod dependency;
pub mod escalation;
pub mod integration;
pub mod notification;
pub mod parallel;
pub mod reassignment;
pub mod recurring;
pub mod sla;
pub mod time_tracking;
pub mod versioning;

pub use analytics::{AnalyticsService, CaseMetrics, CaseStatusSummary, DailyVelocity, StageBottleneck};
pub use approval::ApprovalService;
pub use audit::AuditService;
pub use conditional::ConditionalService;
pub use custom_fields::CustomFieldsService;
pub use dependency::DependencyService;
pub use escalation::EscalationService;
pub use integration::{
    ExternalIntegrationService, IntegrationDispatcher, IntegrationTransport, LoggingTransport,
};
pub use notification::NotificationService;
pub use parallel::ParallelService;
pub use reassignment::ReassignmentService;
pub use recurring::RecurringService;
pub use sla::SlaService;
pub use time_tracking::TimeTrackingService;
pub use versioning::VersioningService;
