//! Domain records for the workflow engine. These are plain serde types; the
//! persistence collaborator owns Task and Stage storage, the engine's
//! in-memory registries own everything else.

pub mod approval;
pub mod audit;
pub mod conditional;
pub mod custom_field;
pub mod dependency;
pub mod escalation;
pub mod integration;
pub mod notification;
pub mod parallel;
pub mod reassignment;
pub mod recurring;
pub mod sla;
pub mod stage;
pub mod task;
pub mod time_tracking;
pub mod versioning;

pub use approval::{
    ApprovalChain, ApprovalChainStatus, ApprovalDecision, ApprovalOutcome, ApprovalStep,
    ApprovalStepStatus,
};
pub use audit::AuditLogEntry;
pub use conditional::{Condition, ConditionOperator, ConditionalRule, RuleAction, RuleMatch};
pub use custom_field::{CustomFieldDefinition, FieldType};
pub use dependency::{DependencyType, StartCheck, TaskDependency};
pub use escalation::{EscalationEvent, EscalationRule};
pub use integration::{DispatchReport, IntegrationConfig, IntegrationKind, IntegrationPayload};
pub use notification::Notification;
pub use parallel::{CompletionRule, GroupCompletion, ParallelGroup, ParallelGroupStatus};
pub use reassignment::ReassignmentRecord;
pub use recurring::{RecurrencePattern, RecurringTaskTemplate, RecurringWorkflow};
pub use sla::{SlaAssessment, SlaFlag, SlaRule, SlaState, SlaSweep};
pub use stage::Stage;
pub use task::Task;
pub use time_tracking::TimeEntry;
pub use versioning::{StageDiff, WorkflowVersion};
