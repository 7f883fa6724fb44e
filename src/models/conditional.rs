//! Conditional branching rules evaluated against a free-form context map.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Equals,
    GreaterThan,
    LessThan,
    Contains,
    IsEmpty,
    IsNotEmpty,
}

/// A single predicate over a dotted-path field of the evaluation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path into the context, e.g. `case.filing.jurisdiction`.
    pub field: String,
    pub operator: ConditionOperator,
    pub value: Option<Value>,
}

/// Action taken when a rule's condition matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    SkipStage,
    AddTask,
    AssignTo,
    SetPriority,
    Notify,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalRule {
    pub id: String,
    pub stage_id: String,
    pub condition: Condition,
    pub then_action: RuleAction,
    pub then_value: Option<Value>,
}

/// First matching rule for a stage, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule_id: String,
    pub action: RuleAction,
    pub value: Option<Value>,
}
