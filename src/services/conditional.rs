//! # Conditional Service
//!
//! Per-stage branching rules evaluated against a free-form JSON context.
//! Rules are kept in declaration order and the first match wins; field lookup
//! uses dotted paths into the context document.

use crate::error::{Result, WorkflowEngineError};
use crate::models::{Condition, ConditionOperator, ConditionalRule, RuleAction, RuleMatch};
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

pub struct ConditionalService {
    /// stage id -> rules in declaration order.
    rules: DashMap<String, Vec<ConditionalRule>>,
}

impl ConditionalService {
    pub fn new() -> Self {
        Self {
            rules: DashMap::new(),
        }
    }

    pub fn add_rule(
        &self,
        stage_id: &str,
        condition: Condition,
        then_action: RuleAction,
        then_value: Option<Value>,
    ) -> Result<ConditionalRule> {
        if condition.field.trim().is_empty() {
            return Err(WorkflowEngineError::Validation {
                message: "condition field must not be empty".into(),
            });
        }
        let needs_value = !matches!(
            condition.operator,
            ConditionOperator::IsEmpty | ConditionOperator::IsNotEmpty
        );
        if needs_value && condition.value.is_none() {
            return Err(WorkflowEngineError::Validation {
                message: format!("operator {:?} requires a comparison value", condition.operator),
            });
        }

        let rule = ConditionalRule {
            id: Uuid::new_v4().to_string(),
            stage_id: stage_id.to_string(),
            condition,
            then_action,
            then_value,
        };
        self.rules
            .entry(stage_id.to_string())
            .or_default()
            .push(rule.clone());
        Ok(rule)
    }

    pub fn get_rules(&self, stage_id: &str) -> Vec<ConditionalRule> {
        self.rules
            .get(stage_id)
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn remove_rule(&self, stage_id: &str, rule_id: &str) -> bool {
        if let Some(mut rules) = self.rules.get_mut(stage_id) {
            let before = rules.len();
            rules.retain(|r| r.id != rule_id);
            return rules.len() < before;
        }
        false
    }

    /// Evaluate a stage's rules against the context, short-circuiting on the
    /// first match in declaration order.
    pub fn evaluate(&self, stage_id: &str, context: &Value) -> Option<RuleMatch> {
        let rules = self.rules.get(stage_id)?;
        for rule in rules.iter() {
            if Self::condition_matches(&rule.condition, context) {
                debug!(stage_id, rule_id = %rule.id, action = ?rule.then_action, "conditional rule matched");
                return Some(RuleMatch {
                    rule_id: rule.id.clone(),
                    action: rule.then_action,
                    value: rule.then_value.clone(),
                });
            }
        }
        None
    }

    fn condition_matches(condition: &Condition, context: &Value) -> bool {
        let field = resolve_path(context, &condition.field);
        match condition.operator {
            ConditionOperator::IsEmpty => is_empty(field),
            ConditionOperator::IsNotEmpty => !is_empty(field),
            ConditionOperator::Equals => match (field, &condition.value) {
                (Some(actual), Some(expected)) => actual == expected,
                _ => false,
            },
            ConditionOperator::GreaterThan => compare(field, condition.value.as_ref())
                .is_some_and(|ord| ord == std::cmp::Ordering::Greater),
            ConditionOperator::LessThan => compare(field, condition.value.as_ref())
                .is_some_and(|ord| ord == std::cmp::Ordering::Less),
            ConditionOperator::Contains => match (field, &condition.value) {
                (Some(Value::String(haystack)), Some(Value::String(needle))) => {
                    haystack.contains(needle.as_str())
                }
                (Some(Value::Array(items)), Some(needle)) => items.contains(needle),
                _ => false,
            },
        }
    }
}

impl Default for ConditionalService {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk a dotted path into a JSON document.
fn resolve_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cursor = context;
    for segment in path.split('.') {
        cursor = cursor.get(segment)?;
    }
    Some(cursor)
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

/// Numeric comparison, falling back to parsing numeric strings.
fn compare(field: Option<&Value>, expected: Option<&Value>) -> Option<std::cmp::Ordering> {
    let lhs = as_number(field?)?;
    let rhs = as_number(expected?)?;
    lhs.partial_cmp(&rhs)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(field: &str, operator: ConditionOperator, value: Option<Value>) -> Condition {
        Condition {
            field: field.to_string(),
            operator,
            value,
        }
    }

    #[test]
    fn test_dotted_path_equals() {
        let service = ConditionalService::new();
        service
            .add_rule(
                "s1",
                condition(
                    "case.jurisdiction",
                    ConditionOperator::Equals,
                    Some(json!("NY")),
                ),
                RuleAction::SkipStage,
                None,
            )
            .unwrap();

        let context = json!({ "case": { "jurisdiction": "NY" } });
        let matched = service.evaluate("s1", &context).unwrap();
        assert_eq!(matched.action, RuleAction::SkipStage);

        let context = json!({ "case": { "jurisdiction": "CA" } });
        assert!(service.evaluate("s1", &context).is_none());
    }

    #[test]
    fn test_first_match_wins_in_declaration_order() {
        let service = ConditionalService::new();
        service
            .add_rule(
                "s1",
                condition("amount", ConditionOperator::GreaterThan, Some(json!(100))),
                RuleAction::SetPriority,
                Some(json!("High")),
            )
            .unwrap();
        service
            .add_rule(
                "s1",
                condition("amount", ConditionOperator::GreaterThan, Some(json!(10))),
                RuleAction::Notify,
                None,
            )
            .unwrap();

        // Both match; the earlier declaration wins.
        let matched = service.evaluate("s1", &json!({ "amount": 500 })).unwrap();
        assert_eq!(matched.action, RuleAction::SetPriority);

        // Only the second matches.
        let matched = service.evaluate("s1", &json!({ "amount": 50 })).unwrap();
        assert_eq!(matched.action, RuleAction::Notify);
    }

    #[test]
    fn test_numeric_comparison_with_string_field() {
        let service = ConditionalService::new();
        service
            .add_rule(
                "s1",
                condition("hours", ConditionOperator::LessThan, Some(json!(8))),
                RuleAction::Notify,
                None,
            )
            .unwrap();
        assert!(service.evaluate("s1", &json!({ "hours": "5" })).is_some());
        assert!(service.evaluate("s1", &json!({ "hours": "12" })).is_none());
    }

    #[test]
    fn test_contains_on_strings_and_arrays() {
        let service = ConditionalService::new();
        service
            .add_rule(
                "s1",
                condition("tags", ConditionOperator::Contains, Some(json!("urgent"))),
                RuleAction::SetPriority,
                Some(json!("Critical")),
            )
            .unwrap();
        assert!(service
            .evaluate("s1", &json!({ "tags": ["routine", "urgent"] }))
            .is_some());
        assert!(service
            .evaluate("s1", &json!({ "tags": "urgent-review" }))
            .is_some());
        assert!(service.evaluate("s1", &json!({ "tags": [] })).is_none());
    }

    #[test]
    fn test_empty_operators() {
        let service = ConditionalService::new();
        service
            .add_rule(
                "s1",
                condition("notes", ConditionOperator::IsEmpty, None),
                RuleAction::Notify,
                None,
            )
            .unwrap();
        assert!(service.evaluate("s1", &json!({})).is_some());
        assert!(service.evaluate("s1", &json!({ "notes": "" })).is_some());
        assert!(service.evaluate("s1", &json!({ "notes": "call client" })).is_none());
    }

    #[test]
    fn test_rule_validation() {
        let service = ConditionalService::new();
        assert!(service
            .add_rule(
                "s1",
                condition("", ConditionOperator::Equals, Some(json!(1))),
                RuleAction::Notify,
                None,
            )
            .is_err());
        assert!(service
            .add_rule(
                "s1",
                condition("x", ConditionOperator::Equals, None),
                RuleAction::Notify,
                None,
            )
            .is_err());
    }

    proptest::proptest! {
        // String-encoded numbers compare exactly like native JSON numbers;
        // f64 Display is the shortest round-tripping form, so the parse is
        // lossless.
        #[test]
        fn prop_numeric_strings_compare_like_numbers(
            lhs in -1.0e9f64..1.0e9,
            rhs in -1.0e9f64..1.0e9,
        ) {
            let as_string = json!(lhs.to_string());
            let as_number = json!(rhs);
            proptest::prop_assert_eq!(
                compare(Some(&as_string), Some(&as_number)),
                lhs.partial_cmp(&rhs)
            );
        }
    }

    #[test]
    fn test_remove_rule() {
        let service = ConditionalService::new();
        let rule = service
            .add_rule(
                "s1",
                condition("x", ConditionOperator::IsEmpty, None),
                RuleAction::Notify,
                None,
            )
            .unwrap();
        assert!(service.remove_rule("s1", &rule.id));
        assert!(!service.remove_rule("s1", &rule.id));
        assert!(service.get_rules("s1").is_empty());
    }
}
