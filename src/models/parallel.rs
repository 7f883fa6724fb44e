//! Parallel task group records: a set of tasks whose collective completion
//! gates activation of a subsequent task.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionRule {
    /// Every task in the group must complete.
    All,
    /// A single completion is enough.
    Any,
    /// completed / total * 100 must reach the threshold.
    Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParallelGroupStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelGroup {
    pub id: String,
    pub stage_id: String,
    pub task_ids: Vec<String>,
    pub completion_rule: CompletionRule,
    /// Required and in (0, 100] only for the percentage rule.
    pub completion_threshold: Option<f64>,
    pub completed_tasks: Vec<String>,
    /// Task activated when the group completes.
    pub next_task_id: Option<String>,
    pub status: ParallelGroupStatus,
}

impl ParallelGroup {
    /// Evaluate the completion rule against the current completion set.
    pub fn is_satisfied(&self) -> bool {
        let total = self.task_ids.len();
        let completed = self.completed_tasks.len();
        match self.completion_rule {
            CompletionRule::All => completed == total,
            CompletionRule::Any => completed >= 1,
            CompletionRule::Percentage => {
                let threshold = self.completion_threshold.unwrap_or(100.0);
                total > 0 && (completed as f64 / total as f64) * 100.0 >= threshold
            }
        }
    }
}

/// Raised to the orchestrator when a group's completion rule is satisfied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupCompletion {
    pub group_id: String,
    pub stage_id: String,
    pub next_task_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(rule: CompletionRule, threshold: Option<f64>, total: usize) -> ParallelGroup {
        ParallelGroup {
            id: "g1".into(),
            stage_id: "s1".into(),
            task_ids: (0..total).map(|i| format!("t{i}")).collect(),
            completion_rule: rule,
            completion_threshold: threshold,
            completed_tasks: Vec::new(),
            next_task_id: None,
            status: ParallelGroupStatus::InProgress,
        }
    }

    #[test]
    fn test_percentage_rule_threshold_boundary() {
        let mut g = group(CompletionRule::Percentage, Some(50.0), 4);
        g.completed_tasks.push("t0".into());
        assert!(!g.is_satisfied());
        g.completed_tasks.push("t1".into());
        assert!(g.is_satisfied());
    }

    #[test]
    fn test_any_rule() {
        let mut g = group(CompletionRule::Any, None, 3);
        assert!(!g.is_satisfied());
        g.completed_tasks.push("t2".into());
        assert!(g.is_satisfied());
    }

    #[test]
    fn test_all_rule() {
        let mut g = group(CompletionRule::All, None, 2);
        g.completed_tasks.push("t0".into());
        assert!(!g.is_satisfied());
        g.completed_tasks.push("t1".into());
        assert!(g.is_satisfied());
    }
}
