//! # Dependency Service
//!
//! Maintains the task dependency graph and answers start-readiness queries.
//! The graph must stay acyclic across all edge types; cycle detection runs an
//! iterative worklist traversal so large graphs cannot overflow the call
//! stack. Blocking dependencies gate task start until their target is done;
//! informational dependencies never block.

use crate::error::{Result, WorkflowEngineError};
use crate::models::{DependencyType, StartCheck, TaskDependency};
use crate::repository::TaskRepository;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

pub struct DependencyService {
    tasks: Arc<dyn TaskRepository>,
    graph: DashMap<String, TaskDependency>,
}

impl DependencyService {
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self {
            tasks,
            graph: DashMap::new(),
        }
    }

    /// Replace the dependency edge set for a task. Validates that the task
    /// and every prerequisite exist, then rejects edge sets that would make
    /// the graph cyclic.
    pub async fn set_dependencies(
        &self,
        task_id: &str,
        depends_on: Vec<String>,
        dependency_type: DependencyType,
    ) -> Result<()> {
        if self.tasks.find_by_id(task_id).await?.is_none() {
            return Err(WorkflowEngineError::TaskNotFound {
                task_id: task_id.to_string(),
            });
        }
        for dep_id in &depends_on {
            if dep_id == task_id {
                return Err(WorkflowEngineError::CircularDependency {
                    task_id: task_id.to_string(),
                    chain: vec![task_id.to_string(), task_id.to_string()],
                });
            }
            if self.tasks.find_by_id(dep_id).await?.is_none() {
                return Err(WorkflowEngineError::TaskNotFound {
                    task_id: dep_id.clone(),
                });
            }
        }

        if let Some(chain) = self.find_cycle(task_id, &depends_on) {
            return Err(WorkflowEngineError::CircularDependency {
                task_id: task_id.to_string(),
                chain,
            });
        }

        debug!(
            task_id,
            count = depends_on.len(),
            ?dependency_type,
            "dependencies set"
        );
        self.graph.insert(
            task_id.to_string(),
            TaskDependency {
                task_id: task_id.to_string(),
                depends_on,
                dependency_type,
            },
        );
        Ok(())
    }

    pub fn get_dependencies(&self, task_id: &str) -> Option<TaskDependency> {
        self.graph.get(task_id).map(|d| d.clone())
    }

    pub fn remove_dependencies(&self, task_id: &str) -> Option<TaskDependency> {
        self.graph.remove(task_id).map(|(_, d)| d)
    }

    /// Check whether a task may start. Returns the blocking prerequisites
    /// that are not yet done; informational dependencies never appear.
    pub async fn can_start_task(&self, task_id: &str) -> Result<StartCheck> {
        if self.tasks.find_by_id(task_id).await?.is_none() {
            return Err(WorkflowEngineError::TaskNotFound {
                task_id: task_id.to_string(),
            });
        }

        let dependency = match self.graph.get(task_id) {
            Some(d) => d.clone(),
            None => return Ok(StartCheck::ready()),
        };
        if dependency.dependency_type == DependencyType::Informational {
            return Ok(StartCheck::ready());
        }

        let mut blocked_by = Vec::new();
        for dep_id in &dependency.depends_on {
            let satisfied = self
                .tasks
                .find_by_id(dep_id)
                .await?
                .is_some_and(|t| t.status.satisfies_dependencies());
            if !satisfied {
                blocked_by.push(dep_id.clone());
            }
        }

        if blocked_by.is_empty() {
            Ok(StartCheck::ready())
        } else {
            Ok(StartCheck::blocked(blocked_by))
        }
    }

    /// Iterative depth-first search over the existing graph with the proposed
    /// edges substituted for `task_id`. Returns the cycle path when one edge
    /// sequence leads back to `task_id`.
    fn find_cycle(&self, task_id: &str, proposed: &[String]) -> Option<Vec<String>> {
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        for entry in self.graph.iter() {
            adjacency.insert(entry.key().clone(), entry.value().depends_on.clone());
        }
        adjacency.insert(task_id.to_string(), proposed.to_vec());

        let mut visited: HashSet<String> = HashSet::new();
        let mut parent: HashMap<String, String> = HashMap::new();
        let mut worklist: Vec<(String, String)> = proposed
            .iter()
            .map(|dep| (task_id.to_string(), dep.clone()))
            .collect();

        while let Some((from, node)) = worklist.pop() {
            if node == task_id {
                // Reconstruct the path task_id -> ... -> task_id.
                let mut chain = vec![node.clone()];
                let mut cursor = from;
                while cursor != task_id {
                    chain.push(cursor.clone());
                    cursor = parent.get(&cursor)?.clone();
                }
                chain.push(task_id.to_string());
                chain.reverse();
                return Some(chain);
            }
            if !visited.insert(node.clone()) {
                continue;
            }
            parent.insert(node.clone(), from);
            if let Some(next) = adjacency.get(&node) {
                for dep in next {
                    worklist.push((node.clone(), dep.clone()));
                }
            }
        }
        None
    }
}
