//! # Versioning Service
//!
//! Immutable workflow template snapshots with monotonic version numbers and
//! at most one active version per template. Rollback copies an old snapshot
//! forward as a new version rather than rewinding history.

use crate::error::{Result, WorkflowEngineError};
use crate::models::{StageDiff, WorkflowVersion};
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

pub struct VersioningService {
    /// template id -> versions, ascending.
    versions: DashMap<String, Vec<WorkflowVersion>>,
}

impl VersioningService {
    pub fn new() -> Self {
        Self {
            versions: DashMap::new(),
        }
    }

    /// Create a new version (max existing + 1) and make it the single active
    /// one for the template.
    pub fn create_version(
        &self,
        template_id: &str,
        stages: Value,
        created_by: Option<String>,
        change_note: Option<String>,
    ) -> Result<WorkflowVersion> {
        if !stages.is_array() {
            return Err(WorkflowEngineError::Validation {
                message: "stages snapshot must be an array of stage definitions".into(),
            });
        }

        let mut versions = self.versions.entry(template_id.to_string()).or_default();
        let next = versions.iter().map(|v| v.version).max().unwrap_or(0) + 1;
        for existing in versions.iter_mut() {
            existing.is_active = false;
        }
        let version = WorkflowVersion {
            id: Uuid::new_v4().to_string(),
            template_id: template_id.to_string(),
            version: next,
            stages,
            created_at: Utc::now(),
            created_by,
            change_note,
            is_active: true,
        };
        versions.push(version.clone());
        info!(template_id, version = next, "workflow version created");
        Ok(version)
    }

    pub fn get(&self, template_id: &str, version: u32) -> Option<WorkflowVersion> {
        self.versions
            .get(template_id)
            .and_then(|versions| versions.iter().find(|v| v.version == version).cloned())
    }

    pub fn list(&self, template_id: &str) -> Vec<WorkflowVersion> {
        self.versions
            .get(template_id)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn active(&self, template_id: &str) -> Option<WorkflowVersion> {
        self.versions
            .get(template_id)
            .and_then(|versions| versions.iter().find(|v| v.is_active).cloned())
    }

    /// Make one version active, deactivating the rest.
    pub fn activate(&self, template_id: &str, version: u32) -> Result<WorkflowVersion> {
        let mut versions =
            self.versions
                .get_mut(template_id)
                .ok_or_else(|| WorkflowEngineError::Validation {
                    message: format!("no versions for template {template_id}"),
                })?;
        if !versions.iter().any(|v| v.version == version) {
            return Err(WorkflowEngineError::Validation {
                message: format!("template {template_id} has no version {version}"),
            });
        }
        let mut activated = None;
        for v in versions.iter_mut() {
            v.is_active = v.version == version;
            if v.is_active {
                activated = Some(v.clone());
            }
        }
        Ok(activated.expect("version presence checked above"))
    }

    /// Stage-name level diff between two versions.
    pub fn compare(&self, template_id: &str, from: u32, to: u32) -> Result<StageDiff> {
        let from_version =
            self.get(template_id, from)
                .ok_or_else(|| WorkflowEngineError::Validation {
                    message: format!("template {template_id} has no version {from}"),
                })?;
        let to_version =
            self.get(template_id, to)
                .ok_or_else(|| WorkflowEngineError::Validation {
                    message: format!("template {template_id} has no version {to}"),
                })?;

        let from_stages = stage_map(&from_version.stages);
        let to_stages = stage_map(&to_version.stages);

        let mut diff = StageDiff::default();
        for (name, body) in &to_stages {
            match from_stages.get(name) {
                None => diff.added.push(name.clone()),
                Some(old) if *old != *body => diff.changed.push(name.clone()),
                Some(_) => {}
            }
        }
        for name in from_stages.keys() {
            if !to_stages.contains_key(name) {
                diff.removed.push(name.clone());
            }
        }
        diff.added.sort();
        diff.removed.sort();
        diff.changed.sort();
        Ok(diff)
    }

    /// Copy an old snapshot forward as a new active version.
    pub fn rollback(&self, template_id: &str, version: u32) -> Result<WorkflowVersion> {
        let source =
            self.get(template_id, version)
                .ok_or_else(|| WorkflowEngineError::Validation {
                    message: format!("template {template_id} has no version {version}"),
                })?;
        self.create_version(
            template_id,
            source.stages.clone(),
            None,
            Some(format!("rollback to version {version}")),
        )
    }
}

impl Default for VersioningService {
    fn default() -> Self {
        Self::new()
    }
}

/// Index a stages snapshot by stage name.
fn stage_map(stages: &Value) -> std::collections::HashMap<String, Value> {
    stages
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|s| {
                    s.get("name")
                        .and_then(Value::as_str)
                        .map(|name| (name.to_string(), s.clone()))
                })
                .collect()
        })
        .unwrap_or_default()
}
