//! # Custom Fields Service
//!
//! User-defined fields per entity family, with type-checked values.

use crate::error::{Result, WorkflowEngineError};
use crate::models::{CustomFieldDefinition, FieldType};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

pub struct CustomFieldsService {
    /// entity type -> definitions.
    definitions: DashMap<String, Vec<CustomFieldDefinition>>,
    /// (entity type, entity id) -> field id -> value.
    values: DashMap<(String, String), HashMap<String, Value>>,
}

impl CustomFieldsService {
    pub fn new() -> Self {
        Self {
            definitions: DashMap::new(),
            values: DashMap::new(),
        }
    }

    pub fn define_field(
        &self,
        entity_type: &str,
        name: &str,
        field_type: FieldType,
        options: Vec<String>,
        required: bool,
    ) -> Result<CustomFieldDefinition> {
        if name.trim().is_empty() {
            return Err(WorkflowEngineError::Validation {
                message: "field name must not be empty".into(),
            });
        }
        if field_type == FieldType::Select && options.is_empty() {
            return Err(WorkflowEngineError::Validation {
                message: "select fields require at least one option".into(),
            });
        }
        let mut definitions = self.definitions.entry(entity_type.to_string()).or_default();
        if definitions.iter().any(|d| d.name == name) {
            return Err(WorkflowEngineError::Validation {
                message: format!("field '{name}' already defined for {entity_type}"),
            });
        }
        let definition = CustomFieldDefinition {
            id: Uuid::new_v4().to_string(),
            entity_type: entity_type.to_string(),
            name: name.to_string(),
            field_type,
            options,
            required,
        };
        definitions.push(definition.clone());
        Ok(definition)
    }

    pub fn get_definitions(&self, entity_type: &str) -> Vec<CustomFieldDefinition> {
        self.definitions
            .get(entity_type)
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    pub fn remove_definition(&self, entity_type: &str, field_id: &str) -> bool {
        if let Some(mut definitions) = self.definitions.get_mut(entity_type) {
            let before = definitions.len();
            definitions.retain(|d| d.id != field_id);
            return definitions.len() < before;
        }
        false
    }

    /// Set a field value after validating it against the definition's type.
    pub fn set_value(
        &self,
        entity_type: &str,
        entity_id: &str,
        field_id: &str,
        value: Value,
    ) -> Result<()> {
        let definition = self
            .definitions
            .get(entity_type)
            .and_then(|defs| defs.iter().find(|d| d.id == field_id).cloned())
            .ok_or_else(|| WorkflowEngineError::Validation {
                message: format!("no field {field_id} defined for {entity_type}"),
            })?;

        validate_value(&definition, &value)?;

        self.values
            .entry((entity_type.to_string(), entity_id.to_string()))
            .or_default()
            .insert(field_id.to_string(), value);
        Ok(())
    }

    pub fn get_values(&self, entity_type: &str, entity_id: &str) -> HashMap<String, Value> {
        self.values
            .get(&(entity_type.to_string(), entity_id.to_string()))
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn get_value(&self, entity_type: &str, entity_id: &str, field_id: &str) -> Option<Value> {
        self.values
            .get(&(entity_type.to_string(), entity_id.to_string()))
            .and_then(|v| v.get(field_id).cloned())
    }
}

impl Default for CustomFieldsService {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_value(definition: &CustomFieldDefinition, value: &Value) -> Result<()> {
    if value.is_null() {
        if definition.required {
            return Err(WorkflowEngineError::Validation {
                message: format!("field '{}' is required", definition.name),
            });
        }
        return Ok(());
    }

    let ok = match definition.field_type {
        FieldType::Text => value.is_string(),
        FieldType::Number => {
            value.is_number() || value.as_str().is_some_and(|s| s.parse::<f64>().is_ok())
        }
        FieldType::Date => value
            .as_str()
            .is_some_and(|s| s.parse::<chrono::DateTime<chrono::Utc>>().is_ok()),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Select => value
            .as_str()
            .is_some_and(|s| definition.options.iter().any(|o| o == s)),
    };

    if ok {
        Ok(())
    } else {
        Err(WorkflowEngineError::Validation {
            message: format!(
                "value for field '{}' does not match type {:?}",
                definition.name, definition.field_type
            ),
        })
    }
}
