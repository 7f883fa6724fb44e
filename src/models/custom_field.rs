//! Custom field definitions for tasks, stages, and cases.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Boolean,
    Select,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFieldDefinition {
    pub id: String,
    /// Entity family the field attaches to, e.g. `task` or `case`.
    pub entity_type: String,
    pub name: String,
    pub field_type: FieldType,
    /// Allowed values, only for `Select` fields.
    pub options: Vec<String>,
    pub required: bool,
}
