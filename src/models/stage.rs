//! Stage record as stored by the persistence collaborator.

use crate::constants::StageStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub case_id: String,
    pub name: String,
    pub status: StageStatus,
    /// Position of the stage within its case, lowest first.
    pub order: u32,
    /// Completion percentage over the stage's tasks, 0..=100.
    pub progress: u8,
}

impl Stage {
    pub fn new(
        id: impl Into<String>,
        case_id: impl Into<String>,
        name: impl Into<String>,
        order: u32,
    ) -> Self {
        Self {
            id: id.into(),
            case_id: case_id.into(),
            name: name.into(),
            status: StageStatus::Pending,
            order,
            progress: 0,
        }
    }
}
