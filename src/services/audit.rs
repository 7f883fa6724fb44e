//! # Audit Service
//!
//! Append-only audit trail held in a bounded ring buffer. When the buffer is
//! full the oldest entries are discarded; durable audit export belongs to the
//! persistence collaborator, not this engine.

use crate::models::AuditLogEntry;
use parking_lot::RwLock;
use std::collections::VecDeque;

pub struct AuditService {
    entries: RwLock<VecDeque<AuditLogEntry>>,
    capacity: usize,
}

impl AuditService {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn record(&self, entry: AuditLogEntry) {
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Entries for one entity, oldest first.
    pub fn for_entity(&self, entity_type: &str, entity_id: &str) -> Vec<AuditLogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .cloned()
            .collect()
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditLogEntry> {
        self.entries
            .read()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.entries.read().len()
    }
}
