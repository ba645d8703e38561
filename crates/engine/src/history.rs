use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::SpreadsheetSnapshot;

pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// One executed AI command bracketed by before/after snapshots. The unit of rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSnapshot {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// The command payload as received.
    pub command: serde_json::Value,
    pub command_type: String,
    pub before_state: SpreadsheetSnapshot,
    /// Equal to `before_state` for failed executions.
    pub after_state: SpreadsheetSnapshot,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_range: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Execution history, most recent first.
#[derive(Debug, Clone)]
pub struct RollbackStack {
    entries: VecDeque<ExecutionSnapshot>,
    max_entries: usize,
}

impl Default for RollbackStack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl RollbackStack {
    pub fn new(max_entries: usize) -> Self {
        Self { entries: VecDeque::new(), max_entries: max_entries.max(1) }
    }

    /// Push to the front; the oldest entry falls off past the cap.
    pub fn push(&mut self, entry: ExecutionSnapshot) {
        self.entries.push_front(entry);
        self.entries.truncate(self.max_entries);
    }

    pub fn can_rollback(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ExecutionSnapshot> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ExecutionSnapshot> {
        self.entries.get_mut(index)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Remove up to `n` entries from the front, most recent first.
    pub fn pop_front(&mut self, n: usize) -> Vec<ExecutionSnapshot> {
        let n = n.min(self.entries.len());
        self.entries.drain(..n).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionSnapshot> {
        self.entries.iter()
    }
}
