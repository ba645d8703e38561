//! Full-workbook snapshots with integrity checksums.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sheetpilot_core::CellArea;

use crate::grid::{Grid, GridError, SerializeOptions};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot data corrupted (손상): {id} (expected {expected}, found {actual})")]
    Corrupted { id: String, expected: String, actual: String },
    #[error("snapshot not found: {0}")]
    NotFound(String),
}

/// Content hash of serialized workbook data.
pub fn checksum_of(sheet_data: &serde_json::Value) -> String {
    format!("blake3:{}", blake3::hash(sheet_data.to_string().as_bytes()).to_hex())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetSnapshot {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub sheet_data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_range: Option<String>,
    pub checksum: String,
    pub description: String,
}

impl SpreadsheetSnapshot {
    /// Serialize the whole grid with the snapshot options.
    pub fn capture(grid: &dyn Grid, description: &str, affected: Option<CellArea>) -> Result<Self, GridError> {
        let sheet_data = grid.to_json(&SerializeOptions::SNAPSHOT)?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            checksum: checksum_of(&sheet_data),
            sheet_data,
            affected_range: affected.map(|a| a.to_string()),
            description: description.to_string(),
        })
    }

    /// Fails if `sheet_data` no longer matches the stored checksum.
    pub fn verify(&self) -> Result<(), SnapshotError> {
        let actual = checksum_of(&self.sheet_data);
        if actual == self.checksum {
            Ok(())
        } else {
            Err(SnapshotError::Corrupted { id: self.id.clone(), expected: self.checksum.clone(), actual })
        }
    }
}

/// Snapshots by id, evicted oldest-first past `retention`.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    entries: VecDeque<SpreadsheetSnapshot>,
    retention: usize,
}

impl SnapshotCache {
    pub fn new(retention: usize) -> Self {
        Self { entries: VecDeque::new(), retention: retention.max(1) }
    }

    pub fn insert(&mut self, snapshot: SpreadsheetSnapshot) {
        self.entries.push_back(snapshot);
        while self.entries.len() > self.retention {
            if let Some(old) = self.entries.pop_front() {
                log::debug!("evicting snapshot {} ({})", old.id, old.description);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&SpreadsheetSnapshot> {
        self.entries.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SpreadsheetSnapshot> {
        self.entries.iter_mut().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpreadsheetSnapshot> {
        self.entries.iter()
    }
}
