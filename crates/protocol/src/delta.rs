//! Deltas: one atomic grid change, and the batch wire format that carries them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::style::StyleProperties;

// =============================================================================
// Delta
// =============================================================================

/// What a delta does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeltaAction {
    SetCellValue,
    SetCellFormula,
    SetCellStyle,
    DeleteCells,
    InsertRows,
    DeleteRows,
    InsertColumns,
    DeleteColumns,
    AddSheet,
    DeleteSheet,
    RenameSheet,
    /// Any action name this build does not know. Applying it is a logged no-op.
    #[serde(other)]
    Unsupported,
}

impl DeltaAction {
    /// Actions addressed by `cellAddress` or `range`.
    pub fn is_cell_scoped(&self) -> bool {
        matches!(
            self,
            DeltaAction::SetCellValue
                | DeltaAction::SetCellFormula
                | DeltaAction::SetCellStyle
                | DeltaAction::DeleteCells
        )
    }

    /// Row/column insert and delete, addressed by index + count.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DeltaAction::InsertRows
                | DeltaAction::DeleteRows
                | DeltaAction::InsertColumns
                | DeltaAction::DeleteColumns
        )
    }

    /// Workbook-level sheet collection changes.
    pub fn is_sheet_scoped(&self) -> bool {
        matches!(self, DeltaAction::AddSheet | DeltaAction::DeleteSheet | DeltaAction::RenameSheet)
    }
}

/// Delta shape violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    #[error("{0:?} delta needs exactly one of cellAddress or range")]
    Addressing(DeltaAction),
    #[error("{0:?} delta is missing {1}")]
    MissingField(DeltaAction, &'static str),
}

/// One atomic change to the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    pub action: DeltaAction,
    pub sheet_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Delta {
    fn bare(action: DeltaAction, sheet_name: &str) -> Self {
        Self {
            action,
            sheet_name: sheet_name.to_string(),
            cell_address: None,
            range: None,
            value: None,
            formula: None,
            style: None,
            row_index: None,
            column_index: None,
            count: None,
            timestamp: Utc::now(),
        }
    }

    pub fn set_value(sheet_name: &str, address: &str, value: impl Into<serde_json::Value>) -> Self {
        Self {
            cell_address: Some(address.to_string()),
            value: Some(value.into()),
            ..Self::bare(DeltaAction::SetCellValue, sheet_name)
        }
    }

    pub fn set_formula(sheet_name: &str, address: &str, formula: &str) -> Self {
        Self {
            cell_address: Some(address.to_string()),
            formula: Some(formula.to_string()),
            ..Self::bare(DeltaAction::SetCellFormula, sheet_name)
        }
    }

    pub fn set_style(sheet_name: &str, address: &str, style: StyleProperties) -> Self {
        Self {
            cell_address: Some(address.to_string()),
            style: Some(style),
            ..Self::bare(DeltaAction::SetCellStyle, sheet_name)
        }
    }

    pub fn delete_cells(sheet_name: &str, address: &str) -> Self {
        Self {
            cell_address: Some(address.to_string()),
            ..Self::bare(DeltaAction::DeleteCells, sheet_name)
        }
    }

    pub fn insert_rows(sheet_name: &str, row_index: usize, count: usize) -> Self {
        Self {
            row_index: Some(row_index),
            count: Some(count),
            ..Self::bare(DeltaAction::InsertRows, sheet_name)
        }
    }

    pub fn delete_rows(sheet_name: &str, row_index: usize, count: usize) -> Self {
        Self {
            row_index: Some(row_index),
            count: Some(count),
            ..Self::bare(DeltaAction::DeleteRows, sheet_name)
        }
    }

    pub fn insert_columns(sheet_name: &str, column_index: usize, count: usize) -> Self {
        Self {
            column_index: Some(column_index),
            count: Some(count),
            ..Self::bare(DeltaAction::InsertColumns, sheet_name)
        }
    }

    pub fn delete_columns(sheet_name: &str, column_index: usize, count: usize) -> Self {
        Self {
            column_index: Some(column_index),
            count: Some(count),
            ..Self::bare(DeltaAction::DeleteColumns, sheet_name)
        }
    }

    pub fn add_sheet(sheet_name: &str) -> Self {
        Self::bare(DeltaAction::AddSheet, sheet_name)
    }

    pub fn delete_sheet(sheet_name: &str) -> Self {
        Self::bare(DeltaAction::DeleteSheet, sheet_name)
    }

    pub fn rename_sheet(sheet_name: &str, new_name: &str) -> Self {
        Self {
            value: Some(serde_json::Value::String(new_name.to_string())),
            ..Self::bare(DeltaAction::RenameSheet, sheet_name)
        }
    }

    /// Switch a cell-scoped delta from single-cell to range form.
    pub fn over_range(mut self, range: &str) -> Self {
        self.cell_address = None;
        self.range = Some(range.to_string());
        self
    }

    /// Structural count; a missing count means one row/column.
    pub fn count_or_one(&self) -> usize {
        self.count.unwrap_or(1).max(1)
    }

    /// Check that the addressing fields this action needs are present.
    pub fn validate(&self) -> Result<(), DeltaError> {
        let action = self.action;
        if action.is_cell_scoped() {
            if self.cell_address.is_some() == self.range.is_some() {
                return Err(DeltaError::Addressing(action));
            }
            match action {
                DeltaAction::SetCellFormula if self.formula.is_none() => {
                    return Err(DeltaError::MissingField(action, "formula"));
                }
                DeltaAction::SetCellStyle if self.style.is_none() => {
                    return Err(DeltaError::MissingField(action, "style"));
                }
                _ => {}
            }
        }
        match action {
            DeltaAction::InsertRows | DeltaAction::DeleteRows if self.row_index.is_none() => {
                Err(DeltaError::MissingField(action, "rowIndex"))
            }
            DeltaAction::InsertColumns | DeltaAction::DeleteColumns if self.column_index.is_none() => {
                Err(DeltaError::MissingField(action, "columnIndex"))
            }
            DeltaAction::RenameSheet if self.new_sheet_name().is_none() => {
                Err(DeltaError::MissingField(action, "value (new sheet name)"))
            }
            _ => Ok(()),
        }
    }

    /// New name carried by a rename-sheet delta.
    pub fn new_sheet_name(&self) -> Option<&str> {
        self.value.as_ref().and_then(|v| v.as_str()).filter(|s| !s.trim().is_empty())
    }
}

// =============================================================================
// Batches
// =============================================================================

/// Deltas grouped for one send, plus retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaBatch {
    pub deltas: Vec<Delta>,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
}

impl DeltaBatch {
    pub fn new(deltas: Vec<Delta>) -> Self {
        Self { deltas, created_at: Utc::now(), retry_count: 0 }
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Request body for the sync endpoint.
    pub fn to_request(&self) -> ApplyBatchDeltasRequest {
        ApplyBatchDeltasRequest { deltas: self.deltas.iter().map(ApplyDeltaRequest::from).collect() }
    }
}

/// Per-delta element of the batch request. Mirrors `Delta` without the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyDeltaRequest {
    pub action: DeltaAction,
    pub sheet_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl From<&Delta> for ApplyDeltaRequest {
    fn from(d: &Delta) -> Self {
        Self {
            action: d.action,
            sheet_name: d.sheet_name.clone(),
            cell_address: d.cell_address.clone(),
            range: d.range.clone(),
            value: d.value.clone(),
            formula: d.formula.clone(),
            style: d.style.clone(),
            row_index: d.row_index,
            column_index: d.column_index,
            count: d.count,
        }
    }
}

/// POST body of the batch sync endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyBatchDeltasRequest {
    pub deltas: Vec<ApplyDeltaRequest>,
}

/// Response of the batch sync endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyBatchDeltasResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<AppliedCount>,
}

impl ApplyBatchDeltasResponse {
    pub fn ok(applied_count: usize) -> Self {
        Self { success: true, message: None, data: Some(AppliedCount { applied_count }) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCount {
    pub applied_count: usize,
}

// =============================================================================
// Full-workbook save (autosave)
// =============================================================================

/// PUT body for saving the whole serialized workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveWorkbookRequest {
    pub sheet_data: serde_json::Value,
    pub checksum: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveWorkbookResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
