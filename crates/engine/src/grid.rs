//! The grid widget contract.
//!
//! Everything the engine does to a spreadsheet goes through [`Grid`]. A real
//! deployment implements it over its rendering widget; [`crate::MemoryGrid`]
//! is the in-process implementation used by the CLI and tests.
//!
//! Sheets are addressed by 0-based index, cells by 0-based (row, col).

use std::sync::mpsc;
use std::time::Duration;

use serde::Serialize;
use sheetpilot_core::CellArea;

use crate::cell::CellValue;
use crate::style::{CellStyle, LineBorder, StyleProp};

/// Errors raised by grid primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("cell ({row}, {col}) is outside sheet bounds ({rows} rows x {cols} cols)")]
    OutOfBounds { row: usize, col: usize, rows: usize, cols: usize },
    #[error("unknown sheet: {0}")]
    UnknownSheet(String),
    #[error("unsupported grid operation: {0}")]
    Unsupported(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Row and column counts of a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extents {
    pub rows: usize,
    pub cols: usize,
}

impl Extents {
    pub fn contains(&self, area: &CellArea) -> bool {
        area.end_row() < self.rows && area.end_col() < self.cols
    }
}

/// Options for full-workbook serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializeOptions {
    pub include_binding_source: bool,
    pub ignore_formula: bool,
    pub ignore_style: bool,
    pub save_as_view: bool,
    pub save_r1c1_formula: bool,
    pub include_unsupported_formula: bool,
    pub include_unsupported_style: bool,
}

impl SerializeOptions {
    /// The options bag used for snapshots and exports alike.
    pub const SNAPSHOT: SerializeOptions = SerializeOptions {
        include_binding_source: true,
        ignore_formula: false,
        ignore_style: false,
        save_as_view: true,
        save_r1c1_formula: true,
        include_unsupported_formula: true,
        include_unsupported_style: true,
    };
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self::SNAPSHOT
    }
}

/// Completion callback for the legacy asynchronous load.
pub type LoadCallback = Box<dyn FnOnce(Result<(), GridError>) + Send>;

pub trait Grid {
    // Sheets
    fn sheet_count(&self) -> usize;
    fn sheet_index(&self, name: &str) -> Option<usize>;
    fn sheet_name(&self, sheet: usize) -> Option<String>;
    fn extents(&self, sheet: usize) -> Result<Extents, GridError>;
    fn add_sheet(&mut self, name: &str) -> Result<usize, GridError>;
    fn remove_sheet(&mut self, sheet: usize) -> Result<(), GridError>;
    fn rename_sheet(&mut self, sheet: usize, name: &str) -> Result<(), GridError>;

    // Cells
    fn value(&self, sheet: usize, row: usize, col: usize) -> Result<CellValue, GridError>;
    /// Setting a value drops any formula on the cell.
    fn set_value(&mut self, sheet: usize, row: usize, col: usize, value: CellValue) -> Result<(), GridError>;
    fn formula(&self, sheet: usize, row: usize, col: usize) -> Result<Option<String>, GridError>;
    fn set_formula(&mut self, sheet: usize, row: usize, col: usize, formula: &str) -> Result<(), GridError>;
    fn set_array_formula(&mut self, sheet: usize, area: CellArea, formula: &str) -> Result<(), GridError>;
    fn style(&self, sheet: usize, row: usize, col: usize) -> Result<CellStyle, GridError>;
    fn set_style(&mut self, sheet: usize, row: usize, col: usize, style: CellStyle) -> Result<(), GridError>;

    // Ranges
    fn set_range_property(&mut self, sheet: usize, area: CellArea, prop: &StyleProp) -> Result<(), GridError>;
    /// Clear values and formulas in `area`. Styles are kept.
    fn clear(&mut self, sheet: usize, area: CellArea) -> Result<(), GridError>;
    /// Reorder the rows of `area` by the values in absolute column `key_col`.
    fn sort_range(&mut self, sheet: usize, area: CellArea, key_col: usize, ascending: bool)
        -> Result<(), GridError>;

    // Structure
    fn insert_rows(&mut self, sheet: usize, index: usize, count: usize) -> Result<(), GridError>;
    fn delete_rows(&mut self, sheet: usize, index: usize, count: usize) -> Result<(), GridError>;
    fn insert_columns(&mut self, sheet: usize, index: usize, count: usize) -> Result<(), GridError>;
    fn delete_columns(&mut self, sheet: usize, index: usize, count: usize) -> Result<(), GridError>;

    // Serialization
    fn to_json(&self, options: &SerializeOptions) -> Result<serde_json::Value, GridError>;
    /// Synchronous load. Grids that only load asynchronously return `Unsupported`.
    fn from_json(&mut self, json: &serde_json::Value) -> Result<(), GridError>;
    /// Legacy callback load. `done` must be called exactly once.
    fn from_json_with_callback(&mut self, json: &serde_json::Value, done: LoadCallback) {
        let _ = json;
        done(Err(GridError::Unsupported("from_json_with_callback")));
    }

    // Painting
    fn suspend_paint(&mut self) {}
    fn resume_paint(&mut self) {}
    fn refresh(&mut self) {}
    /// Draw (`Some`) or remove (`None`) a non-persistent border overlay around `area`.
    fn draw_marker(&mut self, sheet: usize, area: CellArea, marker: Option<LineBorder>) -> Result<(), GridError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestoreError {
    #[error("workbook load failed: {0}")]
    Load(#[from] GridError),
    #[error("workbook load timed out after {0:?}")]
    Timeout(Duration),
    #[error("workbook load callback was dropped without completing")]
    CallbackDropped,
}

/// Load serialized workbook data into `grid` through whichever load path it
/// supports, then refresh.
///
/// The synchronous path is tried first; on `Unsupported` the callback path is
/// used and bounded by `timeout`.
pub fn load_workbook(grid: &mut dyn Grid, json: &serde_json::Value, timeout: Duration) -> Result<(), RestoreError> {
    match grid.from_json(json) {
        Ok(()) => {}
        Err(GridError::Unsupported(_)) => {
            log::debug!("synchronous load unsupported, falling back to callback load");
            let (tx, rx) = mpsc::channel();
            grid.from_json_with_callback(
                json,
                Box::new(move |result| {
                    let _ = tx.send(result);
                }),
            );
            match rx.recv_timeout(timeout) {
                Ok(result) => result?,
                Err(mpsc::RecvTimeoutError::Timeout) => return Err(RestoreError::Timeout(timeout)),
                Err(mpsc::RecvTimeoutError::Disconnected) => return Err(RestoreError::CallbackDropped),
            }
        }
        Err(e) => return Err(e.into()),
    }
    grid.refresh();
    Ok(())
}
