//! In-process grid: a workbook of sparse sheets.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sheetpilot_core::CellArea;

use crate::cell::CellValue;
use crate::grid::{Extents, Grid, GridError, SerializeOptions};
use crate::sheet::{Sheet, SheetDoc};
use crate::style::{CellStyle, LineBorder, StyleProp};

pub const DEFAULT_ROWS: usize = 200;
pub const DEFAULT_COLS: usize = 26;
const FORMAT_VERSION: u32 = 1;

/// A border overlay drawn over a range. Never serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub sheet: usize,
    pub area: CellArea,
    pub border: LineBorder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkbookDoc {
    version: u32,
    sheets: Vec<SheetDoc>,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkbookFileError {
    #[error("failed to access workbook file: {0}")]
    Io(#[from] std::io::Error),
    #[error("workbook file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("workbook data rejected: {0}")]
    Grid(#[from] GridError),
}

#[derive(Debug, Clone)]
pub struct MemoryGrid {
    sheets: Vec<Sheet>,
    markers: Vec<Marker>,
    paint_depth: usize,
    refreshes: usize,
}

impl Default for MemoryGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGrid {
    /// One empty "Sheet1" of the default size.
    pub fn new() -> Self {
        Self::with_sheet("Sheet1", DEFAULT_ROWS, DEFAULT_COLS)
    }

    pub fn with_sheet(name: &str, rows: usize, cols: usize) -> Self {
        Self { sheets: vec![Sheet::new(name, rows, cols)], markers: Vec::new(), paint_depth: 0, refreshes: 0 }
    }

    pub fn load_file(path: &Path) -> Result<Self, WorkbookFileError> {
        let data = std::fs::read_to_string(path)?;
        let json: serde_json::Value = serde_json::from_str(&data)?;
        let mut grid = MemoryGrid::new();
        grid.from_json(&json)?;
        Ok(grid)
    }

    /// Write the workbook with the snapshot serialization options.
    pub fn save_file(&self, path: &Path) -> Result<(), WorkbookFileError> {
        let json = self.to_json(&SerializeOptions::SNAPSHOT)?;
        std::fs::write(path, serde_json::to_string_pretty(&json)?)?;
        Ok(())
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn is_paint_suspended(&self) -> bool {
        self.paint_depth > 0
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes
    }

    fn sheet_ref(&self, index: usize) -> Result<&Sheet, GridError> {
        self.sheets.get(index).ok_or_else(|| GridError::UnknownSheet(format!("index {index}")))
    }

    fn sheet_mut(&mut self, index: usize) -> Result<&mut Sheet, GridError> {
        self.sheets.get_mut(index).ok_or_else(|| GridError::UnknownSheet(format!("index {index}")))
    }

    fn name_taken(&self, name: &str, except: Option<usize>) -> bool {
        let key = name.trim().to_lowercase();
        self.sheets
            .iter()
            .enumerate()
            .any(|(i, s)| Some(i) != except && s.name.trim().to_lowercase() == key)
    }

    fn validate_name(&self, name: &str, except: Option<usize>) -> Result<(), GridError> {
        if name.trim().is_empty() {
            return Err(GridError::InvalidArgument("sheet name cannot be empty".into()));
        }
        if self.name_taken(name, except) {
            return Err(GridError::InvalidArgument(format!("sheet name '{name}' already exists")));
        }
        Ok(())
    }

    fn each_cell<F>(&mut self, sheet: usize, area: CellArea, mut f: F) -> Result<(), GridError>
    where
        F: FnMut(&mut crate::cell::Cell),
    {
        let s = self.sheet_mut(sheet)?;
        s.check_area(&area)?;
        for pos in area.cells() {
            s.update(pos.row, pos.col, &mut f)?;
        }
        Ok(())
    }
}

impl Grid for MemoryGrid {
    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name == name)
    }

    fn sheet_name(&self, sheet: usize) -> Option<String> {
        self.sheets.get(sheet).map(|s| s.name.clone())
    }

    fn extents(&self, sheet: usize) -> Result<Extents, GridError> {
        Ok(self.sheet_ref(sheet)?.extents())
    }

    fn add_sheet(&mut self, name: &str) -> Result<usize, GridError> {
        self.validate_name(name, None)?;
        self.sheets.push(Sheet::new(name, DEFAULT_ROWS, DEFAULT_COLS));
        Ok(self.sheets.len() - 1)
    }

    fn remove_sheet(&mut self, sheet: usize) -> Result<(), GridError> {
        self.sheet_ref(sheet)?;
        if self.sheets.len() == 1 {
            return Err(GridError::InvalidArgument("cannot remove the last sheet".into()));
        }
        self.sheets.remove(sheet);
        self.markers.retain(|m| m.sheet != sheet);
        for m in &mut self.markers {
            if m.sheet > sheet {
                m.sheet -= 1;
            }
        }
        Ok(())
    }

    fn rename_sheet(&mut self, sheet: usize, name: &str) -> Result<(), GridError> {
        self.sheet_ref(sheet)?;
        self.validate_name(name, Some(sheet))?;
        self.sheet_mut(sheet)?.name = name.trim().to_string();
        Ok(())
    }

    fn value(&self, sheet: usize, row: usize, col: usize) -> Result<CellValue, GridError> {
        let s = self.sheet_ref(sheet)?;
        s.check(row, col)?;
        Ok(s.value(row, col))
    }

    fn set_value(&mut self, sheet: usize, row: usize, col: usize, value: CellValue) -> Result<(), GridError> {
        self.sheet_mut(sheet)?.update(row, col, |c| {
            c.value = value;
            c.formula = None;
        })
    }

    fn formula(&self, sheet: usize, row: usize, col: usize) -> Result<Option<String>, GridError> {
        let s = self.sheet_ref(sheet)?;
        s.check(row, col)?;
        Ok(s.cell(row, col).and_then(|c| c.formula.clone()))
    }

    fn set_formula(&mut self, sheet: usize, row: usize, col: usize, formula: &str) -> Result<(), GridError> {
        let formula = formula.to_string();
        self.sheet_mut(sheet)?.update(row, col, |c| c.formula = Some(formula))
    }

    /// Formulas are stored, not evaluated; every cell of the block carries the formula.
    fn set_array_formula(&mut self, sheet: usize, area: CellArea, formula: &str) -> Result<(), GridError> {
        self.each_cell(sheet, area, |c| c.formula = Some(formula.to_string()))
    }

    fn style(&self, sheet: usize, row: usize, col: usize) -> Result<CellStyle, GridError> {
        let s = self.sheet_ref(sheet)?;
        s.check(row, col)?;
        Ok(s.style(row, col))
    }

    fn set_style(&mut self, sheet: usize, row: usize, col: usize, style: CellStyle) -> Result<(), GridError> {
        self.sheet_mut(sheet)?.update(row, col, |c| c.style = style)
    }

    fn set_range_property(&mut self, sheet: usize, area: CellArea, prop: &StyleProp) -> Result<(), GridError> {
        self.each_cell(sheet, area, |c| c.style.apply(prop))
    }

    fn clear(&mut self, sheet: usize, area: CellArea) -> Result<(), GridError> {
        self.each_cell(sheet, area, |c| {
            c.value = CellValue::Empty;
            c.formula = None;
        })
    }

    fn sort_range(&mut self, sheet: usize, area: CellArea, key_col: usize, ascending: bool) -> Result<(), GridError> {
        self.sheet_mut(sheet)?.sort_rows(area, key_col, ascending)
    }

    fn insert_rows(&mut self, sheet: usize, index: usize, count: usize) -> Result<(), GridError> {
        self.sheet_mut(sheet)?.insert_rows(index, count)
    }

    fn delete_rows(&mut self, sheet: usize, index: usize, count: usize) -> Result<(), GridError> {
        self.sheet_mut(sheet)?.delete_rows(index, count)
    }

    fn insert_columns(&mut self, sheet: usize, index: usize, count: usize) -> Result<(), GridError> {
        self.sheet_mut(sheet)?.insert_cols(index, count)
    }

    fn delete_columns(&mut self, sheet: usize, index: usize, count: usize) -> Result<(), GridError> {
        self.sheet_mut(sheet)?.delete_cols(index, count)
    }

    fn to_json(&self, options: &SerializeOptions) -> Result<serde_json::Value, GridError> {
        let doc = WorkbookDoc {
            version: FORMAT_VERSION,
            sheets: self.sheets.iter().map(|s| s.to_doc(options)).collect(),
        };
        serde_json::to_value(doc).map_err(|e| GridError::InvalidArgument(e.to_string()))
    }

    fn from_json(&mut self, json: &serde_json::Value) -> Result<(), GridError> {
        let doc: WorkbookDoc = serde_json::from_value(json.clone())
            .map_err(|e| GridError::InvalidArgument(format!("malformed workbook data: {e}")))?;
        if doc.sheets.is_empty() {
            return Err(GridError::InvalidArgument("workbook data has no sheets".into()));
        }
        let sheets = doc.sheets.into_iter().map(Sheet::from_doc).collect::<Result<Vec<_>, _>>()?;
        self.sheets = sheets;
        let count = self.sheets.len();
        self.markers.retain(|m| m.sheet < count);
        Ok(())
    }

    fn suspend_paint(&mut self) {
        self.paint_depth += 1;
    }

    fn resume_paint(&mut self) {
        self.paint_depth = self.paint_depth.saturating_sub(1);
    }

    fn refresh(&mut self) {
        self.refreshes += 1;
    }

    fn draw_marker(&mut self, sheet: usize, area: CellArea, marker: Option<LineBorder>) -> Result<(), GridError> {
        self.sheet_ref(sheet)?.check_area(&area)?;
        self.markers.retain(|m| !(m.sheet == sheet && m.area == area));
        if let Some(border) = marker {
            self.markers.push(Marker { sheet, area, border });
        }
        Ok(())
    }
}
