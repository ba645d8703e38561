use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sheetpilot_core::CellArea;

use crate::cell::{Cell, CellValue};
use crate::grid::{Extents, GridError, SerializeOptions};
use crate::style::CellStyle;

/// Sparse sheet storage. Only non-blank cells occupy the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    rows: usize,
    cols: usize,
    cells: HashMap<(usize, usize), Cell>,
}

impl Sheet {
    pub fn new(name: &str, rows: usize, cols: usize) -> Self {
        Self { name: name.to_string(), rows, cols, cells: HashMap::new() }
    }

    pub fn extents(&self) -> Extents {
        Extents { rows: self.rows, cols: self.cols }
    }

    pub fn check(&self, row: usize, col: usize) -> Result<(), GridError> {
        if row < self.rows && col < self.cols {
            Ok(())
        } else {
            Err(GridError::OutOfBounds { row, col, rows: self.rows, cols: self.cols })
        }
    }

    pub fn check_area(&self, area: &CellArea) -> Result<(), GridError> {
        self.check(area.row, area.col)?;
        self.check(area.end_row(), area.end_col())
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Mutate one cell in place; the entry is dropped again if it ends up blank.
    pub fn update<F>(&mut self, row: usize, col: usize, f: F) -> Result<(), GridError>
    where
        F: FnOnce(&mut Cell),
    {
        self.check(row, col)?;
        let cell = self.cells.entry((row, col)).or_default();
        f(cell);
        if cell.is_blank() {
            self.cells.remove(&(row, col));
        }
        Ok(())
    }

    pub fn value(&self, row: usize, col: usize) -> CellValue {
        self.cell(row, col).map(|c| c.value.clone()).unwrap_or_default()
    }

    pub fn style(&self, row: usize, col: usize) -> CellStyle {
        self.cell(row, col).map(|c| c.style.clone()).unwrap_or_default()
    }

    pub fn populated(&self) -> usize {
        self.cells.len()
    }

    /// Insert rows at `at_row`, shifting existing rows down. The sheet grows.
    pub fn insert_rows(&mut self, at_row: usize, count: usize) -> Result<(), GridError> {
        if at_row > self.rows {
            return Err(GridError::OutOfBounds { row: at_row, col: 0, rows: self.rows, cols: self.cols });
        }
        let rows = self
            .rows
            .checked_add(count)
            .ok_or_else(|| GridError::InvalidArgument(format!("cannot insert {count} rows into {} rows", self.rows)))?;
        // Every cell row is below `self.rows`, so the shifted row stays below `rows`.
        self.shift(|(r, c)| if r >= at_row { Some((r + count, c)) } else { Some((r, c)) });
        self.rows = rows;
        Ok(())
    }

    /// Delete rows starting at `start_row`, shifting remaining rows up.
    pub fn delete_rows(&mut self, start_row: usize, count: usize) -> Result<(), GridError> {
        let end = start_row.saturating_add(count);
        if end > self.rows {
            return Err(GridError::OutOfBounds { row: end - 1, col: 0, rows: self.rows, cols: self.cols });
        }
        self.shift(|(r, c)| match r {
            r if r < start_row => Some((r, c)),
            r if r < end => None,
            r => Some((r - count, c)),
        });
        self.rows -= count;
        Ok(())
    }

    pub fn insert_cols(&mut self, at_col: usize, count: usize) -> Result<(), GridError> {
        if at_col > self.cols {
            return Err(GridError::OutOfBounds { row: 0, col: at_col, rows: self.rows, cols: self.cols });
        }
        let cols = self
            .cols
            .checked_add(count)
            .ok_or_else(|| GridError::InvalidArgument(format!("cannot insert {count} columns into {} columns", self.cols)))?;
        self.shift(|(r, c)| if c >= at_col { Some((r, c + count)) } else { Some((r, c)) });
        self.cols = cols;
        Ok(())
    }

    pub fn delete_cols(&mut self, start_col: usize, count: usize) -> Result<(), GridError> {
        let end = start_col.saturating_add(count);
        if end > self.cols {
            return Err(GridError::OutOfBounds { row: 0, col: end - 1, rows: self.rows, cols: self.cols });
        }
        self.shift(|(r, c)| match c {
            c if c < start_col => Some((r, c)),
            c if c < end => None,
            c => Some((r, c - count)),
        });
        self.cols -= count;
        Ok(())
    }

    /// Re-key every cell; `None` drops it.
    fn shift<F>(&mut self, f: F)
    where
        F: Fn((usize, usize)) -> Option<(usize, usize)>,
    {
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter_map(|(pos, cell)| f(pos).map(|p| (p, cell)))
            .collect();
    }

    /// Stable row sort of `area` keyed on absolute column `key_col`.
    /// Blank keys stay last in both directions.
    pub fn sort_rows(&mut self, area: CellArea, key_col: usize, ascending: bool) -> Result<(), GridError> {
        self.check_area(&area)?;
        if key_col < area.col || key_col > area.end_col() {
            return Err(GridError::InvalidArgument(format!(
                "sort key column {key_col} is outside the sorted range"
            )));
        }

        let mut rows: Vec<Vec<Option<Cell>>> = (area.row..=area.end_row())
            .map(|r| (area.col..=area.end_col()).map(|c| self.cells.remove(&(r, c))).collect())
            .collect();

        let key = key_col - area.col;
        rows.sort_by(|a, b| {
            let va = a[key].as_ref().map(|c| &c.value).cloned().unwrap_or_default();
            let vb = b[key].as_ref().map(|c| &c.value).cloned().unwrap_or_default();
            match (va.is_empty(), vb.is_empty()) {
                (false, true) => std::cmp::Ordering::Less,
                (true, false) => std::cmp::Ordering::Greater,
                _ if ascending => va.sort_cmp(&vb),
                _ => vb.sort_cmp(&va),
            }
        });

        for (dr, row) in rows.into_iter().enumerate() {
            for (dc, cell) in row.into_iter().enumerate() {
                if let Some(cell) = cell {
                    self.cells.insert((area.row + dr, area.col + dc), cell);
                }
            }
        }
        Ok(())
    }

    pub fn to_doc(&self, options: &SerializeOptions) -> SheetDoc {
        let mut cells: Vec<CellDoc> = self
            .cells
            .iter()
            .map(|(&(row, col), cell)| CellDoc {
                row,
                col,
                value: cell.value.clone(),
                formula: if options.ignore_formula { None } else { cell.formula.clone() },
                style: if options.ignore_style { CellStyle::default() } else { cell.style.clone() },
            })
            .filter(|doc| !(doc.value.is_empty() && doc.formula.is_none() && doc.style.is_default()))
            .collect();
        cells.sort_by_key(|c| (c.row, c.col));

        SheetDoc { name: self.name.clone(), row_count: self.rows, column_count: self.cols, cells }
    }

    pub fn from_doc(doc: SheetDoc) -> Result<Self, GridError> {
        let mut sheet = Sheet::new(&doc.name, doc.row_count, doc.column_count);
        for c in doc.cells {
            sheet.update(c.row, c.col, |cell| {
                cell.value = c.value;
                cell.formula = c.formula;
                cell.style = c.style;
            })?;
        }
        Ok(sheet)
    }
}

/// Serialized sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetDoc {
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
    #[serde(default)]
    pub cells: Vec<CellDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellDoc {
    pub row: usize,
    pub col: usize,
    #[serde(default, skip_serializing_if = "CellValue::is_empty")]
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "CellStyle::is_default")]
    pub style: CellStyle,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn put(sheet: &mut Sheet, row: usize, col: usize, v: CellValue) {
        sheet.update(row, col, |c| c.value = v).unwrap();
    }

    #[test]
    fn test_blank_cells_are_not_stored() {
        let mut sheet = Sheet::new("S", 10, 10);
        put(&mut sheet, 1, 1, text("x"));
        assert_eq!(sheet.populated(), 1);
        put(&mut sheet, 1, 1, CellValue::Empty);
        assert_eq!(sheet.populated(), 0);
    }

    #[test]
    fn test_insert_overflow_is_an_error() {
        let mut sheet = Sheet::new("S", 5, 3);
        put(&mut sheet, 4, 0, text("last"));
        assert!(matches!(sheet.insert_rows(0, usize::MAX), Err(GridError::InvalidArgument(_))));
        assert!(matches!(sheet.insert_cols(0, usize::MAX), Err(GridError::InvalidArgument(_))));
        assert_eq!(sheet.extents(), Extents { rows: 5, cols: 3 });
        assert_eq!(sheet.value(4, 0), text("last"));
    }

    #[test]
    fn test_insert_rows_grows_and_shifts() {
        let mut sheet = Sheet::new("S", 5, 3);
        put(&mut sheet, 0, 0, text("top"));
        put(&mut sheet, 4, 0, text("last"));
        sheet.insert_rows(1, 2).unwrap();
        assert_eq!(sheet.extents(), Extents { rows: 7, cols: 3 });
        assert_eq!(sheet.value(0, 0), text("top"));
        assert_eq!(sheet.value(6, 0), text("last"));
    }

    #[test]
    fn test_delete_cols_drops_and_shifts() {
        let mut sheet = Sheet::new("S", 3, 5);
        put(&mut sheet, 0, 1, text("gone"));
        put(&mut sheet, 0, 3, text("kept"));
        sheet.delete_cols(1, 2).unwrap();
        assert_eq!(sheet.extents().cols, 3);
        assert_eq!(sheet.value(0, 1), text("kept"));
        assert_eq!(sheet.populated(), 1);
        assert!(sheet.delete_cols(2, 5).is_err());
    }

    #[test]
    fn test_sort_rows_moves_whole_rows() {
        let mut sheet = Sheet::new("S", 10, 3);
        put(&mut sheet, 0, 0, CellValue::Number(3.0));
        put(&mut sheet, 0, 1, text("c"));
        put(&mut sheet, 1, 0, CellValue::Number(1.0));
        put(&mut sheet, 1, 1, text("a"));
        put(&mut sheet, 2, 1, text("blank key"));

        sheet.sort_rows(CellArea::new(0, 0, 3, 2), 0, false).unwrap();
        assert_eq!(sheet.value(0, 1), text("c"));
        assert_eq!(sheet.value(1, 1), text("a"));
        assert_eq!(sheet.value(2, 1), text("blank key"));
    }

    #[test]
    fn test_doc_respects_ignore_options() {
        let mut sheet = Sheet::new("S", 2, 2);
        sheet
            .update(0, 0, |c| {
                c.value = CellValue::Number(1.0);
                c.formula = Some("=1".into());
                c.style.back_color = Some("#fff".into());
            })
            .unwrap();
        let opts = SerializeOptions { ignore_formula: true, ignore_style: true, ..SerializeOptions::SNAPSHOT };
        let doc = sheet.to_doc(&opts);
        assert_eq!(doc.cells.len(), 1);
        assert!(doc.cells[0].formula.is_none());
        assert!(doc.cells[0].style.is_default());
    }
}
