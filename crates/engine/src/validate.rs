//! Pre-execution checks for AI responses.
//!
//! Nothing here mutates the grid. Any failure aborts the command before the
//! first write.

use std::sync::LazyLock;

use regex::Regex;
use sheetpilot_protocol::{Command, FormulaResponse};

use crate::grid::{Grid, GridError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("response carries no structured edit commands; free-text scripts are not executed")]
    UnstructuredCommand,
    #[error("forbidden pattern '{0}' in command")]
    ForbiddenPattern(&'static str),
    #[error("dangerous keyword '{0}' in command")]
    DangerousKeyword(&'static str),
    #[error("unknown sheet index {0}")]
    UnknownSheet(usize),
    #[error("cell reference ({row}, {col}) is outside the sheet ({rows} rows x {cols} cols)")]
    CellOutOfBounds { row: usize, col: usize, rows: usize, cols: usize },
    #[error("range {range} is outside the sheet ({rows} rows x {cols} cols)")]
    RangeOutOfBounds { range: String, rows: usize, cols: usize },
    #[error(transparent)]
    Grid(#[from] GridError),
}

const DANGEROUS_KEYWORDS: [&str; 4] = ["clearAll", "deleteSheet", "removeSheet", "destroy"];

/// `window.` is handled separately: `window.fs.readFile` is the one allowed use.
static FORBIDDEN: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [(r"\beval\s*\(", "eval("), (r"\bdocument\.", "document."), (r"\balert\s*\(", "alert(")]
        .into_iter()
        .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, label)))
        .collect()
});

static WINDOW: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\bwindow\.").ok());

/// `(row, col)` pairs such as `getCell(5, 3)`.
static CELL_REF: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\(\s*(\d+)\s*,\s*(\d+)").ok());

/// Run every check against the current grid.
pub fn validate_response(grid: &dyn Grid, response: &FormulaResponse) -> Result<(), ValidationError> {
    let script = response.formula_details.spreadjs_command.as_deref().unwrap_or_default();
    scan_text(script)?;
    check_embedded_refs(grid, script, first_sheet(response))?;

    if response.data_edit_commands.is_empty() {
        return Err(ValidationError::UnstructuredCommand);
    }
    for command in &response.data_edit_commands {
        validate_command(grid, command)?;
    }
    Ok(())
}

pub fn validate_command(grid: &dyn Grid, command: &Command) -> Result<(), ValidationError> {
    scan_text(&command.payload_text())?;

    if command.sheet_index >= grid.sheet_count() {
        return Err(ValidationError::UnknownSheet(command.sheet_index));
    }
    let extents = grid.extents(command.sheet_index)?;
    let area = command.range.area();
    if !extents.contains(&area) {
        return Err(ValidationError::RangeOutOfBounds {
            range: area.to_string(),
            rows: extents.rows,
            cols: extents.cols,
        });
    }
    Ok(())
}

/// Denylist and keyword scan.
pub fn scan_text(text: &str) -> Result<(), ValidationError> {
    for (re, label) in FORBIDDEN.iter() {
        if re.is_match(text) {
            return Err(ValidationError::ForbiddenPattern(label));
        }
    }
    if let Some(window) = WINDOW.as_ref() {
        if window.find_iter(text).any(|m| !text[m.end()..].starts_with("fs.readFile")) {
            return Err(ValidationError::ForbiddenPattern("window."));
        }
    }
    if let Some(kw) = DANGEROUS_KEYWORDS.iter().copied().find(|kw| text.contains(kw)) {
        return Err(ValidationError::DangerousKeyword(kw));
    }
    Ok(())
}

fn first_sheet(response: &FormulaResponse) -> usize {
    response.data_edit_commands.first().map(|c| c.sheet_index).unwrap_or(0)
}

fn check_embedded_refs(grid: &dyn Grid, text: &str, sheet: usize) -> Result<(), ValidationError> {
    let Some(re) = CELL_REF.as_ref() else {
        return Ok(());
    };
    if text.is_empty() {
        return Ok(());
    }
    let extents = grid.extents(sheet)?;
    for caps in re.captures_iter(text) {
        // Digits only, so a parse failure means the number overflowed.
        let row = caps[1].parse::<usize>().unwrap_or(usize::MAX);
        let col = caps[2].parse::<usize>().unwrap_or(usize::MAX);
        if row >= extents.rows || col >= extents.cols {
            return Err(ValidationError::CellOutOfBounds { row, col, rows: extents.rows, cols: extents.cols });
        }
    }
    Ok(())
}
