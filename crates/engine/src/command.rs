//! Command apply engine: one AI command, one grid mutation.
//!
//! Grid errors propagate to the caller. The style sub-engine is the exception:
//! it reports failures inside its result value.

use serde::{Deserialize, Serialize};
use sheetpilot_core::CellArea;
use sheetpilot_protocol::{Command, CommandAction, CommandRange};

use crate::cell::CellValue;
use crate::grid::{Grid, GridError};
use crate::style_apply::{apply_style, StyleApplyResult};

/// What `sort_data` does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBehavior {
    /// Write the payload as a formula into the target cell.
    #[default]
    LegacyFormula,
    /// Reorder the rows of the target range.
    Sort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub sort_behavior: SortBehavior,
}

/// Result of applying one command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Applied,
    Styled(StyleApplyResult),
    /// Recognized type with nothing to do (`control_sheet`).
    NoOp,
    /// Unrecognized command type; nothing was touched.
    Ignored { command_type: String },
}

pub fn apply_command(
    grid: &mut dyn Grid,
    command: &Command,
    options: &ApplyOptions,
) -> Result<CommandOutcome, GridError> {
    let sheet = command.sheet_index;
    if sheet >= grid.sheet_count() {
        return Err(GridError::UnknownSheet(format!("index {sheet}")));
    }

    match &command.action {
        CommandAction::ValueChange(payload) => {
            set_values(grid, sheet, &command.range, payload)?;
            Ok(CommandOutcome::Applied)
        }
        CommandAction::UseFormula(formula) => {
            match command.range {
                CommandRange::Block(area) => grid.set_array_formula(sheet, area, formula)?,
                CommandRange::Cell(pos) => grid.set_formula(sheet, pos.row, pos.col, formula)?,
            }
            Ok(CommandOutcome::Applied)
        }
        CommandAction::SortData(payload) => {
            sort_data(grid, sheet, command.range.area(), payload, options.sort_behavior)?;
            Ok(CommandOutcome::Applied)
        }
        CommandAction::ApplyStyle(style) => Ok(CommandOutcome::Styled(apply_style(grid, sheet, &command.range, style))),
        CommandAction::ControlSheet(_) => Ok(CommandOutcome::NoOp),
        CommandAction::Unknown { command_type, .. } => {
            log::warn!("ignoring unknown command type '{command_type}'");
            Ok(CommandOutcome::Ignored { command_type: command_type.clone() })
        }
    }
}

/// A cell range takes the payload as one value. On a block, scalars fill
/// every cell and 2-D arrays are written from the origin, clipped to the block.
fn set_values(grid: &mut dyn Grid, sheet: usize, range: &CommandRange, payload: &serde_json::Value) -> Result<(), GridError> {
    let area = match range {
        CommandRange::Cell(pos) => return grid.set_value(sheet, pos.row, pos.col, CellValue::from_json(payload)),
        CommandRange::Block(area) => *area,
    };
    match value_matrix(payload) {
        Some(rows) => {
            for (dr, row) in rows.iter().take(area.row_count).enumerate() {
                for (dc, v) in row.iter().take(area.col_count).enumerate() {
                    grid.set_value(sheet, area.row + dr, area.col + dc, CellValue::from_json(v))?;
                }
            }
        }
        None => {
            let value = CellValue::from_json(payload);
            for pos in area.cells() {
                grid.set_value(sheet, pos.row, pos.col, value.clone())?;
            }
        }
    }
    Ok(())
}

/// `[[..], [..]]` is a matrix, `[a, b]` is one row, anything else is a scalar.
fn value_matrix(payload: &serde_json::Value) -> Option<Vec<Vec<serde_json::Value>>> {
    let items = payload.as_array()?;
    if items.iter().all(|v| v.is_array()) && !items.is_empty() {
        Some(items.iter().map(|row| row.as_array().cloned().unwrap_or_default()).collect())
    } else {
        Some(vec![items.clone()])
    }
}

fn sort_data(
    grid: &mut dyn Grid,
    sheet: usize,
    area: CellArea,
    payload: &serde_json::Value,
    behavior: SortBehavior,
) -> Result<(), GridError> {
    match behavior {
        SortBehavior::LegacyFormula => {
            let formula = payload.as_str().ok_or_else(|| {
                GridError::InvalidArgument(format!("sort_data expects a formula string, got {payload}"))
            })?;
            grid.set_formula(sheet, area.row, area.col, formula)
        }
        SortBehavior::Sort => {
            let key_offset = payload
                .get("keyColumn")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(0);
            let ascending = payload.get("ascending").and_then(|v| v.as_bool()).unwrap_or(true);
            grid.sort_range(sheet, area, area.col + key_offset, ascending)
        }
    }
}
