//! Delta applier: put a delta onto the grid.
//!
//! Server deltas go through [`apply_delta`], which holds the write gate as
//! `ApplyingRemote` for the whole call so the delta queue never re-captures
//! them. User edits go through [`capture_local_edit`] under `ApplyingLocal`.
//! The gate guard is dropped on every exit path, including errors.

use sheetpilot_core::{parse_address, parse_range, AddressError, CellArea, GateError, WriteGate, WriteOrigin};
use sheetpilot_protocol::{Delta, DeltaAction, DeltaError};

use crate::cell::CellValue;
use crate::grid::{Grid, GridError};
use crate::style::StyleProp;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeltaApplyError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("invalid delta: {0}")]
    Invalid(#[from] DeltaError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("invalid range '{0}'")]
    Range(String),
    #[error("sheet '{0}' not found")]
    UnknownSheet(String),
    #[error("grid rejected delta: {0}")]
    Grid(#[from] GridError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    Applied,
    /// Action not supported by this build; the grid was not touched.
    Ignored(DeltaAction),
}

/// Apply a server-origin delta.
pub fn apply_delta(grid: &mut dyn Grid, delta: &Delta, gate: &WriteGate) -> Result<DeltaOutcome, DeltaApplyError> {
    let _guard = gate.enter(WriteOrigin::Remote)?;
    apply_unguarded(grid, delta)
}

/// Apply a user edit and hand the delta back for queueing.
pub fn capture_local_edit(grid: &mut dyn Grid, gate: &WriteGate, delta: Delta) -> Result<Delta, DeltaApplyError> {
    let _guard = gate.enter(WriteOrigin::Local)?;
    apply_unguarded(grid, &delta)?;
    Ok(delta)
}

fn apply_unguarded(grid: &mut dyn Grid, delta: &Delta) -> Result<DeltaOutcome, DeltaApplyError> {
    delta.validate()?;

    match delta.action {
        DeltaAction::SetCellValue => {
            let (sheet, area) = target(grid, delta)?;
            let value = delta.value.as_ref().map(CellValue::from_json).unwrap_or_default();
            for pos in area.cells() {
                grid.set_value(sheet, pos.row, pos.col, value.clone())?;
            }
        }
        DeltaAction::SetCellFormula => {
            let (sheet, area) = target(grid, delta)?;
            let formula = delta.formula.as_deref().unwrap_or_default();
            for pos in area.cells() {
                grid.set_formula(sheet, pos.row, pos.col, formula)?;
            }
        }
        DeltaAction::SetCellStyle => {
            let (sheet, area) = target(grid, delta)?;
            if let Some(style) = &delta.style {
                for prop in StyleProp::from_properties(style) {
                    grid.set_range_property(sheet, area, &prop)?;
                }
            }
        }
        DeltaAction::DeleteCells => {
            let (sheet, area) = target(grid, delta)?;
            if delta.range.is_some() {
                if let Err(e) = grid.clear(sheet, area) {
                    log::warn!("bulk clear of {area} failed ({e}), clearing cell by cell");
                    for pos in area.cells() {
                        grid.set_value(sheet, pos.row, pos.col, CellValue::Empty)?;
                    }
                }
            } else {
                grid.set_value(sheet, area.row, area.col, CellValue::Empty)?;
            }
        }
        DeltaAction::InsertRows => {
            let sheet = sheet_of(grid, delta)?;
            grid.insert_rows(sheet, delta.row_index.unwrap_or_default(), delta.count_or_one())?;
        }
        DeltaAction::DeleteRows => {
            let sheet = sheet_of(grid, delta)?;
            grid.delete_rows(sheet, delta.row_index.unwrap_or_default(), delta.count_or_one())?;
        }
        DeltaAction::InsertColumns => {
            let sheet = sheet_of(grid, delta)?;
            grid.insert_columns(sheet, delta.column_index.unwrap_or_default(), delta.count_or_one())?;
        }
        DeltaAction::DeleteColumns => {
            let sheet = sheet_of(grid, delta)?;
            grid.delete_columns(sheet, delta.column_index.unwrap_or_default(), delta.count_or_one())?;
        }
        DeltaAction::AddSheet => {
            grid.add_sheet(&delta.sheet_name)?;
        }
        DeltaAction::DeleteSheet => {
            let sheet = sheet_of(grid, delta)?;
            grid.remove_sheet(sheet)?;
        }
        DeltaAction::RenameSheet => {
            let sheet = sheet_of(grid, delta)?;
            let new_name = delta.new_sheet_name().unwrap_or_default();
            grid.rename_sheet(sheet, new_name)?;
        }
        DeltaAction::Unsupported => {
            log::warn!("ignoring unsupported delta action on sheet '{}'", delta.sheet_name);
            return Ok(DeltaOutcome::Ignored(DeltaAction::Unsupported));
        }
    }

    Ok(DeltaOutcome::Applied)
}

fn sheet_of(grid: &dyn Grid, delta: &Delta) -> Result<usize, DeltaApplyError> {
    grid.sheet_index(&delta.sheet_name)
        .ok_or_else(|| DeltaApplyError::UnknownSheet(delta.sheet_name.clone()))
}

/// Sheet plus the cell or range a cell-scoped delta addresses.
fn target(grid: &dyn Grid, delta: &Delta) -> Result<(usize, CellArea), DeltaApplyError> {
    let sheet = sheet_of(grid, delta)?;
    let area = match (&delta.cell_address, &delta.range) {
        (Some(addr), _) => {
            let pos = parse_address(addr)?;
            CellArea::single(pos.row, pos.col)
        }
        (None, Some(range)) => parse_range(range).ok_or_else(|| DeltaApplyError::Range(range.clone()))?,
        (None, None) => return Err(DeltaError::Addressing(delta.action).into()),
    };
    Ok((sheet, area))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryGrid;
    use sheetpilot_core::GateState;
    use sheetpilot_protocol::StyleProperties;

    #[test]
    fn test_value_and_formula_deltas() {
        let mut grid = MemoryGrid::new();
        let gate = WriteGate::new();

        apply_delta(&mut grid, &Delta::set_value("Sheet1", "B2", "7"), &gate).unwrap();
        assert_eq!(grid.value(0, 1, 1).unwrap(), CellValue::Number(7.0));

        apply_delta(&mut grid, &Delta::set_formula("Sheet1", "A1", "=B2*2").over_range("A1:A3"), &gate).unwrap();
        assert_eq!(grid.formula(0, 2, 0).unwrap().as_deref(), Some("=B2*2"));
        assert_eq!(gate.state(), GateState::Idle);
    }

    #[test]
    fn test_style_delta() {
        let mut grid = MemoryGrid::new();
        let style = StyleProperties { fore_color: Some("blue".into()), ..Default::default() };
        apply_delta(&mut grid, &Delta::set_style("Sheet1", "C3", style), &WriteGate::new()).unwrap();
        assert_eq!(grid.style(0, 2, 2).unwrap().fore_color.as_deref(), Some("blue"));
    }

    #[test]
    fn test_delete_range() {
        let mut grid = MemoryGrid::new();
        let gate = WriteGate::new();
        for r in 0..3 {
            grid.set_value(0, r, 0, CellValue::Number(r as f64)).unwrap();
        }
        apply_delta(&mut grid, &Delta::delete_cells("Sheet1", "A1").over_range("A1:A2"), &gate).unwrap();
        assert_eq!(grid.value(0, 0, 0).unwrap(), CellValue::Empty);
        assert_eq!(grid.value(0, 1, 0).unwrap(), CellValue::Empty);
        assert_eq!(grid.value(0, 2, 0).unwrap(), CellValue::Number(2.0));
    }

    #[test]
    fn test_structural_and_sheet_deltas() {
        let mut grid = MemoryGrid::new();
        let gate = WriteGate::new();
        grid.set_value(0, 0, 0, CellValue::Text("x".into())).unwrap();

        apply_delta(&mut grid, &Delta::insert_rows("Sheet1", 0, 2), &gate).unwrap();
        assert_eq!(grid.value(0, 2, 0).unwrap(), CellValue::Text("x".into()));
        apply_delta(&mut grid, &Delta::delete_columns("Sheet1", 0, 1), &gate).unwrap();
        assert_eq!(grid.value(0, 2, 0).unwrap(), CellValue::Empty);

        apply_delta(&mut grid, &Delta::add_sheet("Data"), &gate).unwrap();
        apply_delta(&mut grid, &Delta::rename_sheet("Data", "Budget"), &gate).unwrap();
        assert_eq!(grid.sheet_index("Budget"), Some(1));
        apply_delta(&mut grid, &Delta::delete_sheet("Budget"), &gate).unwrap();
        assert_eq!(grid.sheet_count(), 1);
    }

    #[test]
    fn test_errors_release_gate() {
        let mut grid = MemoryGrid::new();
        let gate = WriteGate::new();

        let err = apply_delta(&mut grid, &Delta::set_value("Nope", "A1", 1), &gate).unwrap_err();
        assert_eq!(err, DeltaApplyError::UnknownSheet("Nope".into()));
        assert_eq!(gate.state(), GateState::Idle);

        let err = apply_delta(&mut grid, &Delta::set_value("Sheet1", "a1", 1), &gate).unwrap_err();
        assert!(matches!(err, DeltaApplyError::Address(_)));
        assert_eq!(gate.state(), GateState::Idle);

        let err = apply_delta(&mut grid, &Delta::set_value("Sheet1", "A1", 1).over_range("1:2"), &gate).unwrap_err();
        assert_eq!(err, DeltaApplyError::Range("1:2".into()));
        assert_eq!(gate.state(), GateState::Idle);
    }

    #[test]
    fn test_oversized_insert_is_a_grid_error() {
        let mut grid = MemoryGrid::new();
        let gate = WriteGate::new();
        let before = grid.extents(0).unwrap();

        let err = apply_delta(&mut grid, &Delta::insert_rows("Sheet1", 0, usize::MAX), &gate).unwrap_err();
        assert!(matches!(err, DeltaApplyError::Grid(GridError::InvalidArgument(_))));
        let err = apply_delta(&mut grid, &Delta::insert_columns("Sheet1", 0, usize::MAX), &gate).unwrap_err();
        assert!(matches!(err, DeltaApplyError::Grid(GridError::InvalidArgument(_))));

        assert_eq!(grid.extents(0).unwrap(), before);
        assert_eq!(gate.state(), GateState::Idle);
    }

    #[test]
    fn test_overlapping_apply_fails_loudly() {
        let mut grid = MemoryGrid::new();
        let gate = WriteGate::new();
        let _held = gate.enter(WriteOrigin::Remote).unwrap();
        let err = apply_delta(&mut grid, &Delta::set_value("Sheet1", "A1", 1), &gate).unwrap_err();
        assert!(matches!(err, DeltaApplyError::Gate(GateError::Busy { .. })));
        assert_eq!(grid.value(0, 0, 0).unwrap(), CellValue::Empty);
    }

    #[test]
    fn test_unsupported_action_is_ignored() {
        let mut grid = MemoryGrid::new();
        let delta: Delta = serde_json::from_value(serde_json::json!({
            "action": "merge-cells",
            "sheetName": "Sheet1",
            "range": "A1:B2"
        }))
        .unwrap();
        let outcome = apply_delta(&mut grid, &delta, &WriteGate::new()).unwrap();
        assert_eq!(outcome, DeltaOutcome::Ignored(DeltaAction::Unsupported));
    }

    #[test]
    fn test_local_capture_holds_local_state() {
        let mut grid = MemoryGrid::new();
        let gate = WriteGate::new();
        let delta = capture_local_edit(&mut grid, &gate, Delta::set_value("Sheet1", "A1", "hi")).unwrap();
        assert_eq!(delta.cell_address.as_deref(), Some("A1"));
        assert_eq!(grid.value(0, 0, 0).unwrap(), CellValue::Text("hi".into()));
        assert_eq!(gate.state(), GateState::Idle);
    }
}
