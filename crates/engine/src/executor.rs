//! Command/snapshot manager.
//!
//! Executing one AI response:
//!
//! ```text
//! preview marker ─▶ confirm? ─▶ snapshot before ─▶ validate ─▶ execute
//!                      │ no           │ err          │ err        │
//!                      ▼              ▼              ▼            ├─ ok ──▶ highlight, snapshot after,
//!                  Cancelled     Snapshot err    Validation err   │         push record, autosave
//!                                                                 └─ err ─▶ restore before, push
//!                                                                           failed record
//! ```
//!
//! Every early exit removes the preview marker. Validation failures leave no
//! trace in history. Rollback never requests an autosave.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sheetpilot_core::{CellArea, GateError, WriteGate, WriteOrigin};
use sheetpilot_protocol::{Command, FormulaResponse};

use crate::command::{apply_command, ApplyOptions, CommandOutcome, SortBehavior};
use crate::grid::{load_workbook, Grid, GridError, RestoreError};
use crate::history::{ExecutionSnapshot, RollbackStack, DEFAULT_MAX_ENTRIES};
use crate::snapshot::{SnapshotCache, SnapshotError, SpreadsheetSnapshot};
use crate::style::{LineBorder, LineStyle};
use crate::validate::{validate_response, ValidationError};

/// What the user is asked to approve.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmRequest<'a> {
    Execute { description: &'a str, target: Option<CellArea> },
    Rollback { description: &'a str, steps: usize },
}

/// Blocking user confirmation. No timeout.
pub trait Confirm {
    fn confirm(&mut self, request: &ConfirmRequest<'_>) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&ConfirmRequest<'_>) -> bool,
{
    fn confirm(&mut self, request: &ConfirmRequest<'_>) -> bool {
        self(request)
    }
}

/// Answers every confirmation the same way.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&mut self, _request: &ConfirmRequest<'_>) -> bool {
        self.0
    }
}

/// Receives the post-execution workbook for saving.
pub trait AutosaveSink: Send + Sync {
    fn request_save(&self, snapshot: &SpreadsheetSnapshot);
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorSettings {
    pub require_confirmation: bool,
    pub rollback_require_confirmation: bool,
    pub sort_behavior: SortBehavior,
    pub max_entries: usize,
    pub snapshot_retention: usize,
    pub restore_timeout: Duration,
    pub preview_marker: LineBorder,
    pub highlight_marker: LineBorder,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            require_confirmation: false,
            rollback_require_confirmation: false,
            sort_behavior: SortBehavior::default(),
            max_entries: DEFAULT_MAX_ENTRIES,
            snapshot_retention: 50,
            restore_timeout: Duration::from_millis(5000),
            preview_marker: LineBorder::new("#4A90E2", LineStyle::Dashed),
            highlight_marker: LineBorder::new("#4A90E2", LineStyle::Medium),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("AI response reported failure")]
    ResponseFailed,
    #[error("command cancelled")]
    Cancelled,
    #[error("command rejected: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("failed to capture snapshot: {0}")]
    Snapshot(GridError),
    #[error("command {execution_id} failed: {message}")]
    Failed { execution_id: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub execution_id: String,
    pub outcomes: Vec<CommandOutcome>,
    pub target_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackRequest {
    /// Undo the most recent execution.
    Single,
    /// Undo the last `steps` executions.
    Multiple { steps: usize },
    /// Undo everything up to and including `target_id`.
    Selective { target_id: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error("nothing to roll back")]
    NothingToRollback,
    #[error("rollback steps must be at least 1")]
    InvalidSteps,
    #[error("execution {0} is not in the rollback history")]
    UnknownExecution(String),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("rollback cancelled")]
    Cancelled,
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Restore(#[from] RestoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub restored_snapshot_id: String,
    /// Removed execution ids, most recent first.
    pub rolled_back: Vec<String>,
    pub remaining: usize,
}

pub struct CommandExecutor {
    settings: ExecutorSettings,
    gate: WriteGate,
    history: RollbackStack,
    snapshots: SnapshotCache,
    autosave: Option<Arc<dyn AutosaveSink>>,
}

impl CommandExecutor {
    pub fn new(settings: ExecutorSettings, gate: WriteGate) -> Self {
        Self {
            history: RollbackStack::new(settings.max_entries),
            snapshots: SnapshotCache::new(settings.snapshot_retention),
            settings,
            gate,
            autosave: None,
        }
    }

    pub fn with_autosave(mut self, sink: Arc<dyn AutosaveSink>) -> Self {
        self.autosave = Some(sink);
        self
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub fn gate(&self) -> &WriteGate {
        &self.gate
    }

    pub fn history(&self) -> &RollbackStack {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut RollbackStack {
        &mut self.history
    }

    pub fn snapshots(&self) -> &SnapshotCache {
        &self.snapshots
    }

    pub fn snapshots_mut(&mut self) -> &mut SnapshotCache {
        &mut self.snapshots
    }

    pub fn can_rollback(&self) -> bool {
        self.history.can_rollback()
    }

    /// Execute bare commands as one unconfirmed response.
    pub fn execute_commands(
        &mut self,
        grid: &mut dyn Grid,
        commands: Vec<Command>,
        confirm: &mut dyn Confirm,
    ) -> Result<ExecutionReport, ExecuteError> {
        self.execute(grid, &FormulaResponse::from_commands(commands), confirm)
    }

    pub fn execute(
        &mut self,
        grid: &mut dyn Grid,
        response: &FormulaResponse,
        confirm: &mut dyn Confirm,
    ) -> Result<ExecutionReport, ExecuteError> {
        if !response.success {
            return Err(ExecuteError::ResponseFailed);
        }

        let sheet = response.data_edit_commands.first().map(|c| c.sheet_index).unwrap_or(0);
        let target = response.target_area(sheet);
        let description = response.description();

        self.mark(grid, sheet, target, Some(self.settings.preview_marker.clone()));

        if self.settings.require_confirmation || response.require_confirmation {
            let request = ConfirmRequest::Execute { description: &description, target };
            if !confirm.confirm(&request) {
                self.mark(grid, sheet, target, None);
                log::info!("command '{description}' cancelled by user");
                return Err(ExecuteError::Cancelled);
            }
        }

        let before = match SpreadsheetSnapshot::capture(grid, &format!("before: {description}"), target) {
            Ok(s) => s,
            Err(e) => {
                self.mark(grid, sheet, target, None);
                return Err(ExecuteError::Snapshot(e));
            }
        };

        if let Err(e) = validate_response(grid, response) {
            self.mark(grid, sheet, target, None);
            log::warn!("command '{description}' rejected: {e}");
            return Err(e.into());
        }

        let guard = match self.gate.enter(WriteOrigin::Remote) {
            Ok(g) => g,
            Err(e) => {
                self.mark(grid, sheet, target, None);
                return Err(e.into());
            }
        };

        let options = ApplyOptions { sort_behavior: self.settings.sort_behavior };
        grid.suspend_paint();
        let result = run_all(grid, &response.data_edit_commands, &options);
        grid.resume_paint();

        let execution_id = uuid::Uuid::new_v4().to_string();
        let command_json = serde_json::to_value(&response.data_edit_commands).unwrap_or_default();
        let command_type = command_types(&response.data_edit_commands);
        let target_range = target.map(|a| a.to_string());

        match result {
            Ok(outcomes) => {
                drop(guard);
                self.mark(grid, sheet, target, Some(self.settings.highlight_marker.clone()));
                let after = SpreadsheetSnapshot::capture(grid, &format!("after: {description}"), target)
                    .map_err(ExecuteError::Snapshot)?;

                self.snapshots.insert(before.clone());
                self.snapshots.insert(after.clone());
                self.history.push(ExecutionSnapshot {
                    id: execution_id.clone(),
                    timestamp: Utc::now(),
                    command: command_json,
                    command_type,
                    before_state: before,
                    after_state: after.clone(),
                    description: description.clone(),
                    target_range: target_range.clone(),
                    success: true,
                    error: None,
                });

                if let Some(sink) = &self.autosave {
                    sink.request_save(&after);
                }
                log::info!("executed '{description}' ({execution_id})");
                Ok(ExecutionReport { execution_id, outcomes, target_range })
            }
            Err(message) => {
                if let Err(e) = load_workbook(grid, &before.sheet_data, self.settings.restore_timeout) {
                    log::error!("failed to restore grid after '{description}' failed: {e}");
                }
                drop(guard);
                self.mark(grid, sheet, target, None);

                self.snapshots.insert(before.clone());
                self.history.push(ExecutionSnapshot {
                    id: execution_id.clone(),
                    timestamp: Utc::now(),
                    command: command_json,
                    command_type,
                    before_state: before.clone(),
                    after_state: before,
                    description: description.clone(),
                    target_range,
                    success: false,
                    error: Some(message.clone()),
                });
                log::warn!("command '{description}' failed: {message}");
                Err(ExecuteError::Failed { execution_id, message })
            }
        }
    }

    pub fn rollback(
        &mut self,
        grid: &mut dyn Grid,
        request: RollbackRequest,
        confirm: &mut dyn Confirm,
    ) -> Result<RollbackReport, RollbackError> {
        let len = self.history.len();
        if len == 0 {
            return Err(RollbackError::NothingToRollback);
        }

        let (index, pop) = match &request {
            RollbackRequest::Single => (0, 1),
            RollbackRequest::Multiple { steps } => {
                if *steps == 0 {
                    return Err(RollbackError::InvalidSteps);
                }
                ((steps - 1).min(len - 1), (*steps).min(len))
            }
            RollbackRequest::Selective { target_id } => {
                let i = self
                    .history
                    .position(target_id)
                    .ok_or_else(|| RollbackError::UnknownExecution(target_id.clone()))?;
                (i, i + 1)
            }
        };

        let entry = self.history.get(index).ok_or(RollbackError::NothingToRollback)?;
        entry.before_state.verify()?;
        let restored_snapshot_id = entry.before_state.id.clone();
        let data = entry.before_state.sheet_data.clone();
        let description = entry.description.clone();

        if self.settings.rollback_require_confirmation {
            let request = ConfirmRequest::Rollback { description: &description, steps: pop };
            if !confirm.confirm(&request) {
                return Err(RollbackError::Cancelled);
            }
        }

        {
            let _guard = self.gate.enter(WriteOrigin::Remote)?;
            load_workbook(grid, &data, self.settings.restore_timeout)?;
        }

        let rolled_back: Vec<String> = self.history.pop_front(pop).into_iter().map(|e| e.id).collect();
        log::info!("rolled back {} execution(s) to before '{description}'", rolled_back.len());
        Ok(RollbackReport { restored_snapshot_id, rolled_back, remaining: self.history.len() })
    }

    /// Load a cached snapshot by id. History is not touched.
    pub fn restore_snapshot(&mut self, grid: &mut dyn Grid, snapshot_id: &str) -> Result<(), RollbackError> {
        let snapshot = self
            .snapshots
            .get(snapshot_id)
            .ok_or_else(|| SnapshotError::NotFound(snapshot_id.to_string()))?;
        snapshot.verify()?;
        let data = snapshot.sheet_data.clone();

        let _guard = self.gate.enter(WriteOrigin::Remote)?;
        load_workbook(grid, &data, self.settings.restore_timeout)?;
        log::info!("restored snapshot {snapshot_id}");
        Ok(())
    }

    fn mark(&self, grid: &mut dyn Grid, sheet: usize, target: Option<CellArea>, marker: Option<LineBorder>) {
        if let Some(area) = target {
            if let Err(e) = grid.draw_marker(sheet, area, marker) {
                log::debug!("marker not drawn on {area}: {e}");
            }
        }
    }
}

fn run_all(grid: &mut dyn Grid, commands: &[Command], options: &ApplyOptions) -> Result<Vec<CommandOutcome>, String> {
    let mut outcomes = Vec::with_capacity(commands.len());
    for command in commands {
        let outcome = apply_command(grid, command, options).map_err(|e| e.to_string())?;
        if let CommandOutcome::Styled(result) = &outcome {
            if !result.success {
                return Err(result.error.clone().unwrap_or_else(|| result.message.clone()));
            }
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn command_types(commands: &[Command]) -> String {
    let mut types: Vec<String> = Vec::new();
    for t in commands.iter().map(|c| c.command_type().to_string()) {
        if !types.contains(&t) {
            types.push(t);
        }
    }
    types.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;
    use crate::MemoryGrid;
    use serde_json::json;

    fn value_change(row: usize, col: usize, value: &str) -> Command {
        serde_json::from_value(json!({
            "commandType": "value_change",
            "sheetIndex": 0,
            "range": [row, col],
            "detailedCommand": value
        }))
        .unwrap()
    }

    #[test]
    fn test_success_marks_highlight_and_records() {
        let mut grid = MemoryGrid::new();
        let mut exec = CommandExecutor::new(ExecutorSettings::default(), WriteGate::new());
        let report = exec.execute_commands(&mut grid, vec![value_change(0, 0, "y")], &mut AutoConfirm(true)).unwrap();

        assert_eq!(report.target_range.as_deref(), Some("A1"));
        assert_eq!(grid.markers().len(), 1);
        assert_eq!(grid.markers()[0].border.style, LineStyle::Medium);
        assert!(!grid.is_paint_suspended());

        let entry = exec.history().get(0).unwrap();
        assert!(entry.success);
        assert_eq!(entry.id, report.execution_id);
        assert_eq!(entry.command_type, "value_change");
        assert_ne!(entry.before_state.checksum, entry.after_state.checksum);
        assert_eq!(exec.snapshots().len(), 2);
    }

    #[test]
    fn test_declined_confirmation_leaves_no_trace() {
        let mut grid = MemoryGrid::new();
        let settings = ExecutorSettings { require_confirmation: true, ..Default::default() };
        let mut exec = CommandExecutor::new(settings, WriteGate::new());
        let mut asked = 0;
        let mut decline = |_: &ConfirmRequest<'_>| {
            asked += 1;
            false
        };

        let err = exec.execute_commands(&mut grid, vec![value_change(0, 0, "y")], &mut decline).unwrap_err();
        assert!(matches!(err, ExecuteError::Cancelled));
        assert_eq!(asked, 1);
        assert!(grid.markers().is_empty());
        assert!(exec.snapshots().is_empty());
        assert!(!exec.can_rollback());
        assert_eq!(grid.value(0, 0, 0).unwrap(), CellValue::Empty);
    }

    #[test]
    fn test_response_flag_forces_confirmation() {
        let mut grid = MemoryGrid::new();
        let mut exec = CommandExecutor::new(ExecutorSettings::default(), WriteGate::new());
        let mut response = FormulaResponse::from_commands(vec![value_change(0, 0, "y")]);
        response.require_confirmation = true;
        let err = exec.execute(&mut grid, &response, &mut AutoConfirm(false)).unwrap_err();
        assert!(matches!(err, ExecuteError::Cancelled));
    }

    #[test]
    fn test_validation_failure_aborts_before_mutation() {
        let mut grid = MemoryGrid::new();
        let mut exec = CommandExecutor::new(ExecutorSettings::default(), WriteGate::new());
        let err = exec
            .execute_commands(&mut grid, vec![value_change(0, 0, "x"), value_change(0, 1, "destroy()")], &mut AutoConfirm(true))
            .unwrap_err();
        assert!(matches!(err, ExecuteError::Validation(ValidationError::DangerousKeyword("destroy"))));
        assert_eq!(grid.value(0, 0, 0).unwrap(), CellValue::Empty);
        assert!(!exec.can_rollback());
        assert!(grid.markers().is_empty());
    }

    #[test]
    fn test_failed_execution_restores_and_records() {
        let mut grid = MemoryGrid::new();
        let mut exec = CommandExecutor::new(ExecutorSettings::default(), WriteGate::new());
        let bad_formula: Command = serde_json::from_value(json!({
            "commandType": "sort_data",
            "range": [1, 0],
            "detailedCommand": { "not": "a formula" }
        }))
        .unwrap();

        let err = exec
            .execute_commands(&mut grid, vec![value_change(0, 0, "partial"), bad_formula], &mut AutoConfirm(true))
            .unwrap_err();
        let ExecuteError::Failed { execution_id, message } = err else {
            panic!("expected Failed");
        };
        assert!(message.contains("sort_data expects a formula string"));
        assert_eq!(grid.value(0, 0, 0).unwrap(), CellValue::Empty);
        assert!(grid.markers().is_empty());

        let entry = exec.history().get(0).unwrap();
        assert_eq!(entry.id, execution_id);
        assert!(!entry.success);
        assert_eq!(entry.before_state, entry.after_state);
        assert_eq!(exec.gate().state(), sheetpilot_core::GateState::Idle);
    }

    #[test]
    fn test_busy_gate_rejects_execution() {
        let mut grid = MemoryGrid::new();
        let gate = WriteGate::new();
        let mut exec = CommandExecutor::new(ExecutorSettings::default(), gate.clone());
        let _held = gate.enter(WriteOrigin::Local).unwrap();
        let err = exec.execute_commands(&mut grid, vec![value_change(0, 0, "y")], &mut AutoConfirm(true)).unwrap_err();
        assert!(matches!(err, ExecuteError::Gate(_)));
        assert_eq!(grid.value(0, 0, 0).unwrap(), CellValue::Empty);
    }

    #[test]
    fn test_rollback_requires_history() {
        let mut grid = MemoryGrid::new();
        let mut exec = CommandExecutor::new(ExecutorSettings::default(), WriteGate::new());
        assert!(matches!(
            exec.rollback(&mut grid, RollbackRequest::Single, &mut AutoConfirm(true)),
            Err(RollbackError::NothingToRollback)
        ));
    }
}
