// Workbook-file commands: apply, deltas, set

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::json;
use sheetpilot_config::Settings;
use sheetpilot_core::WriteGate;
use sheetpilot_engine::{
    apply_delta, capture_local_edit, CellValue, CommandExecutor, CommandOutcome, ConfirmRequest, DeltaOutcome,
    MemoryGrid,
};
use sheetpilot_protocol::{Delta, FormulaResponse};

use crate::exit_codes::EXIT_DELTA_FAILED;
use crate::CliError;

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&text).map_err(|e| CliError::parse(format!("{}: {}", path.display(), e)))
}

fn open_workbook(path: &Path) -> Result<MemoryGrid, CliError> {
    if !path.exists() {
        log::info!("{} does not exist, starting from an empty workbook", path.display());
        return Ok(MemoryGrid::new());
    }
    MemoryGrid::load_file(path).map_err(CliError::workbook)
}

fn ask(question: &str) -> bool {
    eprint!("{question} [y/N] ");
    let _ = io::stderr().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim(), "y" | "Y" | "yes")
}

fn describe(outcome: &CommandOutcome) -> String {
    match outcome {
        CommandOutcome::Applied => "applied".to_string(),
        CommandOutcome::Styled(result) => result.message.clone(),
        CommandOutcome::NoOp => "no-op".to_string(),
        CommandOutcome::Ignored { command_type } => format!("ignored unknown command type '{command_type}'"),
    }
}

// ============================================================================
// apply
// ============================================================================

pub fn cmd_apply(workbook: PathBuf, response: PathBuf, out: Option<PathBuf>, yes: bool) -> Result<(), CliError> {
    let settings = Settings::load();
    let mut grid = open_workbook(&workbook)?;
    let response: FormulaResponse = read_json(&response)?;

    let mut exec = CommandExecutor::new(settings.executor_settings(), WriteGate::new());
    let mut confirm = |req: &ConfirmRequest<'_>| {
        yes || match req {
            ConfirmRequest::Execute { description, target } => {
                let target = target.as_ref().map(|a| a.to_string()).unwrap_or_else(|| "the workbook".to_string());
                ask(&format!("Apply \"{description}\" to {target}?"))
            }
            ConfirmRequest::Rollback { description, steps } => {
                ask(&format!("Roll back {steps} step(s) to \"{description}\"?"))
            }
        }
    };

    let report = exec.execute(&mut grid, &response, &mut confirm).map_err(|e| {
        let hint = matches!(e, sheetpilot_engine::ExecuteError::Cancelled).then_some("pass --yes to skip the prompt");
        let err = CliError::execute(e);
        match hint {
            Some(h) => err.with_hint(h),
            None => err,
        }
    })?;

    let target = out.unwrap_or(workbook);
    grid.save_file(&target).map_err(CliError::workbook)?;

    let summary = json!({
        "executionId": report.execution_id,
        "targetRange": report.target_range,
        "outcomes": report.outcomes.iter().map(describe).collect::<Vec<_>>(),
        "output": target.display().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&summary).map_err(|e| CliError::parse(e.to_string()))?);
    Ok(())
}

// ============================================================================
// deltas
// ============================================================================

pub fn cmd_deltas(workbook: PathBuf, deltas: PathBuf, out: Option<PathBuf>) -> Result<(), CliError> {
    let mut grid = open_workbook(&workbook)?;
    let deltas: Vec<Delta> = read_json(&deltas)?;
    let gate = WriteGate::new();

    let mut applied = 0usize;
    let mut ignored = Vec::new();
    for (i, delta) in deltas.iter().enumerate() {
        match apply_delta(&mut grid, delta, &gate) {
            Ok(DeltaOutcome::Applied) => applied += 1,
            Ok(DeltaOutcome::Ignored(action)) => ignored.push(format!("{action:?}")),
            Err(e) => {
                return Err(CliError::new(EXIT_DELTA_FAILED, format!("delta {i} ({:?}): {e}", delta.action))
                    .with_hint("the workbook file was not modified"));
            }
        }
    }

    let target = out.unwrap_or(workbook);
    grid.save_file(&target).map_err(CliError::workbook)?;
    println!("{}", json!({ "applied": applied, "ignored": ignored }));
    Ok(())
}

// ============================================================================
// set
// ============================================================================

pub fn cmd_set(
    workbook: PathBuf,
    cell: String,
    value: String,
    sheet: String,
    record: Option<PathBuf>,
) -> Result<(), CliError> {
    let mut grid = open_workbook(&workbook)?;

    let delta = if value.starts_with('=') {
        Delta::set_formula(&sheet, &cell, &value)
    } else {
        let typed = serde_json::to_value(CellValue::from_input(&value)).map_err(|e| CliError::parse(e.to_string()))?;
        Delta::set_value(&sheet, &cell, typed)
    };

    let delta = capture_local_edit(&mut grid, &WriteGate::new(), delta)
        .map_err(|e| CliError::usage(e.to_string()))?;
    grid.save_file(&workbook).map_err(CliError::workbook)?;

    if let Some(path) = record {
        let mut recorded: Vec<Delta> = if path.exists() { read_json(&path)? } else { Vec::new() };
        recorded.push(delta.clone());
        let text = serde_json::to_string_pretty(&recorded).map_err(|e| CliError::parse(e.to_string()))?;
        std::fs::write(&path, text).map_err(|e| CliError::io(format!("cannot write {}: {}", path.display(), e)))?;
    }

    println!("{}", serde_json::to_string(&delta).map_err(|e| CliError::parse(e.to_string()))?);
    Ok(())
}
