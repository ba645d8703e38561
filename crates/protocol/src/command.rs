//! AI-issued edit commands and the response envelope that carries them.
//!
//! Commands arrive as loose JSON (`commandType` + untyped `detailedCommand`).
//! They are parsed once at the boundary into [`Command`], whose payload is a
//! typed [`CommandAction`], so downstream code never inspects raw JSON to
//! decide what a command does.

use serde::{Deserialize, Serialize};
use sheetpilot_core::{CellArea, CellPos};

use crate::style::StyleCommand;

// =============================================================================
// Command types
// =============================================================================

/// The `commandType` discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommandType {
    ValueChange,
    UseFormula,
    SortData,
    ApplyStyle,
    ControlSheet,
    /// Unrecognized type, kept verbatim so it can be reported.
    Other(String),
}

impl CommandType {
    pub fn as_str(&self) -> &str {
        match self {
            CommandType::ValueChange => "value_change",
            CommandType::UseFormula => "use_formula",
            CommandType::SortData => "sort_data",
            CommandType::ApplyStyle => "apply_style",
            CommandType::ControlSheet => "control_sheet",
            CommandType::Other(s) => s,
        }
    }
}

impl From<String> for CommandType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "value_change" => CommandType::ValueChange,
            "use_formula" => CommandType::UseFormula,
            "sort_data" => CommandType::SortData,
            "apply_style" => CommandType::ApplyStyle,
            "control_sheet" => CommandType::ControlSheet,
            _ => CommandType::Other(s),
        }
    }
}

impl From<CommandType> for String {
    fn from(t: CommandType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("range must have 2 ([row, col]) or 4 ([row, col, rowCount, colCount]) elements, got {0}")]
    RangeArity(usize),
    #[error("range row/column counts must be at least 1")]
    EmptyRange,
    #[error("{command_type} payload is invalid: {reason}")]
    InvalidPayload { command_type: String, reason: String },
}

// =============================================================================
// Command range
// =============================================================================

/// Target of a command: one cell (`[row, col]`) or a block
/// (`[row, col, rowCount, colCount]`). All indices are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub enum CommandRange {
    Cell(CellPos),
    Block(CellArea),
}

impl CommandRange {
    /// The rectangle this range covers.
    pub fn area(&self) -> CellArea {
        match self {
            CommandRange::Cell(pos) => CellArea::single(pos.row, pos.col),
            CommandRange::Block(area) => *area,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, CommandRange::Block(_))
    }
}

impl TryFrom<Vec<usize>> for CommandRange {
    type Error = CommandError;

    fn try_from(v: Vec<usize>) -> Result<Self, Self::Error> {
        match v.as_slice() {
            [row, col] => Ok(CommandRange::Cell(CellPos::new(*row, *col))),
            [row, col, rows, cols] => {
                if *rows == 0 || *cols == 0 {
                    return Err(CommandError::EmptyRange);
                }
                Ok(CommandRange::Block(CellArea::new(*row, *col, *rows, *cols)))
            }
            other => Err(CommandError::RangeArity(other.len())),
        }
    }
}

impl From<CommandRange> for Vec<usize> {
    fn from(r: CommandRange) -> Self {
        match r {
            CommandRange::Cell(p) => vec![p.row, p.col],
            CommandRange::Block(a) => vec![a.row, a.col, a.row_count, a.col_count],
        }
    }
}

// =============================================================================
// Command
// =============================================================================

/// Typed payload of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandAction {
    /// Literal value: a scalar for every cell, or a 2-D array for a block.
    ValueChange(serde_json::Value),
    UseFormula(String),
    SortData(serde_json::Value),
    ApplyStyle(StyleCommand),
    ControlSheet(serde_json::Value),
    Unknown { command_type: String, payload: serde_json::Value },
}

impl CommandAction {
    pub fn command_type(&self) -> CommandType {
        match self {
            CommandAction::ValueChange(_) => CommandType::ValueChange,
            CommandAction::UseFormula(_) => CommandType::UseFormula,
            CommandAction::SortData(_) => CommandType::SortData,
            CommandAction::ApplyStyle(_) => CommandType::ApplyStyle,
            CommandAction::ControlSheet(_) => CommandType::ControlSheet,
            CommandAction::Unknown { command_type, .. } => CommandType::Other(command_type.clone()),
        }
    }
}

/// One structured edit instruction from the AI backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCommand", into = "RawCommand")]
pub struct Command {
    pub sheet_index: usize,
    pub range: CommandRange,
    pub action: CommandAction,
}

impl Command {
    pub fn new(sheet_index: usize, range: CommandRange, action: CommandAction) -> Self {
        Self { sheet_index, range, action }
    }

    pub fn command_type(&self) -> CommandType {
        self.action.command_type()
    }

    /// All free text carried by the command, for denylist scanning.
    pub fn payload_text(&self) -> String {
        match &self.action {
            CommandAction::UseFormula(f) => f.clone(),
            CommandAction::ApplyStyle(s) => serde_json::to_string(s).unwrap_or_default(),
            CommandAction::ValueChange(v)
            | CommandAction::SortData(v)
            | CommandAction::ControlSheet(v)
            | CommandAction::Unknown { payload: v, .. } => match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }
}

/// Wire shape of a command. Only used through serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCommand {
    command_type: CommandType,
    #[serde(default)]
    sheet_index: usize,
    range: CommandRange,
    #[serde(default)]
    detailed_command: serde_json::Value,
}

impl TryFrom<RawCommand> for Command {
    type Error = CommandError;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        let payload = raw.detailed_command;
        let action = match raw.command_type {
            CommandType::ValueChange => CommandAction::ValueChange(payload),
            CommandType::UseFormula => match payload {
                serde_json::Value::String(f) => CommandAction::UseFormula(f),
                other => {
                    return Err(CommandError::InvalidPayload {
                        command_type: "use_formula".into(),
                        reason: format!("expected a formula string, got {other}"),
                    })
                }
            },
            CommandType::SortData => CommandAction::SortData(payload),
            CommandType::ApplyStyle => {
                let style = serde_json::from_value(payload).map_err(|e| CommandError::InvalidPayload {
                    command_type: "apply_style".into(),
                    reason: e.to_string(),
                })?;
                CommandAction::ApplyStyle(style)
            }
            CommandType::ControlSheet => CommandAction::ControlSheet(payload),
            CommandType::Other(command_type) => CommandAction::Unknown { command_type, payload },
        };
        Ok(Command { sheet_index: raw.sheet_index, range: raw.range, action })
    }
}

impl From<Command> for RawCommand {
    fn from(cmd: Command) -> Self {
        let command_type = cmd.command_type();
        let detailed_command = match cmd.action {
            CommandAction::UseFormula(f) => serde_json::Value::String(f),
            CommandAction::ApplyStyle(s) => serde_json::to_value(s).unwrap_or_default(),
            CommandAction::ValueChange(v)
            | CommandAction::SortData(v)
            | CommandAction::ControlSheet(v)
            | CommandAction::Unknown { payload: v, .. } => v,
        };
        RawCommand { command_type, sheet_index: cmd.sheet_index, range: cmd.range, detailed_command }
    }
}

// =============================================================================
// AI response envelope
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default)]
    pub detected_operation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellLocations {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    #[serde(default)]
    pub cell_locations: CellLocations,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaDetails {
    /// Free-text script. Scanned by validation, never executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadjs_command: Option<String>,
}

/// Response from the AI backend for one natural-language request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaResponse {
    pub success: bool,
    #[serde(default)]
    pub require_confirmation: bool,
    #[serde(default)]
    pub analysis: Analysis,
    #[serde(default)]
    pub implementation: Implementation,
    #[serde(default)]
    pub formula_details: FormulaDetails,
    #[serde(default, alias = "dataEditCommand")]
    pub data_edit_commands: Vec<Command>,
}

impl FormulaResponse {
    /// Wrap structured commands in a successful response.
    pub fn from_commands(commands: Vec<Command>) -> Self {
        Self { success: true, data_edit_commands: commands, ..Default::default() }
    }

    /// Human label for history entries.
    pub fn description(&self) -> String {
        let op = self.analysis.detected_operation.trim();
        if !op.is_empty() {
            return op.to_string();
        }
        match self.data_edit_commands.as_slice() {
            [] => "AI command".to_string(),
            [one] => one.command_type().to_string(),
            many => format!("{} commands", many.len()),
        }
    }

    /// Union of all command ranges on `sheet_index`, or the
    /// `cellLocations.target` address when no command names a range.
    pub fn target_area(&self, sheet_index: usize) -> Option<CellArea> {
        let from_commands = self
            .data_edit_commands
            .iter()
            .filter(|c| c.sheet_index == sheet_index)
            .map(|c| c.range.area())
            .reduce(|a, b| a.union(&b));
        from_commands.or_else(|| sheetpilot_core::parse_range(&self.implementation.cell_locations.target))
    }
}
