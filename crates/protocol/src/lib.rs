//! SheetPilot wire formats.
//!
//! Two independent streams cross the network boundary:
//!
//! - **Deltas** (`delta`): local user edits batched to the sync endpoint, and
//!   server deltas applied back onto the grid. JSON is camelCase, actions are
//!   kebab-case (`set-cell-value`).
//! - **Commands** (`command`): structured edit instructions returned by the AI
//!   backend inside a [`FormulaResponse`]. Command types are snake_case
//!   (`value_change`).
//!
//! Style payloads (`style`) are shared by both.

pub mod command;
pub mod delta;
pub mod style;

pub use command::{
    Analysis, CellLocations, Command, CommandAction, CommandError, CommandRange, CommandType, FormulaDetails,
    FormulaResponse, Implementation,
};
pub use delta::{
    AppliedCount, ApplyBatchDeltasRequest, ApplyBatchDeltasResponse, ApplyDeltaRequest, Delta, DeltaAction,
    DeltaBatch, DeltaError, SaveWorkbookRequest, SaveWorkbookResponse,
};
pub use style::{BorderSpec, StyleCommand, StyleMethod, StyleProperties};
