pub mod cell;
pub mod command;
pub mod delta_apply;
pub mod executor;
pub mod grid;
pub mod history;
pub mod sheet;
pub mod snapshot;
pub mod style;
pub mod style_apply;
pub mod validate;
pub mod workbook;

pub use cell::CellValue;
pub use command::{apply_command, ApplyOptions, CommandOutcome, SortBehavior};
pub use delta_apply::{apply_delta, capture_local_edit, DeltaApplyError, DeltaOutcome};
pub use executor::{
    AutoConfirm, AutosaveSink, CommandExecutor, Confirm, ConfirmRequest, ExecuteError, ExecutionReport,
    ExecutorSettings, RollbackError, RollbackReport, RollbackRequest,
};
pub use grid::{load_workbook, Extents, Grid, GridError, LoadCallback, RestoreError, SerializeOptions};
pub use history::{ExecutionSnapshot, RollbackStack};
pub use snapshot::{checksum_of, SnapshotCache, SnapshotError, SpreadsheetSnapshot};
pub use style::{CellStyle, HAlign, LineBorder, LineStyle, StyleProp, TextDecoration, VAlign};
pub use style_apply::{apply_style, StyleApplyResult};
pub use validate::ValidationError;
pub use workbook::{MemoryGrid, WorkbookFileError};
