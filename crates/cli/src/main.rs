// SheetPilot CLI - apply AI commands and server deltas to workbook files, push deltas

mod exit_codes;
mod sync;
mod workbook;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{EXIT_CMD_FAILED, EXIT_CMD_REJECTED, EXIT_ERROR, EXIT_IO, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE};
use sheetpilot_engine::{ExecuteError, WorkbookFileError};

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\ncommit: ",
        env!("SPILOT_COMMIT"),
        "\ntarget: ",
        env!("SPILOT_TARGET")
    )
}

#[derive(Parser)]
#[command(name = "spilot")]
#[command(about = "Apply AI edit commands and sync deltas for SheetPilot workbooks")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute an AI response against a workbook file
    #[command(after_help = "\
The response is the JSON returned by the formula endpoint:
  { \"success\": true, \"dataEditCommands\": [ { \"commandType\": \"value_change\", ... } ] }

The whole response runs as one execution: on any failure the workbook
file is left untouched.")]
    Apply {
        /// Workbook JSON (created if missing)
        workbook: PathBuf,

        /// AI response JSON
        response: PathBuf,

        /// Write the result here instead of over the workbook
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Skip confirmation prompts
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Apply server deltas (JSON array) to a workbook file
    Deltas {
        workbook: PathBuf,

        deltas: PathBuf,

        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Edit one cell as a local user would, recording the outgoing delta
    Set {
        workbook: PathBuf,

        /// A1-style address
        cell: String,

        /// Value; a leading '=' stores a formula
        value: String,

        #[arg(long, default_value = "Sheet1")]
        sheet: String,

        /// Append the captured delta to this JSON array file
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Send deltas (JSON array) to the sync endpoint in batches
    Push {
        deltas: PathBuf,

        #[arg(long)]
        spreadsheet: String,

        /// Opaque edit-lock version forwarded to the server
        #[arg(long)]
        version: Option<String>,

        /// Overrides saved credentials / settings
        #[arg(long, env = "SHEETPILOT_API_BASE")]
        api_base: Option<String>,

        #[arg(long, env = "SHEETPILOT_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Save sync credentials
    Login {
        #[arg(long)]
        token: String,

        #[arg(long)]
        api_base: Option<String>,
    },

    /// Delete saved sync credentials
    Logout,

    /// Convert between A1 addresses and zero-based row/column
    #[command(after_help = "\
Examples:
  spilot address AA10   ->  9 26
  spilot address 9 26   ->  AA10")]
    Address {
        #[arg(num_args = 1..=2, required = true)]
        input: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let result = match cli.command {
        Commands::Apply { workbook, response, out, yes } => workbook::cmd_apply(workbook, response, out, yes),
        Commands::Deltas { workbook, deltas, out } => workbook::cmd_deltas(workbook, deltas, out),
        Commands::Set { workbook, cell, value, sheet, record } => {
            workbook::cmd_set(workbook, cell, value, sheet, record)
        }
        Commands::Push { deltas, spreadsheet, version, api_base, token } => {
            sync::cmd_push(deltas, spreadsheet, version, api_base, token)
        }
        Commands::Login { token, api_base } => sync::cmd_login(token, api_base),
        Commands::Logout => sync::cmd_logout(),
        Commands::Address { input } => cmd_address(input),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(EXIT_PARSE, msg)
    }

    pub fn workbook(err: WorkbookFileError) -> Self {
        let code = match err {
            WorkbookFileError::Io(_) => EXIT_IO,
            WorkbookFileError::Json(_) | WorkbookFileError::Grid(_) => EXIT_PARSE,
        };
        Self::new(code, err.to_string())
    }

    pub fn execute(err: ExecuteError) -> Self {
        let code = match err {
            ExecuteError::Failed { .. } => EXIT_CMD_FAILED,
            ExecuteError::ResponseFailed | ExecuteError::Cancelled | ExecuteError::Validation(_) => {
                EXIT_CMD_REJECTED
            }
            ExecuteError::Gate(_) | ExecuteError::Snapshot(_) => EXIT_ERROR,
        };
        Self::new(code, err.to_string())
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// address
// ============================================================================

fn cmd_address(input: Vec<String>) -> Result<(), CliError> {
    match input.as_slice() {
        [a1] => {
            let pos = sheetpilot_core::parse_address(a1).map_err(|e| CliError::usage(e.to_string()))?;
            println!("{} {}", pos.row, pos.col);
        }
        [row, col] => {
            let row: usize = row.parse().map_err(|_| CliError::usage(format!("invalid row: {row}")))?;
            let col: usize = col.parse().map_err(|_| CliError::usage(format!("invalid column: {col}")))?;
            println!("{}", sheetpilot_core::to_address(row, col));
        }
        _ => return Err(CliError::usage("expected an A1 address or ROW COL")),
    }
    Ok(())
}
