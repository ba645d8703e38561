//! CLI exit codes. Scripts rely on these; do not renumber.
//!
//! | Range | Domain    |
//! |-------|-----------|
//! | 0-5   | Universal |
//! | 10-19 | commands  |
//! | 20-29 | sync      |

use sheetpilot_sync::SyncError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments or malformed address.
pub const EXIT_USAGE: u8 = 2;

/// File could not be read or written.
pub const EXIT_IO: u8 = 3;

/// Input file is not valid JSON for its kind.
pub const EXIT_PARSE: u8 = 4;

// =============================================================================
// Commands (10-19)
// =============================================================================

/// AI response rejected by validation, reported failure, or declined.
pub const EXIT_CMD_REJECTED: u8 = 10;

/// A command failed mid-execution; the workbook was restored.
pub const EXIT_CMD_FAILED: u8 = 11;

/// A server delta could not be applied.
pub const EXIT_DELTA_FAILED: u8 = 12;

// =============================================================================
// Sync (20-29)
// =============================================================================

/// Network error after retries.
pub const EXIT_SYNC_NETWORK: u8 = 20;

/// Server error; sync disabled until failed deltas are retried.
pub const EXIT_SYNC_SERVER: u8 = 21;

/// No credentials available.
pub const EXIT_SYNC_AUTH: u8 = 22;

/// Server answered with a non-server failure (4xx, rejection, bad body).
pub const EXIT_SYNC_REJECTED: u8 = 23;

pub fn sync_exit_code(err: &SyncError) -> u8 {
    if err.is_server_error() {
        return EXIT_SYNC_SERVER;
    }
    match err {
        SyncError::NotAuthenticated => EXIT_SYNC_AUTH,
        SyncError::Network(_) => EXIT_SYNC_NETWORK,
        SyncError::Disabled => EXIT_SYNC_SERVER,
        SyncError::Http(..) | SyncError::Rejected(_) | SyncError::Parse(_) => EXIT_SYNC_REJECTED,
    }
}
