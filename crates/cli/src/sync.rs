// Sync commands: push, login, logout

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use sheetpilot_config::Settings;
use sheetpilot_core::WriteGate;
use sheetpilot_protocol::Delta;
use sheetpilot_sync::{
    delete_auth, load_auth, save_auth, AuthCredentials, BatchConfig, DeltaQueue, HttpSyncClient, StatusStore,
    SyncError,
};

use crate::exit_codes::{sync_exit_code, EXIT_ERROR};
use crate::workbook::read_json;
use crate::CliError;

fn sync_error(err: SyncError) -> CliError {
    let code = sync_exit_code(&err);
    let err_msg = err.to_string();
    let cli = CliError::new(code, err_msg);
    match err {
        SyncError::NotAuthenticated => cli.with_hint("run `spilot login --token <TOKEN>` or pass --token"),
        e if e.is_server_error() => cli.with_hint("sync is disabled; resolve the server error and push again"),
        _ => cli,
    }
}

/// Token and API base: flags first, then saved credentials, then settings.
fn credentials(settings: &Settings, api_base: Option<String>, token: Option<String>) -> Result<AuthCredentials, CliError> {
    let saved = load_auth();
    let token = token
        .or_else(|| saved.as_ref().map(|c| c.token.clone()))
        .ok_or_else(|| sync_error(SyncError::NotAuthenticated))?;
    let api_base = api_base
        .or_else(|| saved.map(|c| c.api_base))
        .unwrap_or_else(|| settings.api_base.clone());
    Ok(AuthCredentials::new(token, api_base))
}

// ============================================================================
// push
// ============================================================================

pub fn cmd_push(
    deltas: PathBuf,
    spreadsheet: String,
    version: Option<String>,
    api_base: Option<String>,
    token: Option<String>,
) -> Result<(), CliError> {
    let settings = Settings::load();
    let deltas: Vec<Delta> = read_json(&deltas)?;
    let creds = credentials(&settings, api_base, token)?;

    let client = HttpSyncClient::new(creds, spreadsheet).map_err(sync_error)?;
    client.set_edit_lock_version(version);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::new(EXIT_ERROR, format!("failed to start runtime: {e}")))?;

    let batch_size = settings.max_batch_size.max(1);
    let status = StatusStore::new();
    let pushed = runtime.block_on(async {
        // Batches are cut here; the queue's size trigger stays out of the way.
        let config = BatchConfig { max_batch_size: usize::MAX, ..settings.batch_config() };
        let queue = DeltaQueue::new(Arc::new(client), config, WriteGate::new(), status.clone());

        let mut pushed = 0usize;
        for chunk in deltas.chunks(batch_size) {
            for delta in chunk {
                queue.queue_delta(delta.clone());
            }
            pushed += queue.force_sync().await?;
        }
        Ok::<_, SyncError>(pushed)
    });
    let pushed = pushed.map_err(sync_error)?;

    println!("{}", json!({ "queued": deltas.len(), "applied": pushed, "status": status.current() }));
    Ok(())
}

// ============================================================================
// login / logout
// ============================================================================

pub fn cmd_login(token: String, api_base: Option<String>) -> Result<(), CliError> {
    let api_base = api_base.unwrap_or_else(|| Settings::load().api_base);
    save_auth(&AuthCredentials::new(token, api_base.clone())).map_err(|e| CliError::io(e.to_string()))?;
    eprintln!("Saved credentials for {api_base}");
    Ok(())
}

pub fn cmd_logout() -> Result<(), CliError> {
    delete_auth().map_err(|e| CliError::io(e.to_string()))?;
    eprintln!("Credentials removed");
    Ok(())
}
