//! Debounced autosave, alone and driven by the command executor.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::MockTransport;
use serde_json::json;
use sheetpilot_core::WriteGate;
use sheetpilot_engine::{
    AutoConfirm, AutosaveSink, CommandExecutor, ExecutorSettings, Grid, MemoryGrid, RollbackRequest,
    SpreadsheetSnapshot,
};
use sheetpilot_protocol::{Command, SaveWorkbookResponse};
use sheetpilot_sync::{AutosaveConfig, Autosaver, StatusStore, SyncError};
use tokio::time::sleep;

fn snapshot(grid: &MemoryGrid, description: &str) -> SpreadsheetSnapshot {
    SpreadsheetSnapshot::capture(grid, description, None).unwrap()
}

#[tokio::test(start_paused = true)]
async fn last_request_wins() {
    let mock = Arc::new(MockTransport::default());
    let saver = Autosaver::new(mock.clone(), AutosaveConfig::default(), StatusStore::new());
    let mut grid = MemoryGrid::new();

    for i in 0..3 {
        grid.set_value(0, 0, 0, sheetpilot_engine::CellValue::Number(i as f64)).unwrap();
        saver.request_save(&snapshot(&grid, &format!("edit {i}")));
        sleep(Duration::from_millis(100)).await;
    }
    assert!(mock.saves.lock().is_empty());
    assert!(saver.is_queued());

    sleep(Duration::from_secs(1)).await;
    let saves = mock.saves.lock();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].description.as_deref(), Some("edit 2"));
    assert_eq!(saves[0].checksum, snapshot(&grid, "").checksum);
}

#[tokio::test(start_paused = true)]
async fn disabled_autosave_never_saves() {
    let mock = Arc::new(MockTransport::default());
    let config = AutosaveConfig { enabled: false, ..Default::default() };
    let saver = Autosaver::new(mock.clone(), config, StatusStore::new());

    saver.request_save(&snapshot(&MemoryGrid::new(), "ignored"));
    sleep(Duration::from_secs(2)).await;
    assert!(mock.saves.lock().is_empty());
    assert_eq!(saver.flush().await, Ok(false));
}

#[tokio::test(start_paused = true)]
async fn failed_save_is_reported_once() {
    let mock = Arc::new(MockTransport::default());
    mock.save_script.lock().push_back(Err(SyncError::Http(502, "bad gateway".into())));
    let status = StatusStore::new();
    let saver = Autosaver::new(mock.clone(), AutosaveConfig::default(), status.clone());

    saver.request_save(&snapshot(&MemoryGrid::new(), "first"));
    assert_eq!(saver.flush().await, Err(SyncError::Http(502, "bad gateway".into())));
    assert_eq!(mock.saves.lock().len(), 1);
    assert_eq!(status.current().error.as_deref(), Some("HTTP 502: bad gateway"));

    mock.save_script.lock().push_back(Ok(SaveWorkbookResponse { success: true, message: None }));
    saver.request_save(&snapshot(&MemoryGrid::new(), "second"));
    assert_eq!(saver.flush().await, Ok(true));
    assert!(status.current().error.is_none());
}

#[tokio::test(start_paused = true)]
async fn executor_triggers_autosave_but_rollback_does_not() {
    let mock = Arc::new(MockTransport::default());
    let saver = Autosaver::new(mock.clone(), AutosaveConfig::default(), StatusStore::new());
    let mut exec = CommandExecutor::new(ExecutorSettings::default(), WriteGate::new()).with_autosave(Arc::new(saver));
    let mut grid = MemoryGrid::new();

    let command: Command = serde_json::from_value(json!({
        "commandType": "value_change",
        "range": [0, 0],
        "detailedCommand": "hello"
    }))
    .unwrap();
    exec.execute_commands(&mut grid, vec![command], &mut AutoConfirm(true)).unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(mock.saves.lock().len(), 1);

    exec.rollback(&mut grid, RollbackRequest::Single, &mut AutoConfirm(true)).unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(mock.saves.lock().len(), 1);
    assert!(grid.value(0, 0, 0).unwrap().is_empty());
}
