// Integration tests for the `spilot` binary.
// Run with: cargo test -p sheetpilot-cli --test cli_tests

use std::path::Path;
use std::process::{Command, Output};

use httpmock::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Binary with an isolated config directory.
fn spilot(config: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_spilot"));
    cmd.env("XDG_CONFIG_HOME", config.path())
        .env("HOME", config.path())
        .env_remove("SHEETPILOT_TOKEN")
        .env_remove("SHEETPILOT_API_BASE");
    cmd
}

fn write_json(path: &Path, value: &Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn cells(workbook: &Value) -> &Vec<Value> {
    workbook["sheets"][0]["cells"].as_array().unwrap()
}

// ---------------------------------------------------------------------------
// address
// ---------------------------------------------------------------------------

#[test]
fn address_converts_both_ways() {
    let config = TempDir::new().unwrap();

    let out = spilot(&config).args(["address", "AA10"]).output().unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "9 26");

    let out = spilot(&config).args(["address", "9", "26"]).output().unwrap();
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "AA10");

    let out = spilot(&config).args(["address", "10A"]).output().unwrap();
    assert_eq!(out.status.code(), Some(2));
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

#[test]
fn apply_writes_values_and_styles() {
    let config = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let workbook = dir.path().join("book.json");
    let response = dir.path().join("response.json");
    write_json(
        &response,
        &json!({
            "success": true,
            "analysis": { "detectedOperation": "fill totals" },
            "dataEditCommands": [
                { "commandType": "value_change", "range": [0, 0], "detailedCommand": "42" },
                {
                    "commandType": "apply_style",
                    "range": [0, 0],
                    "detailedCommand": { "method": "direct_method", "properties": { "backColor": "#FF0000" } }
                }
            ]
        }),
    );

    let out = spilot(&config)
        .args(["apply", workbook.to_str().unwrap(), response.to_str().unwrap(), "--yes"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let summary = stdout_json(&out);
    assert!(summary["executionId"].is_string());
    assert_eq!(summary["outcomes"][0], "applied");

    let saved = read_json(&workbook);
    let a1 = &cells(&saved)[0];
    assert_eq!(a1["value"], json!(42.0));
    assert_eq!(a1["style"]["backColor"], "#FF0000");
}

#[test]
fn rejected_response_leaves_file_untouched() {
    let config = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let workbook = dir.path().join("book.json");
    let response = dir.path().join("response.json");
    write_json(
        &response,
        &json!({
            "success": true,
            "dataEditCommands": [
                { "commandType": "use_formula", "range": [0, 0], "detailedCommand": "=eval(1)" }
            ]
        }),
    );

    let out = spilot(&config)
        .args(["apply", workbook.to_str().unwrap(), response.to_str().unwrap(), "--yes"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(10));
    assert!(!workbook.exists());
}

#[test]
fn unreadable_response_is_a_parse_error() {
    let config = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let response = dir.path().join("response.json");
    std::fs::write(&response, "{ nope").unwrap();

    let out = spilot(&config)
        .args(["apply", dir.path().join("b.json").to_str().unwrap(), response.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(4));
}

// ---------------------------------------------------------------------------
// set / deltas
// ---------------------------------------------------------------------------

#[test]
fn set_records_deltas_that_replay_elsewhere() {
    let config = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let local = dir.path().join("local.json");
    let remote = dir.path().join("remote.json");
    let record = dir.path().join("deltas.json");

    for (cell, value) in [("B2", "hello"), ("C3", "12.5"), ("D4", "=SUM(C3)")] {
        let out = spilot(&config)
            .args(["set", local.to_str().unwrap(), cell, value, "--record", record.to_str().unwrap()])
            .output()
            .unwrap();
        assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    }

    let recorded = read_json(&record);
    assert_eq!(recorded.as_array().unwrap().len(), 3);
    assert_eq!(recorded[0]["action"], "set-cell-value");
    assert_eq!(recorded[1]["value"], json!(12.5));
    assert_eq!(recorded[2]["action"], "set-cell-formula");

    let out = spilot(&config)
        .args(["deltas", remote.to_str().unwrap(), record.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(stdout_json(&out)["applied"], 3);

    assert_eq!(read_json(&local), read_json(&remote));
}

#[test]
fn bad_delta_aborts_without_saving() {
    let config = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let workbook = dir.path().join("book.json");
    let deltas = dir.path().join("deltas.json");
    write_json(
        &deltas,
        &json!([
            { "action": "set-cell-value", "sheetName": "Sheet1", "cellAddress": "A1", "value": 1 },
            { "action": "set-cell-value", "sheetName": "Nope", "cellAddress": "A1", "value": 2 }
        ]),
    );

    let out = spilot(&config)
        .args(["deltas", workbook.to_str().unwrap(), deltas.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(12));
    assert!(!workbook.exists());
}

// ---------------------------------------------------------------------------
// push
// ---------------------------------------------------------------------------

fn deltas_file(dir: &TempDir, n: usize) -> std::path::PathBuf {
    let path = dir.path().join("push.json");
    let deltas: Vec<Value> = (0..n)
        .map(|i| json!({ "action": "set-cell-value", "sheetName": "Sheet1", "cellAddress": format!("A{}", i + 1), "value": i }))
        .collect();
    write_json(&path, &Value::Array(deltas));
    path
}

#[test]
fn push_sends_batches_with_lock_version() {
    let config = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/spreadsheets/s1/deltas/batch")
            .header("authorization", "Bearer tok")
            .header("x-edit-lock-version", "3");
        then.status(200).json_body(json!({ "success": true, "data": { "appliedCount": 2 } }));
    });

    let out = spilot(&config)
        .args(["push", deltas_file(&dir, 2).to_str().unwrap(), "--spreadsheet", "s1", "--version", "3"])
        .args(["--api-base", &server.base_url(), "--token", "tok"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    mock.assert_calls(1);
    let summary = stdout_json(&out);
    assert_eq!(summary["applied"], 2);
    assert!(summary["status"]["lastSavedAt"].is_string());
}

#[test]
fn push_server_error_is_not_retried() {
    let config = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/spreadsheets/s1/deltas/batch");
        then.status(500).body("Internal Server Error");
    });

    let out = spilot(&config)
        .args(["push", deltas_file(&dir, 1).to_str().unwrap(), "--spreadsheet", "s1"])
        .args(["--api-base", &server.base_url(), "--token", "tok"])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(21));
    mock.assert_calls(1);
    assert!(String::from_utf8_lossy(&out.stderr).contains("hint:"));
}

#[test]
fn push_without_credentials() {
    let config = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let out = spilot(&config)
        .args(["push", deltas_file(&dir, 1).to_str().unwrap(), "--spreadsheet", "s1"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(22));
}

#[test]
fn login_saves_credentials_used_by_push() {
    let config = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/spreadsheets/s1/deltas/batch").header("authorization", "Bearer saved");
        then.status(200).json_body(json!({ "success": true }));
    });

    let out = spilot(&config).args(["login", "--token", "saved", "--api-base", &server.base_url()]).output().unwrap();
    assert!(out.status.success());

    let out = spilot(&config)
        .args(["push", deltas_file(&dir, 1).to_str().unwrap(), "--spreadsheet", "s1"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    mock.assert();

    let out = spilot(&config).arg("logout").output().unwrap();
    assert!(out.status.success());
}
