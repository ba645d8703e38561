//! Saved sync credentials.
//!
//! Reads/writes ~/.config/sheetpilot/auth.json (0600 on Unix).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to access auth file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid auth file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Authentication credentials stored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthCredentials {
    /// Bearer token for the sync API
    pub token: String,
    /// API base URL (e.g., "http://localhost:3000")
    pub api_base: String,
    /// For display only
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthCredentials {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self { token: token.into(), api_base: api_base.into(), email: None }
    }
}

/// Returns the path to the auth credentials file.
pub fn auth_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("sheetpilot").join("auth.json"))
}

/// Load saved credentials. `None` if nothing is saved or the file is invalid.
pub fn load_auth() -> Option<AuthCredentials> {
    load_auth_from(&auth_file_path()?).ok()
}

pub fn load_auth_from(path: &Path) -> Result<AuthCredentials, AuthError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn save_auth(creds: &AuthCredentials) -> Result<(), AuthError> {
    let path = auth_file_path().ok_or(AuthError::NoConfigDir)?;
    save_auth_to(&path, creds)
}

/// Write credentials, creating the parent directory. Sets 0600 on Unix.
pub fn save_auth_to(path: &Path, creds: &AuthCredentials) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(creds)?)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

pub fn delete_auth() -> Result<(), AuthError> {
    let Some(path) = auth_file_path() else {
        return Ok(());
    };
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    Ok(())
}
