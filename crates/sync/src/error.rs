/// Error type for sync operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// No saved credentials
    #[error("not authenticated: no saved sync credentials")]
    NotAuthenticated,
    /// Transport-level failure (connect, timeout, TLS)
    #[error("network error: {0}")]
    Network(String),
    /// Non-success HTTP status with the response body
    #[error("HTTP {0}: {1}")]
    Http(u16, String),
    /// Server answered but reported `success: false`
    #[error("sync rejected: {0}")]
    Rejected(String),
    #[error("parse error: {0}")]
    Parse(String),
    /// Sync was turned off by an earlier server error
    #[error("sync disabled after a server error; retry failed deltas to resume")]
    Disabled,
}

impl SyncError {
    /// Server-side failures are terminal: the batch is not retried and sync
    /// stays off until the failed deltas are retried by hand.
    pub fn is_server_error(&self) -> bool {
        if let SyncError::Http(status, _) = self {
            if *status >= 500 {
                return true;
            }
        }
        let text = self.to_string();
        text.contains("500") || text.contains("Internal Server Error")
    }
}
