//! Shared autosave/sync status, observed by the UI.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosaveStatus {
    /// Unsent changes exist.
    pub pending: bool,
    /// A send is in flight.
    pub in_progress: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
    /// Last user-visible failure. Cleared by the next success.
    pub error: Option<String>,
}

/// Cloneable handle to the status channel. Clones share state.
#[derive(Debug, Clone)]
pub struct StatusStore {
    tx: Arc<watch::Sender<AutosaveStatus>>,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AutosaveStatus::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> AutosaveStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AutosaveStatus> {
        self.tx.subscribe()
    }

    pub fn update(&self, f: impl FnOnce(&mut AutosaveStatus)) {
        self.tx.send_modify(f);
    }

    pub(crate) fn saved(&self, pending: bool) {
        self.update(|s| {
            s.pending = pending;
            s.in_progress = false;
            s.last_saved_at = Some(Utc::now());
            s.error = None;
        });
    }

    pub(crate) fn failed(&self, pending: bool, message: String) {
        self.update(|s| {
            s.pending = pending;
            s.in_progress = false;
            s.error = Some(message);
        });
    }
}
