//! Debounced full-workbook save after AI-command executions.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sheetpilot_engine::{AutosaveSink, SpreadsheetSnapshot};
use sheetpilot_protocol::SaveWorkbookRequest;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::SyncError;
use crate::status::StatusStore;
use crate::transport::SyncTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub enabled: bool,
    pub delay: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self { enabled: true, delay: Duration::from_millis(500) }
    }
}

struct Inner {
    transport: Arc<dyn SyncTransport>,
    config: AutosaveConfig,
    status: StatusStore,
    runtime: Handle,
    latest: Mutex<Option<SaveWorkbookRequest>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    save_lock: tokio::sync::Mutex<()>,
}

/// Saves the most recent requested workbook once requests stop arriving
/// for `delay`. One attempt per save; failures land in the status store.
#[derive(Clone)]
pub struct Autosaver {
    inner: Arc<Inner>,
}

impl Autosaver {
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(transport: Arc<dyn SyncTransport>, config: AutosaveConfig, status: StatusStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                status,
                runtime: Handle::current(),
                latest: Mutex::new(None),
                timer: Mutex::new(None),
                save_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// A save is waiting for its debounce window.
    pub fn is_queued(&self) -> bool {
        self.inner.latest.lock().is_some()
    }

    /// Save now. Returns false when nothing was queued.
    pub async fn flush(&self) -> Result<bool, SyncError> {
        self.cancel();
        self.inner.save().await
    }

    /// Stop the debounce timer. A queued save stays queued.
    pub fn cancel(&self) {
        if let Some(timer) = self.inner.timer.lock().take() {
            timer.abort();
        }
    }
}

impl AutosaveSink for Autosaver {
    fn request_save(&self, snapshot: &SpreadsheetSnapshot) {
        if !self.inner.config.enabled {
            return;
        }
        *self.inner.latest.lock() = Some(SaveWorkbookRequest {
            sheet_data: snapshot.sheet_data.clone(),
            checksum: snapshot.checksum.clone(),
            description: Some(snapshot.description.clone()),
        });
        self.inner.status.update(|s| s.pending = true);

        let inner = Arc::clone(&self.inner);
        let delay = self.inner.config.delay;
        let task = self.inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let saver = Arc::clone(&inner);
            inner.runtime.spawn(async move {
                let _ = saver.save().await;
            });
        });
        if let Some(old) = self.inner.timer.lock().replace(task) {
            old.abort();
        }
    }
}

impl Inner {
    async fn save(self: &Arc<Self>) -> Result<bool, SyncError> {
        let _serial = self.save_lock.lock().await;
        let Some(request) = self.latest.lock().take() else {
            return Ok(false);
        };
        self.status.update(|s| s.in_progress = true);

        let result = match self.transport.save_workbook(&request).await {
            Ok(resp) if resp.success => Ok(()),
            Ok(resp) => Err(SyncError::Rejected(resp.message.unwrap_or_else(|| "no message".into()))),
            Err(e) => Err(e),
        };

        let pending = self.latest.lock().is_some();
        match result {
            Ok(()) => {
                log::info!("autosaved workbook {}", request.checksum);
                self.status.saved(pending);
                Ok(true)
            }
            Err(err) => {
                log::error!("autosave failed: {err}");
                self.status.failed(pending, err.to_string());
                Err(err)
            }
        }
    }
}
