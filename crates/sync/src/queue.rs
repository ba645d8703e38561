//! Delta queue and batcher.
//!
//! Local edits are queued as deltas and sent to the sync endpoint in batches:
//!
//! ```text
//!   queue_delta ──► pending ──(batch_timeout elapsed | max_batch_size)──► send
//!                                                                        │
//!        ┌───────────── success: on_synced per delta, status saved ◄─────┤
//!        │                                                               │
//!        │   network/other error: backoff (base * 2^n, capped) and retry ┤
//!        │   retries exhausted:   deltas → failed, status error          │
//!        └── server error:        deltas → failed, sync disabled ◄───────┘
//! ```
//!
//! Sends are serialized by an async lock, so batches leave in FIFO order
//! even when a timer fires while another batch is still in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sheetpilot_core::WriteGate;
use sheetpilot_protocol::{Delta, DeltaBatch};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::SyncError;
use crate::retry::RetryPolicy;
use crate::status::StatusStore;
use crate::transport::SyncTransport;

pub type SyncedCallback = Arc<dyn Fn(&Delta) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&SyncError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Debounce window after the last queued delta.
    pub batch_timeout: Duration,
    /// Queue length that triggers an immediate send.
    pub max_batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_timeout: Duration::from_millis(500),
            max_batch_size: 50,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPhase {
    Idle,
    Pending,
    Processing,
    PendingWithFailures,
}

#[derive(Default)]
struct QueueState {
    pending: Vec<Delta>,
    failed: Vec<Delta>,
    in_flight: bool,
    enabled: bool,
    last_sync_at: Option<DateTime<Utc>>,
    timer: Option<JoinHandle<()>>,
}

impl QueueState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct Inner {
    transport: Arc<dyn SyncTransport>,
    config: BatchConfig,
    gate: WriteGate,
    status: StatusStore,
    runtime: Handle,
    state: Mutex<QueueState>,
    send_lock: tokio::sync::Mutex<()>,
    on_synced: Mutex<Option<SyncedCallback>>,
    on_error: Mutex<Option<ErrorCallback>>,
}

/// Handle to the batcher. Clones share the same queue.
#[derive(Clone)]
pub struct DeltaQueue {
    inner: Arc<Inner>,
}

impl DeltaQueue {
    /// Create a queue whose timers run on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(transport: Arc<dyn SyncTransport>, config: BatchConfig, gate: WriteGate, status: StatusStore) -> Self {
        Self::with_runtime(transport, config, gate, status, Handle::current())
    }

    pub fn with_runtime(
        transport: Arc<dyn SyncTransport>,
        config: BatchConfig,
        gate: WriteGate,
        status: StatusStore,
        runtime: Handle,
    ) -> Self {
        let state = QueueState { enabled: true, ..Default::default() };
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                gate,
                status,
                runtime,
                state: Mutex::new(state),
                send_lock: tokio::sync::Mutex::new(()),
                on_synced: Mutex::new(None),
                on_error: Mutex::new(None),
            }),
        }
    }

    /// Called once per delta, in batch order, after its batch is accepted.
    pub fn on_synced(&self, f: impl Fn(&Delta) + Send + Sync + 'static) {
        *self.inner.on_synced.lock() = Some(Arc::new(f));
    }

    /// Called when a batch is abandoned or hits a server error.
    pub fn on_error(&self, f: impl Fn(&SyncError) + Send + Sync + 'static) {
        *self.inner.on_error.lock() = Some(Arc::new(f));
    }

    /// Queue a local delta. Returns false when it was dropped because a
    /// server-origin write holds the gate.
    ///
    /// While sync is disabled deltas still queue, but nothing is armed or
    /// sent until `retry_failed_deltas` re-enables sync.
    pub fn queue_delta(&self, delta: Delta) -> bool {
        if self.inner.gate.is_applying_remote() {
            log::debug!("dropping {:?} delta captured during a remote write", delta.action);
            return false;
        }

        let flush_now = {
            let mut st = self.inner.state.lock();
            st.pending.push(delta);
            if !st.enabled {
                log::debug!("sync disabled, holding {} pending deltas", st.pending.len());
                false
            } else if st.pending.len() >= self.inner.config.max_batch_size {
                st.cancel_timer();
                true
            } else {
                self.inner.arm_timer(&mut st);
                false
            }
        };
        self.inner.status.update(|s| s.pending = true);

        if flush_now {
            self.inner.spawn_send();
        }
        true
    }

    /// Send everything pending now, without waiting for the timer.
    pub async fn send_batch_deltas(&self) -> Result<usize, SyncError> {
        self.inner.send_batch().await
    }

    /// Cancel the debounce timer and flush.
    pub async fn force_sync(&self) -> Result<usize, SyncError> {
        self.cancel_timer();
        self.inner.send_batch().await
    }

    /// Requeue failed deltas ahead of anything pending, re-enable sync and send.
    pub async fn retry_failed_deltas(&self) -> Result<usize, SyncError> {
        let has_work = {
            let mut st = self.inner.state.lock();
            let mut requeued = std::mem::take(&mut st.failed);
            log::info!("retrying {} failed deltas", requeued.len());
            requeued.append(&mut st.pending);
            st.pending = requeued;
            st.enabled = true;
            st.cancel_timer();
            !st.pending.is_empty()
        };
        self.inner.status.update(|s| {
            s.error = None;
            s.pending = has_work;
        });
        self.inner.send_batch().await
    }

    /// Teardown: stop the debounce timer. Pending deltas stay queued.
    pub fn cancel_timer(&self) {
        self.inner.state.lock().cancel_timer();
    }

    pub fn enable_sync(&self) {
        self.inner.state.lock().enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.lock().enabled
    }

    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    pub fn failed_deltas(&self) -> Vec<Delta> {
        self.inner.state.lock().failed.clone()
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().last_sync_at
    }

    pub fn phase(&self) -> SyncPhase {
        let st = self.inner.state.lock();
        if st.in_flight {
            SyncPhase::Processing
        } else if !st.failed.is_empty() {
            SyncPhase::PendingWithFailures
        } else if !st.pending.is_empty() {
            SyncPhase::Pending
        } else {
            SyncPhase::Idle
        }
    }

    pub fn status(&self) -> &StatusStore {
        &self.inner.status
    }
}

impl Inner {
    /// Restart the debounce timer. The timer only spawns the send, so
    /// re-arming it never cancels a batch already in flight.
    fn arm_timer(self: &Arc<Self>, st: &mut QueueState) {
        st.cancel_timer();
        let inner = Arc::clone(self);
        let delay = self.config.batch_timeout;
        st.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.spawn_send();
        }));
    }

    fn spawn_send(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            // Failures are logged and reported through on_error.
            let _ = inner.send_batch().await;
        });
    }

    async fn send_batch(self: &Arc<Self>) -> Result<usize, SyncError> {
        let _serial = self.send_lock.lock().await;

        let mut batch = {
            let mut st = self.state.lock();
            if !st.enabled {
                return Err(SyncError::Disabled);
            }
            if st.pending.is_empty() {
                return Ok(0);
            }
            st.in_flight = true;
            DeltaBatch::new(std::mem::take(&mut st.pending))
        };
        self.status.update(|s| s.in_progress = true);
        log::info!("sending batch of {} deltas", batch.len());

        let policy = self.config.retry;
        let outcome = loop {
            let err = match self.transport.apply_batch_deltas(&batch.to_request()).await {
                Ok(resp) if resp.success => break Ok(resp.data.map_or(batch.len(), |d| d.applied_count)),
                Ok(resp) => SyncError::Rejected(resp.message.unwrap_or_else(|| "no message".into())),
                Err(e) => e,
            };
            if err.is_server_error() || !policy.should_retry(batch.retry_count) {
                break Err(err);
            }
            let delay = policy.delay_for(batch.retry_count);
            batch.retry_count += 1;
            log::warn!("batch send failed: {err}; retry {}/{} in {delay:?}", batch.retry_count, policy.max_retries);
            tokio::time::sleep(delay).await;
        };

        match outcome {
            Ok(applied) => {
                let pending = {
                    let mut st = self.state.lock();
                    st.in_flight = false;
                    st.last_sync_at = Some(Utc::now());
                    !st.pending.is_empty()
                };
                self.status.saved(pending);
                log::info!("batch synced: {applied} applied");

                let callback = self.on_synced.lock().clone();
                if let Some(cb) = callback {
                    for delta in &batch.deltas {
                        cb(delta);
                    }
                }
                Ok(applied)
            }
            Err(err) => {
                let server = err.is_server_error();
                let retries = batch.retry_count;
                let pending = {
                    let mut st = self.state.lock();
                    st.in_flight = false;
                    st.failed.extend(batch.deltas);
                    if server {
                        st.enabled = false;
                        st.cancel_timer();
                    }
                    !st.pending.is_empty()
                };
                if server {
                    log::error!("server error, sync disabled: {err}");
                } else {
                    log::warn!("batch abandoned after {retries} retries: {err}");
                }
                self.status.failed(pending, err.to_string());

                let callback = self.on_error.lock().clone();
                if let Some(cb) = callback {
                    cb(&err);
                }
                Err(err)
            }
        }
    }
}
