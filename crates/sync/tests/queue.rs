//! Batching, retry and failure policy of the delta queue, on paused time.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::MockTransport;
use parking_lot::Mutex;
use sheetpilot_core::{WriteGate, WriteOrigin};
use sheetpilot_protocol::{ApplyBatchDeltasResponse, Delta};
use sheetpilot_sync::{BatchConfig, DeltaQueue, RetryPolicy, StatusStore, SyncError, SyncPhase};
use tokio::time::{sleep, Instant};

fn queue_with(mock: &Arc<MockTransport>, config: BatchConfig) -> (DeltaQueue, WriteGate) {
    let gate = WriteGate::new();
    let queue = DeltaQueue::new(mock.clone(), config, gate.clone(), StatusStore::new());
    (queue, gate)
}

fn edit(addr: &str) -> Delta {
    Delta::set_value("Sheet1", addr, 1)
}

#[tokio::test(start_paused = true)]
async fn debounce_coalesces_into_one_batch() {
    let mock = Arc::new(MockTransport::default());
    let (queue, _) = queue_with(&mock, BatchConfig::default());

    for addr in ["A1", "B1", "C1"] {
        assert!(queue.queue_delta(edit(addr)));
        sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(mock.batch_count(), 0);
    assert_eq!(queue.phase(), SyncPhase::Pending);
    assert!(queue.status().current().pending);

    sleep(Duration::from_millis(600)).await;
    assert_eq!(mock.batch_count(), 1);
    assert_eq!(mock.addresses(0), vec!["A1", "B1", "C1"]);

    let status = queue.status().current();
    assert!(!status.pending && !status.in_progress);
    assert!(status.last_saved_at.is_some());
    assert!(queue.last_sync_at().is_some());
    assert_eq!(queue.phase(), SyncPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn full_queue_sends_without_waiting() {
    let mock = Arc::new(MockTransport::default());
    let config = BatchConfig { max_batch_size: 3, batch_timeout: Duration::from_secs(10), ..Default::default() };
    let (queue, _) = queue_with(&mock, config);

    queue.queue_delta(edit("A1"));
    queue.queue_delta(edit("A2"));
    queue.queue_delta(edit("A3"));
    sleep(Duration::from_millis(1)).await;
    assert_eq!(mock.batch_count(), 1);
    assert_eq!(queue.pending_len(), 0);

    // The debounce timer was cancelled, so nothing else is sent.
    sleep(Duration::from_secs(20)).await;
    assert_eq!(mock.batch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn server_error_is_terminal() {
    let mock = Arc::new(MockTransport::failing([Err(SyncError::Http(500, "Internal Server Error".into()))]));
    let (queue, _) = queue_with(&mock, BatchConfig::default());
    let errors = Arc::new(AtomicUsize::new(0));
    let seen = errors.clone();
    queue.on_error(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    queue.queue_delta(edit("A1"));
    let err = queue.force_sync().await.unwrap_err();
    assert!(err.is_server_error());
    assert_eq!(mock.batch_count(), 1, "server errors are never retried");
    assert_eq!(errors.load(Ordering::SeqCst), 1);

    assert!(!queue.is_enabled());
    assert_eq!(queue.failed_deltas().len(), 1);
    assert_eq!(queue.phase(), SyncPhase::PendingWithFailures);
    assert!(queue.status().current().error.is_some());

    // Edits made while disabled are held, not sent and not lost.
    assert!(queue.queue_delta(edit("B1")));
    assert_eq!(queue.pending_len(), 1);
    sleep(Duration::from_secs(5)).await;
    assert_eq!(mock.batch_count(), 1);
    assert_eq!(queue.send_batch_deltas().await, Err(SyncError::Disabled));

    // Manual intervention resumes sync and resends failed deltas ahead of the held ones.
    assert_eq!(queue.retry_failed_deltas().await, Ok(2));
    assert!(queue.is_enabled());
    assert!(queue.failed_deltas().is_empty());
    assert_eq!(queue.pending_len(), 0);
    assert!(queue.status().current().error.is_none());
    assert_eq!(mock.addresses(1), vec!["A1", "B1"]);
}

#[tokio::test(start_paused = true)]
async fn error_message_mentioning_500_is_terminal() {
    let mock = Arc::new(MockTransport::failing([Err(SyncError::Network("proxy returned 500".into()))]));
    let (queue, _) = queue_with(&mock, BatchConfig::default());

    queue.queue_delta(edit("A1"));
    assert!(queue.force_sync().await.is_err());
    assert_eq!(mock.batch_count(), 1);
    assert!(queue.status().current().error.is_some());
}

#[tokio::test(start_paused = true)]
async fn transient_errors_retry_with_backoff_then_fail() {
    let transient = || Err(SyncError::Network("connection reset".into()));
    let mock = Arc::new(MockTransport::failing((0..4).map(|_| transient())));
    let (queue, _) = queue_with(&mock, BatchConfig::default());

    queue.queue_delta(edit("A1"));
    let started = Instant::now();
    let err = queue.force_sync().await.unwrap_err();

    assert_eq!(err, SyncError::Network("connection reset".into()));
    assert_eq!(mock.batch_count(), 4, "one attempt plus max_retries");
    // 1s + 2s + 4s of backoff.
    assert!(started.elapsed() >= Duration::from_secs(7));
    assert_eq!(queue.failed_deltas().len(), 1);
    assert!(queue.is_enabled());
    assert_eq!(queue.status().current().error.as_deref(), Some("network error: connection reset"));
}

#[tokio::test(start_paused = true)]
async fn backoff_is_capped() {
    let transient = || Err(SyncError::Network("timeout".into()));
    let mock = Arc::new(MockTransport::failing((0..3).map(|_| transient())));
    let config = BatchConfig {
        retry: RetryPolicy {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(15),
            max_retries: 2,
        },
        ..Default::default()
    };
    let (queue, _) = queue_with(&mock, config);

    queue.queue_delta(edit("A1"));
    let started = Instant::now();
    assert!(queue.force_sync().await.is_err());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(25) && elapsed < Duration::from_secs(26));
}

#[tokio::test(start_paused = true)]
async fn rejection_is_retried() {
    let rejected = ApplyBatchDeltasResponse { success: false, message: Some("locked".into()), data: None };
    let mock = Arc::new(MockTransport::failing([Ok(rejected)]));
    let (queue, _) = queue_with(&mock, BatchConfig::default());

    queue.queue_delta(edit("A1"));
    assert_eq!(queue.force_sync().await, Ok(1));
    assert_eq!(mock.batch_count(), 2);
    assert!(queue.failed_deltas().is_empty());
}

#[tokio::test(start_paused = true)]
async fn remote_writes_are_not_captured() {
    let mock = Arc::new(MockTransport::default());
    let (queue, gate) = queue_with(&mock, BatchConfig::default());

    {
        let _remote = gate.enter(WriteOrigin::Remote).unwrap();
        assert!(!queue.queue_delta(edit("A1")));
        assert_eq!(queue.pending_len(), 0);
    }
    assert!(queue.queue_delta(edit("A1")));
    assert_eq!(queue.pending_len(), 1);
}

#[tokio::test(start_paused = true)]
async fn batches_and_callbacks_keep_fifo_order() {
    let mock = Arc::new(MockTransport::default());
    let (queue, _) = queue_with(&mock, BatchConfig::default());
    let synced = Arc::new(Mutex::new(Vec::new()));
    let sink = synced.clone();
    queue.on_synced(move |d| sink.lock().push(d.cell_address.clone().unwrap_or_default()));

    queue.queue_delta(edit("A1"));
    queue.queue_delta(edit("B1"));
    queue.force_sync().await.unwrap();
    queue.queue_delta(edit("C1"));
    queue.force_sync().await.unwrap();

    assert_eq!(*synced.lock(), vec!["A1", "B1", "C1"]);
    assert_eq!(mock.addresses(0), vec!["A1", "B1"]);
    assert_eq!(mock.addresses(1), vec!["C1"]);
}

#[tokio::test(start_paused = true)]
async fn force_sync_with_nothing_pending() {
    let mock = Arc::new(MockTransport::default());
    let (queue, _) = queue_with(&mock, BatchConfig::default());
    assert_eq!(queue.force_sync().await, Ok(0));
    assert_eq!(mock.batch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_timer_keeps_deltas_queued() {
    let mock = Arc::new(MockTransport::default());
    let (queue, _) = queue_with(&mock, BatchConfig::default());

    queue.queue_delta(edit("A1"));
    queue.cancel_timer();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(mock.batch_count(), 0);
    assert_eq!(queue.pending_len(), 1);

    assert_eq!(queue.force_sync().await, Ok(1));
}
