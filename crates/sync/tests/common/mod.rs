use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use sheetpilot_protocol::{
    ApplyBatchDeltasRequest, ApplyBatchDeltasResponse, ApplyDeltaRequest, SaveWorkbookRequest,
    SaveWorkbookResponse,
};
use sheetpilot_sync::{SyncError, SyncTransport};

/// Records every call. Batch sends answer from the script, then succeed.
#[derive(Default)]
pub struct MockTransport {
    pub batches: Mutex<Vec<Vec<ApplyDeltaRequest>>>,
    pub script: Mutex<VecDeque<Result<ApplyBatchDeltasResponse, SyncError>>>,
    pub saves: Mutex<Vec<SaveWorkbookRequest>>,
    pub save_script: Mutex<VecDeque<Result<SaveWorkbookResponse, SyncError>>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn failing(results: impl IntoIterator<Item = Result<ApplyBatchDeltasResponse, SyncError>>) -> Self {
        let mock = Self::default();
        mock.script.lock().extend(results);
        mock
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn addresses(&self, batch: usize) -> Vec<String> {
        self.batches.lock()[batch].iter().filter_map(|d| d.cell_address.clone()).collect()
    }
}

#[async_trait]
impl SyncTransport for MockTransport {
    async fn apply_batch_deltas(
        &self,
        request: &ApplyBatchDeltasRequest,
    ) -> Result<ApplyBatchDeltasResponse, SyncError> {
        let n = request.deltas.len();
        self.batches.lock().push(request.deltas.clone());
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(ApplyBatchDeltasResponse::ok(n)))
    }

    async fn save_workbook(&self, request: &SaveWorkbookRequest) -> Result<SaveWorkbookResponse, SyncError> {
        self.saves.lock().push(request.clone());
        let scripted = self.save_script.lock().pop_front();
        scripted.unwrap_or(Ok(SaveWorkbookResponse { success: true, message: None }))
    }
}
