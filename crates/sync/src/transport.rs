//! Sync endpoint transport.
//!
//! `SyncTransport` is the seam the batcher and autosaver talk to;
//! `HttpSyncClient` is the reqwest implementation used in production.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use sheetpilot_protocol::{
    ApplyBatchDeltasRequest, ApplyBatchDeltasResponse, SaveWorkbookRequest, SaveWorkbookResponse,
};

use crate::auth::{load_auth, AuthCredentials};
use crate::error::SyncError;

/// Header carrying the server's edit-lock version. Passed through untouched.
pub const EDIT_LOCK_HEADER: &str = "X-Edit-Lock-Version";

#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn apply_batch_deltas(
        &self,
        request: &ApplyBatchDeltasRequest,
    ) -> Result<ApplyBatchDeltasResponse, SyncError>;

    async fn save_workbook(&self, request: &SaveWorkbookRequest) -> Result<SaveWorkbookResponse, SyncError>;
}

/// HTTP client for one spreadsheet on the sync server.
pub struct HttpSyncClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    spreadsheet_id: String,
    edit_lock_version: RwLock<Option<String>>,
}

impl HttpSyncClient {
    pub fn new(creds: AuthCredentials, spreadsheet_id: impl Into<String>) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("spilot/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: creds.api_base.trim_end_matches('/').to_string(),
            token: creds.token,
            spreadsheet_id: spreadsheet_id.into(),
            edit_lock_version: RwLock::new(None),
        })
    }

    /// Client using saved credentials.
    pub fn from_saved_auth(spreadsheet_id: impl Into<String>) -> Result<Self, SyncError> {
        let creds = load_auth().ok_or(SyncError::NotAuthenticated)?;
        Self::new(creds, spreadsheet_id)
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// Set the opaque edit-lock token sent with every request.
    pub fn set_edit_lock_version(&self, version: Option<String>) {
        *self.edit_lock_version.write() = version;
    }

    pub fn edit_lock_version(&self) -> Option<String> {
        self.edit_lock_version.read().clone()
    }

    fn url(&self, tail: &str) -> String {
        format!("{}/api/spreadsheets/{}/{}", self.api_base, self.spreadsheet_id, tail)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req.bearer_auth(&self.token);
        match self.edit_lock_version() {
            Some(v) => req.header(EDIT_LOCK_HEADER, v),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, SyncError> {
        let response = self.authorized(req).send().await.map_err(|e| SyncError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Http(status.as_u16(), body));
        }

        response.json::<T>().await.map_err(|e| SyncError::Parse(e.to_string()))
    }
}

#[async_trait]
impl SyncTransport for HttpSyncClient {
    async fn apply_batch_deltas(
        &self,
        request: &ApplyBatchDeltasRequest,
    ) -> Result<ApplyBatchDeltasResponse, SyncError> {
        log::debug!("POST deltas/batch ({} deltas)", request.deltas.len());
        self.send(self.http.post(self.url("deltas/batch")).json(request)).await
    }

    async fn save_workbook(&self, request: &SaveWorkbookRequest) -> Result<SaveWorkbookResponse, SyncError> {
        log::debug!("PUT data ({})", request.checksum);
        self.send(self.http.put(self.url("data")).json(request)).await
    }
}
