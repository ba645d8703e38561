//! Client side of the delta sync endpoint.
//!
//! Local edits flow through [`DeltaQueue`] in debounced batches with
//! retry and backoff; AI-command executions are saved whole by the
//! [`Autosaver`]. Both report into one [`StatusStore`] the UI watches.
//!
//! Network access goes through the [`SyncTransport`] trait; the
//! production implementation is [`HttpSyncClient`].

mod auth;
mod autosave;
mod error;
mod queue;
mod retry;
mod status;
mod transport;

pub use auth::{
    auth_file_path, delete_auth, load_auth, load_auth_from, save_auth, save_auth_to, AuthCredentials, AuthError,
};
pub use autosave::{AutosaveConfig, Autosaver};
pub use error::SyncError;
pub use queue::{BatchConfig, DeltaQueue, ErrorCallback, SyncPhase, SyncedCallback};
pub use retry::RetryPolicy;
pub use status::{AutosaveStatus, StatusStore};
pub use transport::{HttpSyncClient, SyncTransport, EDIT_LOCK_HEADER};
