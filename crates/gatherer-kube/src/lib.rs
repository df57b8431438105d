//! Gatherer Kube - cluster access and sync pipeline
//!
//! - `client`: builds a `kube::Client` from a kubeconfig or explicit credentials
//! - `listing`: paginated listing with retry and error classification
//! - `sync`: normalizes, hashes and upserts fetched items
//! - `orchestrator`: bounded fan-out of listing+sync tasks, then finalize

pub mod client;
pub mod error;
pub mod listing;
pub mod orchestrator;
pub mod sync;

pub use client::{connect, credentials_kubeconfig};
pub use error::{KubeError, Result};
pub use listing::{
    FetchError, KubeTransport, ListError, ListPage, ListTransport, Lister, MockTransport,
    RetryPolicy,
};
pub use orchestrator::{
    FetchOrchestrator, SyncPlan, SyncSummary, SyncTask, exporter_for, sync_cluster,
};
pub use sync::{KindSyncResult, SyncEngine, SyncStats};
