//! Gatherer Store - SQLite snapshot of cluster workloads
//!
//! One database per cluster holds the latest normalized manifest of every
//! workload, parsed node capacity and a small key/value table of engine
//! bookkeeping.

pub mod db;
pub mod error;
pub mod queries;
pub mod records;

pub use db::SnapshotStore;
pub use error::{Result, StoreError};
pub use queries::decode_manifest;
pub use records::{
    NodeRecord, NodeSummary, StoreSummary, UpsertOutcome, UpsertStatus, WorkloadKey,
    WorkloadRecord, WorkloadUpsert,
};

/// Metadata key holding the timestamp of the last completed sync
pub const META_LAST_SYNC: &str = "last_sync";
