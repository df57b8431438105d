//! Gatherer Core - shared types for the data-gatherer workspace
//!
//! This crate provides the pure building blocks used by the store and the
//! sync pipeline:
//! - `AppConfig`: validated YAML configuration with namespace filters
//! - `KindSpec`: kind catalogue mapping kinds to API coordinates
//! - `normalize` / `manifest_hash`: change-detection primitives
//! - `NodeCapacity`: capacity facts extracted from Node objects
//! - `ManifestExporter`: manifest export to files or an archive

pub mod config;
pub mod error;
pub mod export;
pub mod hash;
pub mod kinds;
pub mod node;
pub mod normalize;
pub mod quantity;

pub use config::{
    AppConfig, ClusterConfig, ClusterCredentials, ClusterPaths, ClusterSource, LogFormat,
    LoggingConfig, NamespaceFilter, RetryConfig, StorageConfig, DEFAULT_CONFIG_FILE,
    DEFAULT_INCLUDE_KINDS,
};
pub use error::{CoreError, Result};
pub use export::{ExportFormat, ManifestExporter, ManifestSink, ARCHIVE_FILE_NAME};
pub use hash::{canonical_json, manifest_hash};
pub use kinds::{KindBehavior, KindSpec, resolve_kinds, static_kinds};
pub use node::{NodeCapacity, NodeRole, ResourceQuantities};
pub use normalize::normalize;
