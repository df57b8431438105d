//! Error types for gatherer-kube

use thiserror::Error;

/// Result type for gatherer-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that abort a sync run or a client setup.
///
/// Per-kind listing failures are not errors at this level; they are
/// collected into the run summary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API or client error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Kubeconfig could not be read or resolved
    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// Snapshot store failure
    #[error("store error: {0}")]
    Store(#[from] gatherer_store::StoreError),

    /// Configuration or export failure from the core crate
    #[error(transparent)]
    Core(#[from] gatherer_core::CoreError),

    /// None of the configured kinds is known
    #[error(
        "no resolvable kinds for cluster '{cluster}'\n\
         Hint: check include_kinds and custom_kinds in the configuration"
    )]
    NoResolvableKinds { cluster: String },

    /// A blocking store task panicked or was cancelled
    #[error("sync task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}
