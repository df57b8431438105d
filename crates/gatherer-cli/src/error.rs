//! CLI error types with exit code handling
//!
//! Library errors are mapped onto a small set of user-facing diagnostics,
//! each carrying its exit code.

use gatherer_core::CoreError;
use gatherer_kube::KubeError;
use gatherer_store::StoreError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(code(data_gatherer::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Cluster has no store yet
    #[error("Cluster {cluster} is not initialized (no database at {path})")]
    #[diagnostic(code(data_gatherer::cli::not_initialized))]
    NotInitialized {
        cluster: String,
        path: String,
        #[help]
        help: Option<String>,
    },

    /// Connection, listing or store failure for a cluster
    #[error("Cluster {cluster}: {message}")]
    #[diagnostic(code(data_gatherer::cli::cluster))]
    Cluster { cluster: String, message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(data_gatherer::cli::io))]
    Io { message: String },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(data_gatherer::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::NotInitialized { .. } => exit_codes::NOT_INITIALIZED,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Attach the cluster name to a store error
    pub fn store(cluster: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotInitialized { path } => CliError::NotInitialized {
                cluster: cluster.to_string(),
                path,
                help: Some(format!("Run `data-gatherer init --cluster {}` first", cluster)),
            },
            other => CliError::Cluster {
                cluster: cluster.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Attach the cluster name to a sync error
    pub fn kube(cluster: &str, err: KubeError) -> Self {
        match err {
            KubeError::Store(store) => Self::store(cluster, store),
            other => CliError::Cluster {
                cluster: cluster.to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let help = match &err {
            CoreError::ConfigNotFound { .. } => {
                Some("Create the file or point --config at an existing one".to_string())
            }
            CoreError::ClusterNotFound { .. } => {
                Some("Check the cluster names under `clusters:` in the configuration".to_string())
            }
            _ => None,
        };
        match err {
            CoreError::Io(e) => CliError::from(e),
            other => CliError::Config {
                message: other.to_string(),
                help,
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<miette::Report> for CliError {
    fn from(err: miette::Report) -> Self {
        CliError::Other {
            message: format!("{:?}", err),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
