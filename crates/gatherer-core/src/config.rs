//! Application configuration
//!
//! Loaded from a YAML file and validated once; everything downstream works
//! with the resolved types (`ClusterSource`, `NamespaceFilter`) instead of
//! re-checking raw options.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::export::ExportFormat;
use crate::kinds::KindSpec;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_FILE: &str = "config/config.yaml";

/// Kinds synced when a cluster does not list its own
pub const DEFAULT_INCLUDE_KINDS: &[&str] = &[
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "CronJob",
    "DeploymentConfig",
    "Node",
];

const DEFAULT_PARALLELISM: usize = 4;
const DEFAULT_PAGE_SIZE: u32 = 500;

/// Validated application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub clusters: Vec<ClusterConfig>,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub retry: RetryConfig,
}

/// Where cluster connection details come from
#[derive(Debug, Clone)]
pub enum ClusterSource {
    Kubeconfig {
        path: PathBuf,
        context: Option<String>,
    },
    Credentials(ClusterCredentials),
}

/// Explicit API server credentials
#[derive(Clone, Deserialize)]
pub struct ClusterCredentials {
    pub host: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub cert_file: Option<PathBuf>,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
}

impl fmt::Debug for ClusterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterCredentials")
            .field("host", &self.host)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("cert_file", &self.cert_file)
            .field("key_file", &self.key_file)
            .field("ca_file", &self.ca_file)
            .field("verify_ssl", &self.verify_ssl)
            .finish()
    }
}

/// One cluster to gather from
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub name: String,
    pub source: ClusterSource,
    pub include_kinds: Vec<String>,
    pub custom_kinds: BTreeMap<String, KindSpec>,
    pub namespace_filter: NamespaceFilter,
    pub namespace_scoped: bool,
    pub include_namespaces: Vec<String>,
    pub parallelism: usize,
    pub page_size: u32,
}

impl ClusterConfig {
    pub fn is_namespace_excluded(&self, namespace: &str) -> bool {
        self.namespace_filter.is_excluded(namespace)
    }
}

/// Namespace exclusion: exact names plus glob patterns
#[derive(Debug, Clone, Default)]
pub struct NamespaceFilter {
    exact: BTreeSet<String>,
    patterns: Vec<glob::Pattern>,
}

impl NamespaceFilter {
    /// Build from raw entries; entries containing `*`, `?` or `[` are patterns
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut filter = Self::default();
        for entry in entries {
            filter.add(entry)?;
        }
        Ok(filter)
    }

    fn add(&mut self, entry: &str) -> Result<()> {
        if is_glob(entry) {
            if self.patterns.iter().any(|p| p.as_str() == entry) {
                return Ok(());
            }
            let pattern = glob::Pattern::new(entry).map_err(|e| CoreError::InvalidPattern {
                pattern: entry.to_string(),
                message: e.to_string(),
            })?;
            self.patterns.push(pattern);
        } else {
            self.exact.insert(entry.to_string());
        }
        Ok(())
    }

    fn extend(&mut self, other: &NamespaceFilter) {
        self.exact.extend(other.exact.iter().cloned());
        for pattern in &other.patterns {
            if !self.patterns.iter().any(|p| p.as_str() == pattern.as_str()) {
                self.patterns.push(pattern.clone());
            }
        }
    }

    pub fn is_excluded(&self, namespace: &str) -> bool {
        self.exact.contains(namespace) || self.patterns.iter().any(|p| p.matches(namespace))
    }
}

fn is_glob(entry: &str) -> bool {
    entry.contains(['*', '?', '['])
}

/// Storage layout and manifest export options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub base_dir: PathBuf,
    pub write_manifest_files: bool,
    pub manifest_format: ExportFormat,
    pub archive: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("clusters"),
            write_manifest_files: true,
            manifest_format: ExportFormat::Json,
            archive: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// Listing retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            backoff_base_ms: 500,
        }
    }
}

/// On-disk locations for one cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterPaths {
    pub base_dir: PathBuf,
    pub db_path: PathBuf,
    pub manifests_dir: PathBuf,
    pub reports_dir: PathBuf,
}

// ============ Raw file format ============

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    system_namespaces: Vec<String>,
    clusters: Vec<RawCluster>,
    storage: StorageConfig,
    logging: LoggingConfig,
    retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct RawCluster {
    name: String,
    #[serde(default)]
    kubeconfig: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    credentials: Option<ClusterCredentials>,
    #[serde(default)]
    include_kinds: Option<Vec<String>>,
    #[serde(default)]
    custom_kinds: BTreeMap<String, KindSpec>,
    #[serde(default)]
    exclude_namespaces: Vec<String>,
    #[serde(default = "default_true")]
    ignore_system_namespaces: bool,
    #[serde(default)]
    namespace_scoped: bool,
    #[serde(default)]
    include_namespaces: Vec<String>,
    #[serde(default)]
    parallelism: Option<usize>,
    #[serde(default)]
    page_size: Option<u32>,
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let raw: Option<RawConfig> = serde_yaml::from_str(content)?;
        let raw = raw.unwrap_or_default();

        let system =
            NamespaceFilter::from_entries(raw.system_namespaces.iter().map(String::as_str))?;

        if raw.clusters.is_empty() {
            return Err(CoreError::invalid("No clusters defined in configuration"));
        }

        let mut seen = BTreeSet::new();
        let mut clusters = Vec::with_capacity(raw.clusters.len());
        for cluster in raw.clusters {
            if !seen.insert(cluster.name.clone()) {
                return Err(CoreError::invalid(format!(
                    "Cluster {} is defined more than once",
                    cluster.name
                )));
            }
            clusters.push(resolve_cluster(cluster, &system)?);
        }

        Ok(Self {
            clusters,
            storage: raw.storage,
            logging: raw.logging,
            retry: raw.retry,
        })
    }

    /// Look up a cluster by name
    pub fn cluster(&self, name: &str) -> Result<&ClusterConfig> {
        self.clusters
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| CoreError::ClusterNotFound {
                name: name.to_string(),
            })
    }

    /// Resolve a command's cluster selection (`--cluster` list or `--all-clusters`)
    pub fn select(&self, names: &[String], all: bool) -> Result<Vec<&ClusterConfig>> {
        if all {
            return Ok(self.clusters.iter().collect());
        }
        if names.is_empty() {
            return Err(CoreError::invalid(
                "Must specify at least one --cluster or use --all-clusters",
            ));
        }
        names.iter().map(|n| self.cluster(n)).collect()
    }

    pub fn cluster_paths(&self, name: &str) -> ClusterPaths {
        let base_dir = self.storage.base_dir.join(name);
        ClusterPaths {
            db_path: base_dir.join("data.db"),
            manifests_dir: base_dir.join("manifests"),
            reports_dir: base_dir.join("reports"),
            base_dir,
        }
    }
}

fn resolve_cluster(raw: RawCluster, system: &NamespaceFilter) -> Result<ClusterConfig> {
    let name = raw.name;

    let source = match (raw.kubeconfig, raw.credentials) {
        (Some(_), Some(_)) => {
            return Err(CoreError::invalid(format!(
                "Cluster {} cannot specify both kubeconfig and credentials",
                name
            )));
        }
        (None, None) => {
            return Err(CoreError::invalid(format!(
                "Cluster {} must specify either kubeconfig or credentials",
                name
            )));
        }
        (Some(path), None) => ClusterSource::Kubeconfig {
            path: expand_home(&path),
            context: raw.context,
        },
        (None, Some(creds)) => {
            if creds.host.trim().is_empty() {
                return Err(CoreError::invalid(format!(
                    "Cluster {} credentials must include host",
                    name
                )));
            }
            ClusterSource::Credentials(creds)
        }
    };

    let mut namespace_filter =
        NamespaceFilter::from_entries(raw.exclude_namespaces.iter().map(String::as_str))?;
    if raw.ignore_system_namespaces {
        namespace_filter.extend(system);
    }

    let mut include_namespaces: Vec<String> = Vec::new();
    for ns in raw.include_namespaces {
        if !include_namespaces.contains(&ns) {
            include_namespaces.push(ns);
        }
    }
    if raw.namespace_scoped && include_namespaces.is_empty() {
        return Err(CoreError::invalid(format!(
            "Cluster {}: namespace_scoped requires include_namespaces",
            name
        )));
    }

    let parallelism = raw.parallelism.unwrap_or(DEFAULT_PARALLELISM);
    if parallelism == 0 {
        return Err(CoreError::invalid(format!(
            "Cluster {}: parallelism must be at least 1",
            name
        )));
    }

    Ok(ClusterConfig {
        name,
        source,
        include_kinds: raw
            .include_kinds
            .unwrap_or_else(|| DEFAULT_INCLUDE_KINDS.iter().map(|k| k.to_string()).collect()),
        custom_kinds: raw.custom_kinds,
        namespace_filter,
        namespace_scoped: raw.namespace_scoped,
        include_namespaces,
        parallelism,
        page_size: raw.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
    })
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
