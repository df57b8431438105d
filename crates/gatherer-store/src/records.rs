//! Row types returned by the snapshot store

use chrono::{DateTime, Utc};
use gatherer_core::NodeCapacity;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a workload within one cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorkloadKey {
    pub kind: String,
    /// Empty for cluster-scoped kinds
    pub namespace: String,
    pub name: String,
}

impl WorkloadKey {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.kind, self.name)
        } else {
            write!(f, "{}/{}/{}", self.namespace, self.kind, self.name)
        }
    }
}

/// Input of a workload upsert
#[derive(Debug, Clone)]
pub struct WorkloadUpsert<'a> {
    pub cluster: &'a str,
    pub api_version: &'a str,
    pub kind: &'a str,
    pub namespace: &'a str,
    pub name: &'a str,
    pub resource_version: Option<&'a str>,
    pub uid: Option<&'a str>,
    /// Normalized manifest
    pub manifest: &'a Value,
    pub manifest_hash: &'a str,
    pub now: DateTime<Utc>,
}

/// Change classification of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertStatus {
    Inserted,
    Updated,
    Unchanged,
}

/// Result of a workload upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub status: UpsertStatus,
    /// True when stored content changed or a soft-deleted row came back
    pub changed: bool,
}

/// Stored workload snapshot
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadRecord {
    pub cluster: String,
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub resource_version: Option<String>,
    pub uid: Option<String>,
    pub manifest: Value,
    pub manifest_hash: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub deleted: bool,
}

/// Stored node capacity row
#[derive(Debug, Clone, Serialize)]
pub struct NodeRecord {
    pub cluster: String,
    #[serde(flatten)]
    pub node: NodeCapacity,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Aggregate over active nodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub total_nodes: usize,
    pub total_cpu_millicores: i64,
    pub total_memory_mi: i64,
    pub by_role: BTreeMap<String, usize>,
}

/// Read-only view of a cluster's snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub total: usize,
    pub active: usize,
    pub by_kind: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<NodeSummary>,
}
