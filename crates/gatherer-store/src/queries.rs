//! Read-side queries over the snapshot

use chrono::{DateTime, Utc};
use gatherer_core::quantity::{cpu_millicores, memory_mib};
use gatherer_core::{NodeCapacity, NodeRole, ResourceQuantities};
use rusqlite::{OptionalExtension, Row, params};
use serde_json::Value;

use crate::db::SnapshotStore;
use crate::error::{Result, StoreError};
use crate::records::{NodeRecord, NodeSummary, StoreSummary, WorkloadKey, WorkloadRecord};

const WORKLOAD_COLUMNS: &str = "cluster, api_version, kind, namespace, name, resource_version, \
     uid, manifest_json, manifest_hash, first_seen, last_seen, deleted";

const NODE_COLUMNS: &str = "cluster, node_name, first_seen, last_seen, \
     cpu_capacity, memory_capacity, storage_capacity, pods_capacity, \
     cpu_allocatable, memory_allocatable, storage_allocatable, pods_allocatable, \
     node_role, instance_type, zone, os_image, kernel_version, container_runtime";

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidTimestamp {
            column: column.to_string(),
            value,
        })
}

/// Raw workload row, timestamps still textual
struct WorkloadRow {
    cluster: String,
    api_version: String,
    kind: String,
    namespace: String,
    name: String,
    resource_version: Option<String>,
    uid: Option<String>,
    manifest_json: String,
    manifest_hash: String,
    first_seen: String,
    last_seen: String,
    deleted: bool,
}

impl WorkloadRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            cluster: row.get(0)?,
            api_version: row.get(1)?,
            kind: row.get(2)?,
            namespace: row.get(3)?,
            name: row.get(4)?,
            resource_version: row.get(5)?,
            uid: row.get(6)?,
            manifest_json: row.get(7)?,
            manifest_hash: row.get(8)?,
            first_seen: row.get(9)?,
            last_seen: row.get(10)?,
            deleted: row.get::<_, i64>(11)? != 0,
        })
    }

    fn into_record(self) -> Result<WorkloadRecord> {
        let manifest = decode_manifest(&self.manifest_json);

        Ok(WorkloadRecord {
            first_seen: parse_timestamp("first_seen", self.first_seen)?,
            last_seen: parse_timestamp("last_seen", self.last_seen)?,
            cluster: self.cluster,
            api_version: self.api_version,
            kind: self.kind,
            namespace: self.namespace,
            name: self.name,
            resource_version: self.resource_version,
            uid: self.uid,
            manifest,
            manifest_hash: self.manifest_hash,
            deleted: self.deleted,
        })
    }
}

struct NodeRow {
    cluster: String,
    first_seen: String,
    last_seen: String,
    node: NodeCapacity,
}

impl NodeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let role: Option<String> = row.get(12)?;
        Ok(Self {
            cluster: row.get(0)?,
            first_seen: row.get(2)?,
            last_seen: row.get(3)?,
            node: NodeCapacity {
                node_name: row.get(1)?,
                role: role
                    .as_deref()
                    .and_then(NodeRole::parse)
                    .unwrap_or(NodeRole::Worker),
                capacity: ResourceQuantities {
                    cpu: row.get(4)?,
                    memory: row.get(5)?,
                    storage: row.get(6)?,
                    pods: row.get(7)?,
                },
                allocatable: ResourceQuantities {
                    cpu: row.get(8)?,
                    memory: row.get(9)?,
                    storage: row.get(10)?,
                    pods: row.get(11)?,
                },
                instance_type: row.get(13)?,
                zone: row.get(14)?,
                os_image: row.get(15)?,
                kernel_version: row.get(16)?,
                container_runtime: row.get(17)?,
            },
        })
    }

    fn into_record(self) -> Result<NodeRecord> {
        Ok(NodeRecord {
            cluster: self.cluster,
            node: self.node,
            first_seen: parse_timestamp("first_seen", self.first_seen)?,
            last_seen: parse_timestamp("last_seen", self.last_seen)?,
        })
    }
}

impl SnapshotStore {
    /// Look up one workload by identity
    pub fn get_workload(&self, cluster: &str, key: &WorkloadKey) -> Result<Option<WorkloadRecord>> {
        let sql = format!(
            "SELECT {WORKLOAD_COLUMNS} FROM workload
             WHERE cluster = ?1 AND kind = ?2 AND namespace = ?3 AND name = ?4"
        );
        let row = self
            .conn
            .query_row(
                &sql,
                params![cluster, key.kind, key.namespace, key.name],
                WorkloadRow::from_row,
            )
            .optional()?;
        row.map(WorkloadRow::into_record).transpose()
    }

    /// Active workloads of a cluster, optionally restricted to some kinds
    pub fn list_workloads(
        &self,
        cluster: &str,
        kinds: Option<&[String]>,
    ) -> Result<Vec<WorkloadRecord>> {
        let sql = format!(
            "SELECT {WORKLOAD_COLUMNS} FROM workload
             WHERE cluster = ?1 AND deleted = 0
             ORDER BY kind, namespace, name"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([cluster], WorkloadRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .filter(|r| kinds.is_none_or(|k| k.contains(&r.kind)))
            .map(WorkloadRow::into_record)
            .collect()
    }

    /// Active nodes, masters first, then by name
    pub fn list_active_nodes(&self, cluster: &str) -> Result<Vec<NodeRecord>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM node_capacity
             WHERE cluster = ?1 AND deleted = 0
             ORDER BY CASE node_role WHEN 'master' THEN 0 WHEN 'infra' THEN 1 ELSE 2 END,
                 node_name"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([cluster], NodeRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(NodeRow::into_record).collect()
    }

    /// Counts of stored workloads, per kind, plus node totals when any node is stored
    pub fn summary(&self, cluster: &str) -> Result<StoreSummary> {
        let mut summary = StoreSummary::default();

        let mut stmt = self.conn.prepare(
            "SELECT kind, deleted, COUNT(*) FROM workload WHERE cluster = ?1 GROUP BY kind, deleted",
        )?;
        let rows = stmt.query_map([cluster], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)? != 0,
                row.get::<_, i64>(2)? as usize,
            ))
        })?;
        for row in rows {
            let (kind, deleted, count) = row?;
            summary.total += count;
            if !deleted {
                summary.active += count;
                *summary.by_kind.entry(kind).or_insert(0) += count;
            }
        }

        let nodes = self.list_active_nodes(cluster)?;
        if !nodes.is_empty() {
            summary.nodes = Some(summarize_nodes(&nodes));
        }

        Ok(summary)
    }
}

fn summarize_nodes(nodes: &[NodeRecord]) -> NodeSummary {
    let mut out = NodeSummary {
        total_nodes: nodes.len(),
        ..Default::default()
    };
    for record in nodes {
        let capacity = &record.node.capacity;
        out.total_cpu_millicores += capacity.cpu.as_deref().and_then(cpu_millicores).unwrap_or(0);
        out.total_memory_mi += capacity.memory.as_deref().and_then(memory_mib).unwrap_or(0);
        *out.by_role
            .entry(record.node.role.as_str().to_string())
            .or_insert(0) += 1;
    }
    out
}

/// Parse stored JSON, keeping unparseable text visible
pub fn decode_manifest(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "_raw": text }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::WorkloadUpsert;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashSet;

    fn node(name: &str, labels: Value, cpu: &str, memory: &str) -> NodeCapacity {
        NodeCapacity::from_manifest(
            name,
            &json!({
                "metadata": {"name": name, "labels": labels},
                "status": {
                    "capacity": {"cpu": cpu, "memory": memory, "pods": "110"},
                    "allocatable": {"cpu": cpu, "memory": memory},
                    "nodeInfo": {"osImage": "RHCOS"}
                }
            }),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_summary_counts_by_kind() {
        let mut store = SnapshotStore::open_memory().unwrap();
        let m = json!({});
        for (kind, name) in [("Deployment", "a"), ("Deployment", "b"), ("CronJob", "c")] {
            store
                .upsert_workload(&WorkloadUpsert {
                    cluster: "c1",
                    api_version: "apps/v1",
                    kind,
                    namespace: "ns",
                    name,
                    resource_version: None,
                    uid: None,
                    manifest: &m,
                    manifest_hash: "h",
                    now: now(),
                })
                .unwrap();
        }

        let summary = store.summary("c1").unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.active, 3);
        assert_eq!(summary.by_kind["Deployment"], 2);
        assert_eq!(summary.by_kind["CronJob"], 1);
        assert!(summary.nodes.is_none());

        let only_cron = store
            .list_workloads("c1", Some(&["CronJob".to_string()]))
            .unwrap();
        assert_eq!(only_cron.len(), 1);
        assert_eq!(only_cron[0].name, "c");
        assert_eq!(store.list_workloads("c1", None).unwrap().len(), 3);
    }

    #[test]
    fn test_node_upsert_and_summary() {
        let mut store = SnapshotStore::open_memory().unwrap();
        let master = node(
            "m0",
            json!({"node-role.kubernetes.io/master": ""}),
            "4",
            "16Gi",
        );
        let worker = node("w0", json!({}), "8000m", "32Gi");

        use crate::records::UpsertStatus;
        assert_eq!(
            store.upsert_node_capacity("c1", &master, now()).unwrap(),
            UpsertStatus::Inserted
        );
        store.upsert_node_capacity("c1", &worker, now()).unwrap();
        assert_eq!(
            store.upsert_node_capacity("c1", &worker, now()).unwrap(),
            UpsertStatus::Updated
        );

        let nodes = store.list_active_nodes("c1").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].node.node_name, "m0");
        assert_eq!(nodes[0].node.role, NodeRole::Master);
        assert_eq!(nodes[0].node.os_image.as_deref(), Some("RHCOS"));

        let summary = store.summary("c1").unwrap().nodes.unwrap();
        assert_eq!(summary.total_nodes, 2);
        assert_eq!(summary.total_cpu_millicores, 12000);
        assert_eq!(summary.total_memory_mi, 48 * 1024);
        assert_eq!(summary.by_role["master"], 1);
        assert_eq!(summary.by_role["worker"], 1);
    }

    #[test]
    fn test_mark_nodes_deleted() {
        let mut store = SnapshotStore::open_memory().unwrap();
        store.upsert_node_capacity("c1", &node("a", json!({}), "1", "1Gi"), now()).unwrap();
        store.upsert_node_capacity("c1", &node("b", json!({}), "1", "1Gi"), now()).unwrap();

        let alive: HashSet<String> = ["a".to_string()].into();
        assert_eq!(store.mark_nodes_deleted("c1", &alive).unwrap(), 1);

        let names: Vec<_> = store
            .list_active_nodes("c1")
            .unwrap()
            .into_iter()
            .map(|n| n.node.node_name)
            .collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_decode_manifest_keeps_raw() {
        assert_eq!(decode_manifest(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(decode_manifest("not json"), json!({"_raw": "not json"}));
    }
}
