//! Sync engine: turns fetched items into store writes
//!
//! Works on one store connection. Per-kind syncs run inside the
//! orchestrator's tasks; `finalize` and `cleanup_kinds` run once per run
//! after every task has completed.

use chrono::{DateTime, Utc};
use gatherer_core::{KindBehavior, NodeCapacity, manifest_hash, normalize};
use gatherer_store::{SnapshotStore, UpsertStatus, WorkloadKey, WorkloadUpsert};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

use crate::error::Result;

/// Per-kind upsert counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Items without a name
    pub skipped: usize,
    pub nodes_removed: usize,
}

impl SyncStats {
    fn record(&mut self, status: UpsertStatus) {
        match status {
            UpsertStatus::Inserted => self.inserted += 1,
            UpsertStatus::Updated => self.updated += 1,
            UpsertStatus::Unchanged => self.unchanged += 1,
        }
    }
}

/// Alive keys and counters of one kind sync
#[derive(Debug, Clone, Default)]
pub struct KindSyncResult {
    pub alive: Vec<WorkloadKey>,
    pub stats: SyncStats,
}

/// Store writer for one cluster
pub struct SyncEngine<'a> {
    store: &'a mut SnapshotStore,
    cluster: &'a str,
    now: DateTime<Utc>,
}

impl<'a> SyncEngine<'a> {
    pub fn new(store: &'a mut SnapshotStore, cluster: &'a str) -> Self {
        Self {
            store,
            cluster,
            now: Utc::now(),
        }
    }

    /// Use a fixed clock for `first_seen`/`last_seen`
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Upsert every item of one kind; returns the identities observed.
    ///
    /// Items arrive already filtered and in listing order.
    pub fn sync_kind(
        &mut self,
        api_version: &str,
        kind: &str,
        behavior: KindBehavior,
        items: &[Value],
    ) -> Result<KindSyncResult> {
        let mut result = KindSyncResult::default();
        let mut alive_nodes: HashSet<String> = HashSet::new();

        for item in items {
            let metadata = item.get("metadata");
            let field = |key: &str| metadata.and_then(|m| m.get(key)).and_then(Value::as_str);
            let Some(name) = field("name") else {
                tracing::debug!(cluster = self.cluster, kind, "item without a name, skipping");
                result.stats.skipped += 1;
                continue;
            };
            let namespace = field("namespace").unwrap_or("");

            match behavior {
                KindBehavior::Workload => {}
                KindBehavior::NodeCapacity => {
                    let node = NodeCapacity::from_manifest(name, item);
                    self.store.upsert_node_capacity(self.cluster, &node, self.now)?;
                    alive_nodes.insert(name.to_string());
                }
            }

            let normalized = normalize(item);
            let hash = manifest_hash(&normalized);
            let outcome = self.store.upsert_workload(&WorkloadUpsert {
                cluster: self.cluster,
                api_version,
                kind,
                namespace,
                name,
                resource_version: field("resourceVersion"),
                uid: field("uid"),
                manifest: &normalized,
                manifest_hash: &hash,
                now: self.now,
            })?;
            result.stats.record(outcome.status);
            result.alive.push(WorkloadKey::new(kind, namespace, name));
        }

        if behavior == KindBehavior::NodeCapacity {
            if alive_nodes.is_empty() {
                tracing::warn!(
                    cluster = self.cluster,
                    "no nodes observed, keeping node capacity rows"
                );
            } else {
                result.stats.nodes_removed =
                    self.store.mark_nodes_deleted(self.cluster, &alive_nodes)?;
            }
        }

        tracing::debug!(
            cluster = self.cluster,
            kind,
            inserted = result.stats.inserted,
            updated = result.stats.updated,
            unchanged = result.stats.unchanged,
            "kind synced"
        );
        Ok(result)
    }

    /// Remove workloads of the scoped kinds that were not observed this run
    pub fn finalize(
        &mut self,
        alive: &HashSet<WorkloadKey>,
        kinds_scope: Option<&BTreeSet<String>>,
    ) -> Result<usize> {
        Ok(self.store.mark_deleted(self.cluster, alive, kinds_scope)?)
    }

    /// Purge every row of kinds no longer configured
    pub fn cleanup_kinds(&mut self, obsolete: &[String]) -> Result<usize> {
        let removed = self.store.cleanup_obsolete_kinds(self.cluster, obsolete)?;
        if removed > 0 {
            tracing::info!(
                cluster = self.cluster,
                kinds = ?obsolete,
                removed,
                "purged obsolete kinds"
            );
        }
        Ok(removed)
    }
}
