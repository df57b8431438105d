//! SQLite snapshot store
//!
//! Features:
//! - WAL mode plus a busy timeout so one connection per sync task can write
//!   concurrently
//! - Content-hash change detection for workload manifests
//! - Tombstone-by-absence, scoped to the kinds a run actually fetched

use chrono::{DateTime, Utc};
use gatherer_core::{NodeCapacity, canonical_json};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::records::{UpsertOutcome, UpsertStatus, WorkloadKey, WorkloadUpsert};

/// How long a writer waits for a competing connection's lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const SCHEMA: &str = r#"
-- Latest normalized manifest per workload identity
CREATE TABLE IF NOT EXISTS workload (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cluster TEXT NOT NULL,
    api_version TEXT NOT NULL,
    kind TEXT NOT NULL,
    namespace TEXT NOT NULL,
    name TEXT NOT NULL,
    resource_version TEXT,
    uid TEXT,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0,
    manifest_json TEXT NOT NULL,
    manifest_hash TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS workload_identity ON workload(cluster, kind, namespace, name);
CREATE INDEX IF NOT EXISTS workload_hash ON workload(manifest_hash);
CREATE INDEX IF NOT EXISTS workload_deleted ON workload(deleted);

-- Parsed node capacity
CREATE TABLE IF NOT EXISTS node_capacity (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cluster TEXT NOT NULL,
    node_name TEXT NOT NULL,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0,
    cpu_capacity TEXT,
    memory_capacity TEXT,
    storage_capacity TEXT,
    pods_capacity TEXT,
    cpu_allocatable TEXT,
    memory_allocatable TEXT,
    storage_allocatable TEXT,
    pods_allocatable TEXT,
    node_role TEXT,
    instance_type TEXT,
    zone TEXT,
    os_image TEXT,
    kernel_version TEXT,
    container_runtime TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS node_capacity_identity ON node_capacity(cluster, node_name);
CREATE INDEX IF NOT EXISTS node_capacity_deleted ON node_capacity(deleted);

-- Engine bookkeeping
CREATE TABLE IF NOT EXISTS cluster_meta (
    cluster TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT,
    PRIMARY KEY (cluster, key)
);
"#;

/// Persistent snapshot of one or more clusters
///
/// Each instance owns one connection. Concurrent writers open their own
/// store on the same path; the connection closes when the store is dropped.
pub struct SnapshotStore {
    pub(crate) conn: Connection,
    path: Option<PathBuf>,
}

impl SnapshotStore {
    /// Open or create a store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let mut store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.init()?;
        Ok(store)
    }

    /// Open a store that must already exist
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StoreError::NotInitialized {
                path: path.display().to_string(),
            });
        }
        Self::open(path)
    }

    /// Open in-memory store (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn, path: None };
        store.init()?;
        Ok(store)
    }

    /// Database file backing this store, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init(&mut self) -> Result<()> {
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        if self.path.is_some() {
            self.conn.pragma_update(None, "journal_mode", "WAL")?;
            self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        }
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ========== Workloads ==========

    fn lookup_workload(&self, w: &WorkloadUpsert<'_>) -> Result<Option<(String, bool)>> {
        let row = self
            .conn
            .query_row(
                "SELECT manifest_hash, deleted FROM workload
                 WHERE cluster = ?1 AND kind = ?2 AND namespace = ?3 AND name = ?4",
                params![w.cluster, w.kind, w.namespace, w.name],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0)),
            )
            .optional()?;
        Ok(row)
    }

    /// Insert or refresh one workload and classify the change.
    ///
    /// A unique-constraint violation on insert means another connection
    /// inserted the same identity first; the row is re-read and handled as
    /// an update instead of failing.
    pub fn upsert_workload(&mut self, w: &WorkloadUpsert<'_>) -> Result<UpsertOutcome> {
        let now = w.now.to_rfc3339();
        let manifest_json = canonical_json(w.manifest);

        let existing = match self.lookup_workload(w)? {
            Some(row) => row,
            None => {
                let inserted = self.conn.execute(
                    "INSERT INTO workload (cluster, api_version, kind, namespace, name,
                        resource_version, uid, first_seen, last_seen, deleted,
                        manifest_json, manifest_hash)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, 0, ?9, ?10)",
                    params![
                        w.cluster,
                        w.api_version,
                        w.kind,
                        w.namespace,
                        w.name,
                        w.resource_version,
                        w.uid,
                        now,
                        manifest_json,
                        w.manifest_hash,
                    ],
                );
                match inserted {
                    Ok(_) => {
                        return Ok(UpsertOutcome {
                            status: UpsertStatus::Inserted,
                            changed: true,
                        });
                    }
                    Err(e) if is_unique_violation(&e) => {
                        tracing::debug!(
                            cluster = w.cluster,
                            kind = w.kind,
                            namespace = w.namespace,
                            name = w.name,
                            "concurrent insert won, falling back to update"
                        );
                        match self.lookup_workload(w)? {
                            Some(row) => row,
                            None => return Err(e.into()),
                        }
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let (stored_hash, was_deleted) = existing;

        if stored_hash == w.manifest_hash {
            self.conn.execute(
                "UPDATE workload SET last_seen = ?1, deleted = 0
                 WHERE cluster = ?2 AND kind = ?3 AND namespace = ?4 AND name = ?5",
                params![now, w.cluster, w.kind, w.namespace, w.name],
            )?;
            return Ok(UpsertOutcome {
                status: UpsertStatus::Unchanged,
                changed: was_deleted,
            });
        }

        self.conn.execute(
            "UPDATE workload SET api_version = ?1, resource_version = ?2, uid = ?3,
                last_seen = ?4, manifest_json = ?5, manifest_hash = ?6, deleted = 0
             WHERE cluster = ?7 AND kind = ?8 AND namespace = ?9 AND name = ?10",
            params![
                w.api_version,
                w.resource_version,
                w.uid,
                now,
                manifest_json,
                w.manifest_hash,
                w.cluster,
                w.kind,
                w.namespace,
                w.name,
            ],
        )?;
        Ok(UpsertOutcome {
            status: UpsertStatus::Updated,
            changed: true,
        })
    }

    /// Hard-delete every workload of the cluster not in `alive`.
    ///
    /// With `kinds_scope`, only rows of those kinds are candidates; an empty
    /// scope deletes nothing. Without it, every kind of the cluster is.
    pub fn mark_deleted(
        &mut self,
        cluster: &str,
        alive: &HashSet<WorkloadKey>,
        kinds_scope: Option<&BTreeSet<String>>,
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;

        let existing: Vec<WorkloadKey> = {
            let mut keys = Vec::new();
            match kinds_scope {
                Some(scope) => {
                    let mut stmt = tx.prepare(
                        "SELECT kind, namespace, name FROM workload WHERE cluster = ?1 AND kind = ?2",
                    )?;
                    for kind in scope {
                        let rows = stmt.query_map(params![cluster, kind], row_to_key)?;
                        for key in rows {
                            keys.push(key?);
                        }
                    }
                }
                None => {
                    let mut stmt = tx
                        .prepare("SELECT kind, namespace, name FROM workload WHERE cluster = ?1")?;
                    let rows = stmt.query_map(params![cluster], row_to_key)?;
                    for key in rows {
                        keys.push(key?);
                    }
                }
            }
            keys
        };

        let mut removed = 0;
        {
            let mut delete = tx.prepare(
                "DELETE FROM workload
                 WHERE cluster = ?1 AND kind = ?2 AND namespace = ?3 AND name = ?4",
            )?;
            for key in existing.iter().filter(|k| !alive.contains(*k)) {
                removed += delete.execute(params![cluster, key.kind, key.namespace, key.name])?;
            }
        }

        tx.commit()?;
        Ok(removed)
    }

    /// Delete all rows of the given kinds for a cluster, regardless of liveness
    pub fn cleanup_obsolete_kinds(&mut self, cluster: &str, kinds: &[String]) -> Result<usize> {
        if kinds.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut removed = 0;
        {
            let mut delete = tx.prepare("DELETE FROM workload WHERE cluster = ?1 AND kind = ?2")?;
            for kind in kinds {
                removed += delete.execute(params![cluster, kind])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Distinct kinds currently stored for a cluster
    pub fn kinds_present(&self, cluster: &str) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT kind FROM workload WHERE cluster = ?1")?;
        let kinds = stmt
            .query_map([cluster], |row| row.get(0))?
            .collect::<std::result::Result<BTreeSet<String>, _>>()?;
        Ok(kinds)
    }

    // ========== Node capacity ==========

    /// Insert or refresh a node's capacity row
    pub fn upsert_node_capacity(
        &mut self,
        cluster: &str,
        node: &NodeCapacity,
        now: DateTime<Utc>,
    ) -> Result<UpsertStatus> {
        let now = now.to_rfc3339();
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM node_capacity WHERE cluster = ?1 AND node_name = ?2",
                params![cluster, node.node_name],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        self.conn.execute(
            r#"
            INSERT INTO node_capacity (
                cluster, node_name, first_seen, last_seen, deleted,
                cpu_capacity, memory_capacity, storage_capacity, pods_capacity,
                cpu_allocatable, memory_allocatable, storage_allocatable, pods_allocatable,
                node_role, instance_type, zone, os_image, kernel_version, container_runtime
            )
            VALUES (?1, ?2, ?3, ?3, 0, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ON CONFLICT(cluster, node_name) DO UPDATE SET
                last_seen = excluded.last_seen,
                deleted = 0,
                cpu_capacity = excluded.cpu_capacity,
                memory_capacity = excluded.memory_capacity,
                storage_capacity = excluded.storage_capacity,
                pods_capacity = excluded.pods_capacity,
                cpu_allocatable = excluded.cpu_allocatable,
                memory_allocatable = excluded.memory_allocatable,
                storage_allocatable = excluded.storage_allocatable,
                pods_allocatable = excluded.pods_allocatable,
                node_role = excluded.node_role,
                instance_type = excluded.instance_type,
                zone = excluded.zone,
                os_image = excluded.os_image,
                kernel_version = excluded.kernel_version,
                container_runtime = excluded.container_runtime
            "#,
            params![
                cluster,
                node.node_name,
                now,
                node.capacity.cpu,
                node.capacity.memory,
                node.capacity.storage,
                node.capacity.pods,
                node.allocatable.cpu,
                node.allocatable.memory,
                node.allocatable.storage,
                node.allocatable.pods,
                node.role.as_str(),
                node.instance_type,
                node.zone,
                node.os_image,
                node.kernel_version,
                node.container_runtime,
            ],
        )?;

        Ok(if exists {
            UpsertStatus::Updated
        } else {
            UpsertStatus::Inserted
        })
    }

    /// Hard-delete capacity rows of nodes not in `alive`
    pub fn mark_nodes_deleted(&mut self, cluster: &str, alive: &HashSet<String>) -> Result<usize> {
        let tx = self.conn.transaction()?;

        let existing: Vec<String> = {
            let mut stmt = tx.prepare("SELECT node_name FROM node_capacity WHERE cluster = ?1")?;
            stmt.query_map([cluster], |row| row.get(0))?
                .collect::<std::result::Result<_, _>>()?
        };

        let mut removed = 0;
        {
            let mut delete =
                tx.prepare("DELETE FROM node_capacity WHERE cluster = ?1 AND node_name = ?2")?;
            for name in existing.iter().filter(|n| !alive.contains(*n)) {
                removed += delete.execute(params![cluster, name])?;
            }
        }

        tx.commit()?;
        Ok(removed)
    }

    // ========== Cluster metadata ==========

    pub fn set_meta(&mut self, cluster: &str, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO cluster_meta (cluster, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(cluster, key) DO UPDATE SET value = excluded.value",
            params![cluster, key, value],
        )?;
        Ok(())
    }

    pub fn get_meta(&self, cluster: &str, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM cluster_meta WHERE cluster = ?1 AND key = ?2",
                params![cluster, key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }
}

fn row_to_key(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkloadKey> {
    Ok(WorkloadKey {
        kind: row.get(0)?,
        namespace: row.get(1)?,
        name: row.get(2)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
