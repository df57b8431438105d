//! Fetch orchestration
//!
//! One task per kind (or per kind and namespace in namespace-scoped mode),
//! run through a bounded worker pool. Each task lists its collection, then
//! syncs the items on its own store connection. Listing failures are
//! collected per task; store failures abort the run. A kind the API refuses
//! (403/404) counts as listed with zero items.
//!
//! After every task has completed:
//! 1. workloads of fully synced kinds that were not observed are removed
//! 2. kinds no longer configured are purged
//! 3. `last_sync` is recorded and a summary is produced

use chrono::Utc;
use futures::stream::{self, StreamExt};
use gatherer_core::{
    ARCHIVE_FILE_NAME, AppConfig, ClusterConfig, ClusterPaths, KindSpec, ManifestExporter,
    ManifestSink, NamespaceFilter, StorageConfig, resolve_kinds,
};
use gatherer_store::{META_LAST_SYNC, SnapshotStore, StoreSummary, WorkloadKey};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use tracing::Instrument;

use crate::client;
use crate::error::{KubeError, Result};
use crate::listing::{KubeTransport, ListTransport, Lister, RetryPolicy};
use crate::sync::{KindSyncResult, SyncEngine};

/// One listing + sync unit of work
#[derive(Debug, Clone)]
pub struct SyncTask {
    pub kind: String,
    pub namespace: Option<String>,
    pub spec: KindSpec,
}

impl SyncTask {
    /// Key used for errors: `kind` or `kind/namespace`
    pub fn label(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", self.kind, ns),
            None => self.kind.clone(),
        }
    }
}

/// Resolved work for one cluster
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub cluster: String,
    pub tasks: Vec<SyncTask>,
    /// Kinds selected for this run
    pub kinds: BTreeMap<String, KindSpec>,
    /// Kinds the cluster is configured for; anything else in the store is obsolete
    pub configured_kinds: BTreeSet<String>,
    pub parallelism: usize,
    namespace_filter: NamespaceFilter,
    namespace_scoped: bool,
}

impl SyncPlan {
    /// Build the plan for `cluster`, optionally limited to `only_kinds`
    pub fn from_cluster(cluster: &ClusterConfig, only_kinds: Option<&[String]>) -> Result<Self> {
        let requested = only_kinds.unwrap_or(&cluster.include_kinds);
        let kinds = resolve_kinds(requested, &cluster.custom_kinds);
        if kinds.is_empty() {
            return Err(KubeError::NoResolvableKinds {
                cluster: cluster.name.clone(),
            });
        }

        let mut tasks = Vec::new();
        for (kind, spec) in &kinds {
            if !cluster.namespace_scoped {
                tasks.push(SyncTask {
                    kind: kind.clone(),
                    namespace: None,
                    spec: spec.clone(),
                });
                continue;
            }
            if !spec.namespaced {
                tracing::debug!(
                    cluster = %cluster.name,
                    kind = %kind,
                    "cluster-scoped kind skipped in namespace-scoped mode"
                );
                continue;
            }
            for ns in &cluster.include_namespaces {
                tasks.push(SyncTask {
                    kind: kind.clone(),
                    namespace: Some(ns.clone()),
                    spec: spec.clone(),
                });
            }
        }

        Ok(Self {
            cluster: cluster.name.clone(),
            tasks,
            kinds,
            configured_kinds: cluster.include_kinds.iter().cloned().collect(),
            parallelism: cluster.parallelism.max(1),
            namespace_filter: cluster.namespace_filter.clone(),
            namespace_scoped: cluster.namespace_scoped,
        })
    }

    /// Worker pool size: never more workers than tasks
    pub fn workers(&self) -> usize {
        self.parallelism.min(self.tasks.len()).max(1)
    }

    fn drops_item(&self, spec: &KindSpec, item: &Value) -> bool {
        if self.namespace_scoped || !spec.namespaced {
            return false;
        }
        let namespace = item
            .get("metadata")
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str)
            .unwrap_or("default");
        self.namespace_filter.is_excluded(namespace)
    }
}

/// Result of one sync run
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub cluster: String,
    #[serde(flatten)]
    pub store: StoreSummary,
    /// Workloads removed because they were no longer observed
    pub removed: usize,
    /// Rows purged because their kind is no longer configured
    pub obsolete_removed: usize,
    pub skipped_kinds: Vec<String>,
    pub fetched_per_kind: BTreeMap<String, usize>,
    pub errors: BTreeMap<String, String>,
    pub exported: usize,
}

enum TaskOutcome {
    Synced {
        items: Vec<Value>,
        result: KindSyncResult,
    },
    Unavailable,
    Failed(String),
}

struct TaskReport {
    task: SyncTask,
    outcome: TaskOutcome,
}

#[derive(Default)]
struct KindTally {
    fetched: usize,
    complete: bool,
    unavailable: bool,
    failed: bool,
}

/// Runs a sync plan against one cluster's store
pub struct FetchOrchestrator<T> {
    lister: Lister<T>,
    db_path: PathBuf,
    sink: Box<dyn ManifestSink>,
}

impl<T: ListTransport + 'static> FetchOrchestrator<T> {
    pub fn new(
        lister: Lister<T>,
        db_path: impl Into<PathBuf>,
        sink: Box<dyn ManifestSink>,
    ) -> Self {
        Self {
            lister,
            db_path: db_path.into(),
            sink,
        }
    }

    /// Execute `plan`: fan out the tasks, then finalize the snapshot
    pub async fn run(&mut self, plan: &SyncPlan) -> Result<SyncSummary> {
        let workers = plan.workers();
        tracing::info!(
            cluster = %plan.cluster,
            tasks = plan.tasks.len(),
            workers,
            "starting sync"
        );

        let mut tallies: BTreeMap<String, KindTally> = plan
            .tasks
            .iter()
            .map(|t| {
                (
                    t.kind.clone(),
                    KindTally {
                        complete: true,
                        ..Default::default()
                    },
                )
            })
            .collect();
        let mut alive: HashSet<WorkloadKey> = HashSet::new();
        let mut errors = BTreeMap::new();
        let mut exported = 0;

        let lister = self.lister.clone();
        let db_path = self.db_path.clone();
        let mut reports = stream::iter(plan.tasks.iter().cloned())
            .map(|task| {
                let span = tracing::info_span!(
                    "sync_task",
                    cluster = %plan.cluster,
                    kind = %task.kind,
                    namespace = task.namespace.as_deref().unwrap_or("")
                );
                run_task(lister.clone(), db_path.clone(), plan, task).instrument(span)
            })
            .buffer_unordered(workers);

        while let Some(report) = reports.next().await {
            let TaskReport { task, outcome } = report?;
            let tally = tallies.entry(task.kind.clone()).or_default();

            match outcome {
                TaskOutcome::Synced { items, result } => {
                    tally.fetched += items.len();
                    alive.extend(result.alive);
                    match self.sink.export_kind(&task.kind, &items, task.spec.namespaced) {
                        Ok(count) => exported += count,
                        Err(e) => {
                            tracing::warn!(kind = %task.kind, error = %e, "manifest export failed")
                        }
                    }
                }
                TaskOutcome::Unavailable => {
                    tally.unavailable = true;
                }
                TaskOutcome::Failed(message) => {
                    tally.complete = false;
                    tally.failed = true;
                    errors.insert(task.label(), message);
                }
            }
        }
        drop(reports);
        if let Err(e) = self.sink.finish() {
            tracing::warn!(cluster = %plan.cluster, error = %e, "manifest export finish failed");
        }

        let mut fetched_per_kind = BTreeMap::new();
        let mut skipped_kinds = Vec::new();
        let mut kinds_scope = BTreeSet::new();
        for (kind, tally) in &tallies {
            fetched_per_kind.insert(kind.clone(), tally.fetched);
            if tally.complete {
                kinds_scope.insert(kind.clone());
            }
            let never_synced = tally.fetched == 0 && !self.sink.has_existing(kind);
            if !tally.complete || tally.unavailable || never_synced {
                skipped_kinds.push(kind.clone());
            }
            if tally.failed {
                tracing::warn!(
                    cluster = %plan.cluster,
                    kind = %kind,
                    "kind failed, keeping its previous snapshot"
                );
            }
        }

        let cluster = plan.cluster.clone();
        let configured = plan.configured_kinds.clone();
        let db_path = self.db_path.clone();
        let (removed, obsolete_removed, store) =
            tokio::task::spawn_blocking(move || -> Result<(usize, usize, StoreSummary)> {
                let mut store = SnapshotStore::open(&db_path)?;

                let mut engine = SyncEngine::new(&mut store, &cluster);
                let removed = engine.finalize(&alive, Some(&kinds_scope))?;
                drop(engine);

                let obsolete: Vec<String> = store
                    .kinds_present(&cluster)?
                    .difference(&configured)
                    .cloned()
                    .collect();
                let obsolete_removed =
                    SyncEngine::new(&mut store, &cluster).cleanup_kinds(&obsolete)?;

                store.set_meta(&cluster, META_LAST_SYNC, &Utc::now().to_rfc3339())?;
                let summary = store.summary(&cluster)?;
                Ok((removed, obsolete_removed, summary))
            })
            .await??;

        tracing::info!(
            cluster = %plan.cluster,
            active = store.active,
            removed,
            obsolete_removed,
            errors = errors.len(),
            skipped = skipped_kinds.len(),
            "sync finished"
        );

        Ok(SyncSummary {
            cluster: plan.cluster.clone(),
            store,
            removed,
            obsolete_removed,
            skipped_kinds,
            fetched_per_kind,
            errors,
            exported,
        })
    }
}

async fn run_task<T: ListTransport + 'static>(
    lister: Lister<T>,
    db_path: PathBuf,
    plan: &SyncPlan,
    task: SyncTask,
) -> Result<TaskReport> {
    let mut listing = lister.list(&task.spec, task.namespace.as_deref());
    let mut items = Vec::new();
    let mut dropped = 0usize;

    while let Some(next) = listing.next().await {
        match next {
            Ok(item) if plan.drops_item(&task.spec, &item) => dropped += 1,
            Ok(item) => items.push(item),
            Err(e) if e.is_unavailable() => {
                return Ok(TaskReport {
                    task,
                    outcome: TaskOutcome::Unavailable,
                });
            }
            Err(e) => {
                return Ok(TaskReport {
                    task,
                    outcome: TaskOutcome::Failed(e.to_string()),
                });
            }
        }
    }
    tracing::debug!(fetched = items.len(), dropped, "listing complete");

    let cluster = plan.cluster.clone();
    let spec = task.spec.clone();
    let kind = task.kind.clone();
    let (items, result) = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut store = SnapshotStore::open(&db_path)?;
        let result = SyncEngine::new(&mut store, &cluster).sync_kind(
            &spec.api_version,
            &kind,
            spec.behavior,
            &items,
        )?;
        Ok((items, result))
    })
    .await??;

    Ok(TaskReport {
        task,
        outcome: TaskOutcome::Synced { items, result },
    })
}

/// Exporter matching the storage settings
pub fn exporter_for(storage: &StorageConfig, paths: &ClusterPaths) -> ManifestExporter {
    if !storage.write_manifest_files {
        return ManifestExporter::disabled(&paths.manifests_dir);
    }
    let exporter = ManifestExporter::new(&paths.manifests_dir, storage.manifest_format);
    if storage.archive {
        exporter.with_archive(paths.base_dir.join(ARCHIVE_FILE_NAME))
    } else {
        exporter
    }
}

/// Connect to `cluster` and run a full sync against its store
pub async fn sync_cluster(
    config: &AppConfig,
    cluster: &ClusterConfig,
    only_kinds: Option<&[String]>,
) -> Result<SyncSummary> {
    let plan = SyncPlan::from_cluster(cluster, only_kinds)?;
    let paths = config.cluster_paths(&cluster.name);
    SnapshotStore::open_existing(&paths.db_path)?;

    let client = client::connect(cluster).await?;
    let lister = Lister::new(
        KubeTransport::new(client),
        RetryPolicy::from(&config.retry),
        cluster.page_size,
    );
    let sink = Box::new(exporter_for(&config.storage, &paths));

    FetchOrchestrator::new(lister, &paths.db_path, sink)
        .run(&plan)
        .await
}
