//! End-to-end sync runs against a scripted transport and an on-disk store

use gatherer_core::{
    AppConfig, ClusterConfig, CoreError, ExportFormat, KindBehavior, ManifestExporter,
    ManifestSink,
};
use gatherer_kube::{FetchOrchestrator, Lister, MockTransport, RetryPolicy, SyncEngine, SyncPlan};
use gatherer_store::{META_LAST_SYNC, SnapshotStore, WorkloadKey};
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;

fn cluster(yaml_tail: &str) -> ClusterConfig {
    let yaml = format!(
        r#"
clusters:
  - name: c1
    kubeconfig: /tmp/kubeconfig
    exclude_namespaces: [scratch]
{yaml_tail}
"#
    );
    AppConfig::from_yaml(&yaml).unwrap().clusters.remove(0)
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 1,
        backoff_base: Duration::ZERO,
    }
}

fn workload(name: &str, namespace: &str) -> Value {
    json!({
        "metadata": {"name": name, "namespace": namespace, "resourceVersion": "7"},
        "spec": {"replicas": 1},
        "status": {"replicas": 1}
    })
}

fn node(name: &str) -> Value {
    json!({
        "metadata": {"name": name, "labels": {"node-role.kubernetes.io/worker": ""}},
        "status": {"capacity": {"cpu": "2", "memory": "4Gi"}}
    })
}

fn seed(db_path: &Path, kind: &str, namespace: &str, name: &str) {
    let mut store = SnapshotStore::open(db_path).unwrap();
    SyncEngine::new(&mut store, "c1")
        .sync_kind("apps/v1", kind, KindBehavior::Workload, &[workload(name, namespace)])
        .unwrap();
}

fn exists(store: &SnapshotStore, kind: &str, namespace: &str, name: &str) -> bool {
    store
        .get_workload("c1", &WorkloadKey::new(kind, namespace, name))
        .unwrap()
        .is_some()
}

#[tokio::test]
async fn test_full_run_classifies_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("c1").join("data.db");
    let manifests = dir.path().join("c1").join("manifests");

    seed(&db_path, "Deployment", "ns", "gone");
    seed(&db_path, "StatefulSet", "ns", "old-db");
    seed(&db_path, "DaemonSet", "ns", "old-ds");
    seed(&db_path, "BuildConfig", "ns", "legacy");

    let transport = MockTransport::new()
        .with_pages(
            "/apis/apps/v1/deployments",
            vec![vec![workload("web", "ns")], vec![workload("tmp", "scratch")]],
        )
        .with_status("/apis/apps/v1/statefulsets", 503)
        .with_status("/apis/apps/v1/daemonsets", 403)
        .with_pages("/api/v1/nodes", vec![vec![node("n1"), node("n2")]]);

    let config = cluster(concat!(
        "    include_kinds: [Deployment, StatefulSet, DaemonSet, Node]\n",
        "    parallelism: 2",
    ));
    let plan = SyncPlan::from_cluster(&config, None).unwrap();
    let lister = Lister::new(transport, fast_retry(), 100);
    let sink = Box::new(ManifestExporter::new(&manifests, ExportFormat::Json));

    let mut orchestrator = FetchOrchestrator::new(lister, &db_path, sink);
    let summary = orchestrator.run(&plan).await.unwrap();

    // "gone" not observed, "tmp" excluded at fetch time, DaemonSet listed as empty
    assert_eq!(summary.removed, 2);
    assert_eq!(summary.fetched_per_kind["Deployment"], 1);
    assert_eq!(summary.fetched_per_kind["Node"], 2);

    // Only the failed kind keeps its rows
    assert!(summary.errors.contains_key("StatefulSet"));
    assert!(!summary.errors.contains_key("DaemonSet"));
    assert_eq!(summary.skipped_kinds, vec!["DaemonSet", "StatefulSet"]);

    // BuildConfig is no longer configured
    assert_eq!(summary.obsolete_removed, 1);
    assert_eq!(summary.exported, 3);

    let store = SnapshotStore::open_existing(&db_path).unwrap();
    assert!(exists(&store, "Deployment", "ns", "web"));
    assert!(!exists(&store, "Deployment", "ns", "gone"));
    assert!(!exists(&store, "Deployment", "scratch", "tmp"));
    assert!(exists(&store, "StatefulSet", "ns", "old-db"));
    assert!(!exists(&store, "DaemonSet", "ns", "old-ds"));
    assert!(!exists(&store, "BuildConfig", "ns", "legacy"));
    assert_eq!(store.list_active_nodes("c1").unwrap().len(), 2);
    assert!(store.get_meta("c1", META_LAST_SYNC).unwrap().is_some());

    assert!(manifests.join("Deployment/ns/web.json").exists());
    assert!(manifests.join("Node/n1.json").exists());
    assert_eq!(summary.store.by_kind["Node"], 2);
}

#[tokio::test]
async fn test_namespace_scoped_partial_failure_protects_kind() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data.db");

    seed(&db_path, "Deployment", "b", "keep");
    seed(&db_path, "Deployment", "a", "stale");

    let transport = MockTransport::new()
        .with_pages("/apis/apps/v1/namespaces/a/deployments", vec![vec![workload("api", "a")]])
        .with_status("/apis/apps/v1/namespaces/b/deployments", 500);

    let config = cluster(concat!(
        "    include_kinds: [Deployment, Node]\n",
        "    namespace_scoped: true\n",
        "    include_namespaces: [a, b]",
    ));
    let plan = SyncPlan::from_cluster(&config, None).unwrap();
    assert_eq!(plan.tasks.len(), 2);

    let lister = Lister::new(transport, fast_retry(), 100);
    let sink = Box::new(ManifestExporter::disabled(dir.path().join("m")));
    let summary = FetchOrchestrator::new(lister, &db_path, sink)
        .run(&plan)
        .await
        .unwrap();

    assert_eq!(summary.removed, 0);
    assert!(summary.errors.contains_key("Deployment/b"));
    assert!(summary.skipped_kinds.contains(&"Deployment".to_string()));

    let store = SnapshotStore::open_existing(&db_path).unwrap();
    assert!(exists(&store, "Deployment", "a", "api"));
    assert!(exists(&store, "Deployment", "a", "stale"));
    assert!(exists(&store, "Deployment", "b", "keep"));
}

#[tokio::test]
async fn test_empty_kind_is_skipped_but_finalized() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data.db");
    let manifests = dir.path().join("manifests");

    seed(&db_path, "CronJob", "ns", "nightly");

    let transport = MockTransport::new().with_pages("/apis/batch/v1/cronjobs", vec![vec![]]);
    let config = cluster("    include_kinds: [CronJob]");
    let plan = SyncPlan::from_cluster(&config, None).unwrap();

    let lister = Lister::new(transport, fast_retry(), 100);
    let sink = Box::new(ManifestExporter::new(&manifests, ExportFormat::Yaml));
    let summary = FetchOrchestrator::new(lister, &db_path, sink)
        .run(&plan)
        .await
        .unwrap();

    assert_eq!(summary.skipped_kinds, vec!["CronJob"]);
    assert!(summary.errors.is_empty());
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.store.active, 0);
}

#[tokio::test]
async fn test_empty_kind_with_prior_export_is_not_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data.db");
    let manifests = dir.path().join("manifests");
    std::fs::create_dir_all(manifests.join("CronJob/ns")).unwrap();
    std::fs::write(manifests.join("CronJob/ns/nightly.json"), "{}").unwrap();

    let transport = MockTransport::new().with_pages("/apis/batch/v1/cronjobs", vec![vec![]]);
    let config = cluster("    include_kinds: [CronJob]");
    let plan = SyncPlan::from_cluster(&config, None).unwrap();

    let lister = Lister::new(transport, fast_retry(), 100);
    let sink = Box::new(ManifestExporter::new(&manifests, ExportFormat::Json));
    let summary = FetchOrchestrator::new(lister, &db_path, sink)
        .run(&plan)
        .await
        .unwrap();

    assert!(summary.skipped_kinds.is_empty());
    assert_eq!(summary.fetched_per_kind["CronJob"], 0);
}

#[tokio::test]
async fn test_resync_reports_unchanged_content() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data.db");
    let config = cluster("    include_kinds: [Deployment]");
    let plan = SyncPlan::from_cluster(&config, None).unwrap();

    for _ in 0..2 {
        let transport = MockTransport::new()
            .with_pages("/apis/apps/v1/deployments", vec![vec![workload("web", "ns")]]);
        let lister = Lister::new(transport, fast_retry(), 100);
        let sink = Box::new(ManifestExporter::disabled(dir.path().join("m")));
        FetchOrchestrator::new(lister, &db_path, sink)
            .run(&plan)
            .await
            .unwrap();
    }

    let store = SnapshotStore::open_existing(&db_path).unwrap();
    let records = store.list_workloads("c1", None).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].last_seen >= records[0].first_seen);
    assert!(records[0].manifest.get("status").is_none());
}

struct BrokenArchive;

impl ManifestSink for BrokenArchive {
    fn export_kind(
        &mut self,
        _kind: &str,
        items: &[Value],
        _namespaced: bool,
    ) -> gatherer_core::Result<usize> {
        Ok(items.len())
    }

    fn has_existing(&self, _kind: &str) -> bool {
        false
    }

    fn finish(&mut self) -> gatherer_core::Result<()> {
        Err(CoreError::Io(std::io::Error::other("disk full")))
    }
}

#[tokio::test]
async fn test_export_finish_failure_still_finalizes() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data.db");
    seed(&db_path, "Deployment", "ns", "gone");

    let transport = MockTransport::new()
        .with_pages("/apis/apps/v1/deployments", vec![vec![workload("web", "ns")]]);
    let config = cluster("    include_kinds: [Deployment]");
    let plan = SyncPlan::from_cluster(&config, None).unwrap();

    let lister = Lister::new(transport, fast_retry(), 100);
    let summary = FetchOrchestrator::new(lister, &db_path, Box::new(BrokenArchive))
        .run(&plan)
        .await
        .unwrap();

    assert_eq!(summary.removed, 1);
    assert_eq!(summary.exported, 1);
    let store = SnapshotStore::open_existing(&db_path).unwrap();
    assert!(!exists(&store, "Deployment", "ns", "gone"));
    assert!(store.get_meta("c1", META_LAST_SYNC).unwrap().is_some());
}
