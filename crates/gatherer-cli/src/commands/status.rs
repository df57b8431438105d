//! Status command - snapshot counts per cluster

use gatherer_core::AppConfig;
use gatherer_store::{META_LAST_SYNC, SnapshotStore, StoreSummary};
use serde::Serialize;

use crate::display;
use crate::error::{CliError, Result};

#[derive(Serialize)]
struct ClusterStatus {
    #[serde(flatten)]
    summary: StoreSummary,
    last_sync: Option<String>,
}

pub fn run(config: &AppConfig, clusters: &[String], all: bool) -> Result<()> {
    let mut results = Vec::new();

    for cluster in config.select(clusters, all)? {
        let paths = config.cluster_paths(&cluster.name);
        let store = SnapshotStore::open_existing(&paths.db_path)
            .map_err(|e| CliError::store(&cluster.name, e))?;

        let status = ClusterStatus {
            summary: store
                .summary(&cluster.name)
                .map_err(|e| CliError::store(&cluster.name, e))?,
            last_sync: store
                .get_meta(&cluster.name, META_LAST_SYNC)
                .map_err(|e| CliError::store(&cluster.name, e))?,
        };
        results.push((cluster.name.clone(), status));
    }

    display::print_by_cluster(results)
}
