//! Nodes command - stored node capacity

use gatherer_core::AppConfig;
use gatherer_store::SnapshotStore;

use crate::display;
use crate::error::{CliError, Result};

pub fn run(config: &AppConfig, clusters: &[String], all: bool) -> Result<()> {
    let mut results = Vec::new();

    for cluster in config.select(clusters, all)? {
        let paths = config.cluster_paths(&cluster.name);
        let nodes = SnapshotStore::open_existing(&paths.db_path)
            .and_then(|store| store.list_active_nodes(&cluster.name))
            .map_err(|e| CliError::store(&cluster.name, e))?;
        results.push((cluster.name.clone(), nodes));
    }

    display::print_by_cluster(results)
}
