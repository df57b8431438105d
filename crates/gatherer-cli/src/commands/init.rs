//! Init command - create cluster directories and the snapshot database

use console::style;
use gatherer_core::AppConfig;
use gatherer_store::SnapshotStore;

use crate::error::{CliError, Result};

pub fn run(config: &AppConfig, clusters: &[String], all: bool) -> Result<()> {
    for cluster in config.select(clusters, all)? {
        let paths = config.cluster_paths(&cluster.name);
        std::fs::create_dir_all(&paths.manifests_dir)?;
        std::fs::create_dir_all(&paths.reports_dir)?;
        SnapshotStore::open(&paths.db_path).map_err(|e| CliError::store(&cluster.name, e))?;

        tracing::info!(
            cluster = %cluster.name,
            db = %paths.db_path.display(),
            "cluster initialized"
        );
        println!(
            "{} Initialized {} at {}",
            style("✓").green().bold(),
            style(&cluster.name).cyan(),
            paths.base_dir.display()
        );
    }
    Ok(())
}
