//! Sync command - fetch and snapshot each selected cluster

use console::style;
use gatherer_core::AppConfig;
use gatherer_kube::sync_cluster;

use crate::display;
use crate::error::{CliError, Result};

pub async fn run(
    config: &AppConfig,
    clusters: &[String],
    all: bool,
    kinds: &[String],
) -> Result<()> {
    let only_kinds = (!kinds.is_empty()).then_some(kinds);
    let mut results = Vec::new();

    for cluster in config.select(clusters, all)? {
        let summary = sync_cluster(config, cluster, only_kinds)
            .await
            .map_err(|e| CliError::kube(&cluster.name, e))?;

        if !summary.errors.is_empty() {
            eprintln!(
                "{} {}: {} kind(s) failed, their previous snapshot was kept",
                style("Warning:").yellow().bold(),
                cluster.name,
                summary.errors.len()
            );
        }
        results.push((cluster.name.clone(), summary));
    }

    display::print_by_cluster(results)
}
