//! data-gatherer - snapshot cluster workloads and node capacity into SQLite

use clap::{Args, Parser, Subcommand};
use gatherer_core::{AppConfig, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;

mod commands;
mod display;
mod error;
mod exit_codes;
mod logging;

use error::Result;

#[derive(Parser)]
#[command(name = "data-gatherer")]
#[command(version)]
#[command(
    about = "Snapshot Kubernetes and OpenShift workloads into a local store",
    long_about = None
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(long, global = true, env = "DATA_GATHERER_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level or filter directive (overrides the configuration)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

/// Which clusters a command applies to
#[derive(Args, Debug, Clone)]
struct ClusterSelection {
    /// Cluster name (repeatable)
    #[arg(long = "cluster", value_name = "NAME")]
    clusters: Vec<String>,

    /// Every configured cluster
    #[arg(long, conflicts_with = "clusters")]
    all_clusters: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the cluster directories and database
    Init {
        #[command(flatten)]
        target: ClusterSelection,
    },

    /// Show snapshot counts and the last sync time
    Status {
        #[command(flatten)]
        target: ClusterSelection,
    },

    /// Fetch workloads and update the snapshot
    Sync {
        #[command(flatten)]
        target: ClusterSelection,

        /// Only fetch these kinds (repeatable)
        #[arg(long = "kind", value_name = "KIND")]
        kinds: Vec<String>,
    },

    /// Print stored node capacity
    Nodes {
        #[command(flatten)]
        target: ClusterSelection,
    },

    /// List the kinds known out of the box
    Kinds {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Kinds { json } = cli.command {
        logging::init_default(cli.log_level.as_deref());
        return commands::kinds::run(json);
    }

    let config = AppConfig::load(&cli.config)?;
    logging::init(&config.logging, cli.log_level.as_deref());

    match cli.command {
        Commands::Init { target } => {
            commands::init::run(&config, &target.clusters, target.all_clusters)
        }
        Commands::Status { target } => {
            commands::status::run(&config, &target.clusters, target.all_clusters)
        }
        Commands::Sync { target, kinds } => {
            commands::sync::run(&config, &target.clusters, target.all_clusters, &kinds).await
        }
        Commands::Nodes { target } => {
            commands::nodes::run(&config, &target.clusters, target.all_clusters)
        }
        Commands::Kinds { .. } => Ok(()),
    }
}
