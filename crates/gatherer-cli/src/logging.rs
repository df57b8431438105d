//! Subscriber setup
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! Precedence: `--log-level`, then `RUST_LOG`, then the configuration.

use gatherer_core::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn filter(config_level: &str, override_level: Option<&str>) -> EnvFilter {
    match override_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_level)),
    }
}

/// Install the global subscriber from the `logging` section
pub fn init(config: &LoggingConfig, override_level: Option<&str>) {
    let registry = tracing_subscriber::registry().with(filter(&config.level, override_level));
    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

/// Subscriber for commands that run without a configuration file
pub fn init_default(override_level: Option<&str>) {
    tracing_subscriber::registry()
        .with(filter("warn", override_level))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
