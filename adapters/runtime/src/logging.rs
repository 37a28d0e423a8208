//! Tracing subscriber setup for hosts embedding the simulation.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

/// Installs a compact formatter filtered by `RUST_LOG`.
///
/// Without `RUST_LOG` the filter defaults to `info`, or `debug` when
/// `verbose` is set. Fails if a global subscriber is already installed.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .try_init()
        .map_err(|error| anyhow!("failed to install tracing subscriber: {error}"))
}
