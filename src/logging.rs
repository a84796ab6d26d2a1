//! `tracing` subscriber setup for the CLI.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::Config;

/// Filter used when neither `MINDTREE_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "warn";

/// Builds the filter from the configured directive, or [`DEFAULT_FILTER`].
pub fn build_filter(directive: Option<&str>) -> Result<EnvFilter> {
    let directive = directive.unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_new(directive).map_err(|e| anyhow!("Invalid log filter '{directive}': {e}"))
}

/// Installs a fmt subscriber writing to stderr.
///
/// Stdout stays free for command output. Calling it twice is an error.
pub fn init(config: &Config) -> Result<()> {
    let filter = build_filter(config.log_filter.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))
}
