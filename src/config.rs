//! Runtime configuration read from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

/// Default lifetime of the cached context digest.
pub const DEFAULT_CONTEXT_TTL_SECS: u64 = 3600;

/// Settings shared by the CLI and the library entry points.
///
/// LLM host and model are read separately by
/// [`LlmClientBuilder`](crate::llm::LlmClientBuilder).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// `tracing` filter directive, e.g. `info` or `mindtree=debug`.
    pub log_filter: Option<String>,
    /// How long the assistant reuses a context digest.
    pub context_ttl: Duration,
    /// Recorded as `imported_by` on import logs.
    pub user: Option<String>,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `MINDTREE_DB`: database path, default `{data_dir}/mindtree/mindtree.db`
    /// - `MINDTREE_LOG`: log filter, falling back to `RUST_LOG`
    /// - `MINDTREE_CONTEXT_TTL_SECS`: context cache lifetime, default 3600
    /// - `MINDTREE_USER`: import attribution
    ///
    /// # Errors
    ///
    /// Returns an error if no database path is set and the platform data
    /// directory cannot be determined.
    pub fn from_env() -> Result<Self> {
        let database_path = match non_empty_var("MINDTREE_DB") {
            Some(path) => PathBuf::from(path),
            None => default_database_path()?,
        };

        let log_filter = non_empty_var("MINDTREE_LOG").or_else(|| non_empty_var("RUST_LOG"));

        let context_ttl = non_empty_var("MINDTREE_CONTEXT_TTL_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_CONTEXT_TTL_SECS));

        Ok(Self {
            database_path,
            log_filter,
            context_ttl,
            user: non_empty_var("MINDTREE_USER"),
        })
    }

    /// Replaces the database path, e.g. from a `--db` flag.
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }
}

/// Loads a `.env` file into the process environment.
///
/// Returns `Ok(false)` when the file does not exist. An unreadable or
/// malformed file is returned to the caller, which reports it once logging
/// is installed.
pub fn load_dotenv_from(path: &Path) -> Result<bool, dotenvy::Error> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Gets the cross-platform default database path.
///
/// Returns `{data_dir}/mindtree/mindtree.db`, where `data_dir` is
/// `~/.local/share` on Linux and `~/Library/Application Support` on macOS.
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined.
pub fn default_database_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| anyhow!("Failed to determine data directory"))?;

    Ok(data_dir.join("mindtree").join("mindtree.db"))
}

/// Creates the parent directory of the database file if needed.
pub fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    Ok(())
}
