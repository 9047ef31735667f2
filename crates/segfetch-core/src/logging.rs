//! Tracing setup. Logs go to a file under the XDG state directory; the CLI
//! falls back to stderr when that file cannot be opened.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,segfetch=debug,segfetch_core=debug";
const LOG_FILE: &str = "segfetch.log";

/// `RUST_LOG` if set, otherwise debug for our crates and info elsewhere.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Where the log file lives (`~/.local/state/segfetch/segfetch.log`).
/// Creates the parent directory.
pub fn log_path() -> Result<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("segfetch")?;
    dirs.place_state_file(LOG_FILE)
        .context("create log directory")
}

/// Install the global subscriber writing to [`log_path`]. Returns the path.
///
/// Errors when the state directory or file is not writable, or when a
/// subscriber is already installed.
pub fn init_logging() -> Result<PathBuf> {
    let path = log_path()?;
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(BoxMakeWriter::new(Mutex::new(file)))
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing init: {}", e))?;

    tracing::info!(path = %path.display(), "segfetch logging initialized");
    Ok(path)
}

/// Stderr-only subscriber. Does nothing if one is already installed.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_thread_names(true)
        .try_init();
}
