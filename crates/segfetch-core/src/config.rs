use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of failed attempts per segment before the job gives up.
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay_secs: 0.25,
            max_delay_secs: 10,
        }
    }
}

/// Global configuration loaded from `~/.config/segfetch/config.toml`.
///
/// Every field has a default, so a partial file only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Number of concurrent download workers (1..=10000).
    pub workers: usize,
    /// Segments planned per worker (over-partition factor, at least 1).
    pub over_partition: usize,
    /// Size in bytes of one network read (curl receive buffer).
    pub chunk_size: usize,
    /// Optional lower bound on segment size in bytes (None = only the planner's 1-byte minimum).
    pub min_segment_size: Option<u64>,
    /// Seconds a worker may hold a segment without receiving bytes before it is marked stalled.
    pub stall_timeout_secs: u64,
    /// Seconds between liveness scans.
    pub monitor_interval_secs: u64,
    /// Connect timeout, and the longest wait for a single chunk, in seconds.
    pub request_timeout_secs: u64,
    /// Maximum number of replacement workers spawned for stalled ones.
    pub max_replacements: usize,
    /// Optional retry policy; if missing, built-in defaults are used.
    pub retry: Option<RetryConfig>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            over_partition: crate::segmenter::DEFAULT_OVER_PARTITION,
            chunk_size: 1024 * 1024,
            min_segment_size: None,
            stall_timeout_secs: 60,
            monitor_interval_secs: 10,
            request_timeout_secs: 30,
            max_replacements: 32,
            retry: None,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("segfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FetchConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Same as [`load_or_init`] with an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<FetchConfig> {
    if !path.exists() {
        let default_cfg = FetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: FetchConfig =
        toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
