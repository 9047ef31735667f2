//! Immutable description of one download.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::retry::RetryPolicy;

/// Upper bound on the worker count.
pub const MAX_WORKERS: usize = 10_000;

/// URL, destination and tuning for a single `Fetcher::download` call.
///
/// Built once and never changed by the engine. Use [`DownloadJob::new`] with
/// the `with_*` setters, or [`DownloadJob::from_config`].
#[derive(Debug, Clone)]
pub struct DownloadJob {
    url: String,
    destination: PathBuf,
    workers: usize,
    over_partition: usize,
    min_segment_size: Option<u64>,
    chunk_size: usize,
    stall_timeout: Duration,
    monitor_interval: Duration,
    request_timeout: Duration,
    retry: RetryPolicy,
    max_replacements: usize,
}

impl DownloadJob {
    /// Job with the built-in defaults (same values as `FetchConfig::default()`).
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self::from_config(url, destination, &FetchConfig::default())
    }

    pub fn from_config(
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        cfg: &FetchConfig,
    ) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            workers: cfg.workers,
            over_partition: cfg.over_partition,
            min_segment_size: cfg.min_segment_size,
            chunk_size: cfg.chunk_size,
            stall_timeout: Duration::from_secs(cfg.stall_timeout_secs),
            monitor_interval: Duration::from_secs(cfg.monitor_interval_secs),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
            retry: cfg
                .retry
                .as_ref()
                .map(RetryPolicy::from)
                .unwrap_or_default(),
            max_replacements: cfg.max_replacements,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_over_partition(mut self, k: usize) -> Self {
        self.over_partition = k;
        self
    }

    pub fn with_min_segment_size(mut self, size: Option<u64>) -> Self {
        self.min_segment_size = size;
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_max_replacements(mut self, n: usize) -> Self {
        self.max_replacements = n;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn over_partition(&self) -> usize {
        self.over_partition
    }

    pub fn min_segment_size(&self) -> Option<u64> {
        self.min_segment_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn stall_timeout(&self) -> Duration {
        self.stall_timeout
    }

    pub fn monitor_interval(&self) -> Duration {
        self.monitor_interval
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn max_replacements(&self) -> usize {
        self.max_replacements
    }

    /// Reject parameters the engine cannot run with.
    pub fn validate(&self) -> Result<(), FetchError> {
        let invalid = |msg: String| Err(FetchError::InvalidJob(msg));
        if self.url.trim().is_empty() {
            return invalid("URL is empty".into());
        }
        if self.destination.as_os_str().is_empty() {
            return invalid("destination path is empty".into());
        }
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return invalid(format!(
                "worker count {} out of range 1..={}",
                self.workers, MAX_WORKERS
            ));
        }
        if self.chunk_size == 0 {
            return invalid("chunk size must be positive".into());
        }
        if self.stall_timeout.is_zero() {
            return invalid("stall timeout must be positive".into());
        }
        if self.monitor_interval.is_zero() {
            return invalid("monitor interval must be positive".into());
        }
        if self.request_timeout.is_zero() {
            return invalid("request timeout must be positive".into());
        }
        Ok(())
    }
}
