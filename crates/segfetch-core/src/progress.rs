//! Progress reporting for downloads (bytes done, ETA, rate).
//!
//! The engine calls [`ProgressSink::on_progress`] from worker threads after
//! every credited chunk, serialized under the pool lock, so a sink observes a
//! non-decreasing byte count that ends exactly at the total. Sinks must be
//! cheap; the CLI uses [`ChannelProgress`] to hand snapshots to an async task.

use std::time::Instant;

/// Receives the running total of credited bytes.
pub trait ProgressSink: Send + Sync {
    /// `total_bytes` is `None` when the size is unknown (single-stream fallback).
    fn on_progress(&self, bytes_completed: u64, total_bytes: Option<u64>);
}

impl<F> ProgressSink for F
where
    F: Fn(u64, Option<u64>) + Send + Sync,
{
    fn on_progress(&self, bytes_completed: u64, total_bytes: Option<u64>) {
        self(bytes_completed, total_bytes)
    }
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _bytes_completed: u64, _total_bytes: Option<u64>) {}
}

/// Forwards snapshots to a tokio channel without blocking the worker.
///
/// Updates are dropped when the receiver lags; the next one supersedes them.
pub struct ChannelProgress {
    tx: tokio::sync::mpsc::Sender<ProgressStats>,
    started: Instant,
}

impl ChannelProgress {
    pub fn new(tx: tokio::sync::mpsc::Sender<ProgressStats>) -> Self {
        Self {
            tx,
            started: Instant::now(),
        }
    }
}

impl ProgressSink for ChannelProgress {
    fn on_progress(&self, bytes_completed: u64, total_bytes: Option<u64>) {
        let stats = ProgressStats {
            bytes_done: bytes_completed,
            total_bytes,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        };
        let _ = self.tx.try_send(stats);
    }
}

/// Snapshot of download progress for one job (CLI-friendly).
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    /// Bytes credited so far.
    pub bytes_done: u64,
    /// Total file size in bytes, if known.
    pub total_bytes: Option<u64>,
    /// Elapsed time since download start (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Total download rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if size unknown or rate is 0).
    pub fn eta_secs(&self) -> Option<f64> {
        let total = self.total_bytes?;
        let remaining = total.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0]; None if size unknown.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.total_bytes?;
        if total == 0 {
            return Some(1.0);
        }
        Some((self.bytes_done as f64 / total as f64).min(1.0))
    }
}
