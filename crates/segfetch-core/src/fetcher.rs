//! Orchestrator: probe → plan → pool ⇄ monitor → reassemble, with the
//! single-stream fallback when ranges are not available.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::downloader::{single_stream_fetch, CurlRangeSource, RangeSource, TransferOptions};
use crate::error::FetchError;
use crate::fetch_head::{self, ProbeResult};
use crate::job::DownloadJob;
use crate::monitor::LivenessMonitor;
use crate::pool::{run_pool, PoolSettings, SharedState};
use crate::progress::{NoopProgress, ProgressSink};
use crate::queue::{SegmentStatus, TaskQueue};
use crate::reassemble::reassemble;
use crate::segmenter::plan_segments;
use crate::storage::store_path;

/// How long an idle worker blocks in one dequeue.
const DEQUEUE_WAIT: Duration = Duration::from_millis(250);

/// Which path produced the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    Segmented {
        segments: usize,
        workers_spawned: usize,
        replacements: usize,
        stalls: usize,
    },
    SingleStream,
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub mode: DownloadMode,
    /// Size of the finished file.
    pub bytes: u64,
    pub elapsed: Duration,
    pub destination: PathBuf,
}

/// Runs download jobs, reporting progress to one sink.
#[derive(Clone)]
pub struct Fetcher {
    progress: Arc<dyn ProgressSink>,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_progress(progress: Arc<dyn ProgressSink>) -> Self {
        Self { progress }
    }

    /// Download `job.url()` to `job.destination()`. Blocks until done.
    ///
    /// The progress counter starts at zero on every call.
    pub fn download(&self, job: &DownloadJob) -> Result<DownloadReport, FetchError> {
        job.validate()?;
        let started = Instant::now();
        let destination = job.destination();
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| FetchError::io("create destination directory", parent, e))?;
        }
        tracing::info!(
            url = job.url(),
            path = %destination.display(),
            workers = job.workers(),
            "download started"
        );

        let opts = TransferOptions {
            chunk_size: job.chunk_size(),
            request_timeout: job.request_timeout(),
        };
        let probe = fetch_head::probe(job.url(), job.request_timeout());
        let (mode, bytes) = match probe {
            ProbeResult {
                total_size: Some(0),
                range_supported: true,
            } => {
                File::create(destination)
                    .map_err(|e| FetchError::io("create destination", destination, e))?;
                self.progress.on_progress(0, Some(0));
                let mode = DownloadMode::Segmented {
                    segments: 0,
                    workers_spawned: 0,
                    replacements: 0,
                    stalls: 0,
                };
                (mode, 0)
            }
            ProbeResult {
                total_size: Some(total),
                range_supported: true,
            } => {
                let source = Arc::new(CurlRangeSource::new(job.url(), opts));
                let mode = self.segmented(job, total, source)?;
                (mode, total)
            }
            ProbeResult { total_size, .. } => {
                tracing::info!(url = job.url(), "falling back to single-stream download");
                let bytes = single_stream_fetch(
                    job.url(),
                    destination,
                    total_size,
                    &opts,
                    self.progress.as_ref(),
                )?;
                (DownloadMode::SingleStream, bytes)
            }
        };

        let elapsed = started.elapsed();
        tracing::info!(
            path = %destination.display(),
            bytes,
            elapsed_secs = elapsed.as_secs_f64(),
            ?mode,
            "download finished"
        );
        Ok(DownloadReport {
            mode,
            bytes,
            elapsed,
            destination: destination.to_path_buf(),
        })
    }

    fn segmented(
        &self,
        job: &DownloadJob,
        total: u64,
        source: Arc<dyn RangeSource>,
    ) -> Result<DownloadMode, FetchError> {
        let destination = job.destination();
        let segments = plan_segments(
            total,
            job.workers(),
            job.over_partition(),
            job.min_segment_size(),
        );
        let count = segments.len();
        tracing::debug!(total, segments = count, "segment plan ready");

        let queue = Arc::new(TaskQueue::new(segments));
        let shared = Arc::new(SharedState::new(total, count, Arc::clone(&self.progress)));
        let monitor = LivenessMonitor::spawn(
            Arc::clone(&shared),
            job.monitor_interval(),
            job.stall_timeout(),
        )
        .map_err(|e| FetchError::io("spawn liveness monitor", destination, e))?;

        let settings = PoolSettings {
            workers: job.workers(),
            max_replacements: job.max_replacements(),
            retry: job.retry(),
            dequeue_wait: DEQUEUE_WAIT,
            destination: destination.to_path_buf(),
        };
        let pool_result = run_pool(&settings, &queue, &shared, source);
        monitor.stop();

        // Merge whatever finished even when the pool failed.
        let merged = reassemble(destination, &finished_stores(&queue, destination), count);
        let outcome = match pool_result {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(merge_err) = merged {
                    tracing::warn!("best-effort reassembly failed: {}", merge_err);
                }
                return Err(e);
            }
        };
        let report = merged?;
        if !report.is_complete() {
            return Err(FetchError::ReassemblyFailure {
                missing: report.missing,
                bytes_written: report.bytes_written,
            });
        }
        Ok(DownloadMode::Segmented {
            segments: count,
            workers_spawned: outcome.spawned,
            replacements: outcome.replacements,
            stalls: outcome.stalls,
        })
    }
}

/// Store paths of every segment the queue marked done.
fn finished_stores(queue: &TaskQueue, destination: &Path) -> BTreeMap<usize, PathBuf> {
    (0..queue.len())
        .filter(|&i| queue.status(i) == Some(SegmentStatus::Done))
        .map(|i| (i, store_path(destination, i)))
        .collect()
}
