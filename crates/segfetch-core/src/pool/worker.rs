//! Worker loop: dequeue, fetch into the segment store, settle the segment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::lease::SegmentLease;
use super::state::{StopReason, WorkerHandle};
use crate::downloader::RangeSource;
use crate::queue::TaskQueue;
use crate::retry::{classify, ErrorKind, RetryDecision, RetryPolicy, SegmentError};
use crate::segmenter::Segment;
use crate::storage::{store_path, SegmentStore};

/// How a worker thread ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The queue finished.
    Drained,
    /// Flagged by the liveness monitor; its segment went back to the queue.
    Stalled,
    /// The job shut down.
    Shutdown,
}

impl From<StopReason> for WorkerExit {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Stalled => WorkerExit::Stalled,
            StopReason::Shutdown => WorkerExit::Shutdown,
        }
    }
}

pub(super) struct Worker {
    pub(super) handle: WorkerHandle,
    pub(super) queue: Arc<TaskQueue>,
    pub(super) source: Arc<dyn RangeSource>,
    pub(super) policy: RetryPolicy,
    pub(super) dequeue_wait: Duration,
    pub(super) destination: PathBuf,
}

impl Worker {
    pub(super) fn run(self) -> WorkerExit {
        let id = self.handle.id();
        tracing::debug!(worker = id, "worker started");
        let exit = self.work_loop();
        self.handle.mark_stopped();
        tracing::debug!(worker = id, ?exit, "worker stopped");
        exit
    }

    fn work_loop(&self) -> WorkerExit {
        loop {
            if let Some(reason) = self.handle.stop_reason() {
                return reason.into();
            }
            let Some(segment) = self.queue.dequeue(self.dequeue_wait) else {
                if self.queue.is_finished() {
                    return WorkerExit::Drained;
                }
                continue;
            };
            let lease = SegmentLease::new(&self.queue, segment);
            self.handle.begin_segment(segment.index);
            let result = self.fetch_segment(lease.segment());
            self.handle.end_segment();

            let err = match result {
                Ok(()) => {
                    tracing::debug!(
                        worker = self.handle.id(),
                        segment = segment.index,
                        bytes = segment.len(),
                        "segment done"
                    );
                    lease.complete();
                    continue;
                }
                Err(e) => e,
            };

            match classify(&err) {
                ErrorKind::Stalled => {
                    tracing::warn!(
                        worker = self.handle.id(),
                        segment = segment.index,
                        "worker stalled, segment requeued"
                    );
                    lease.requeue();
                    return WorkerExit::Stalled;
                }
                ErrorKind::Cancelled => {
                    lease.requeue();
                    return WorkerExit::Shutdown;
                }
                kind => self.retry_or_fail(lease, kind, err),
            }
        }
    }

    fn retry_or_fail(&self, lease: SegmentLease<'_>, kind: ErrorKind, err: SegmentError) {
        let index = lease.segment().index;
        let failures = self.queue.record_failure(index);
        match self.policy.decide(failures, kind) {
            RetryDecision::RetryAfter(delay) => {
                tracing::warn!(
                    worker = self.handle.id(),
                    segment = index,
                    attempt = failures,
                    ?kind,
                    delay_ms = delay.as_millis() as u64,
                    "segment failed, retrying: {}",
                    err
                );
                // Interrupted backoff still requeues; the loop head then stops.
                self.handle.pause(delay);
                lease.requeue();
            }
            RetryDecision::NoRetry => {
                tracing::error!(
                    worker = self.handle.id(),
                    segment = index,
                    attempts = failures,
                    "segment failed, giving up: {}",
                    err
                );
                lease.fail(failures, err.to_string());
            }
        }
    }

    /// One attempt: fresh store, fetch, verify length, finalize.
    fn fetch_segment(&self, segment: &Segment) -> Result<(), SegmentError> {
        let path = store_path(&self.destination, segment.index);
        let mut store = SegmentStore::create(&path).map_err(SegmentError::Storage)?;
        if let Err(e) = self.source.fetch(segment, &mut store, &self.handle) {
            store.discard();
            return Err(e);
        }
        let received = store.written();
        if received != segment.len() {
            store.discard();
            return Err(SegmentError::PartialTransfer {
                expected: segment.len(),
                received,
            });
        }
        store.finalize().map_err(SegmentError::Storage)
    }
}
