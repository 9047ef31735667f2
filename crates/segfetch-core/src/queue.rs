//! Task queue: the single point of segment ownership.
//!
//! A FIFO of pending segments plus a status table. Workers `dequeue`
//! (pending → in-flight) and report back with `mark_done`, `enqueue`
//! (in-flight → pending, same range) or `mark_failed`. Everything happens under
//! one mutex, so a re-enqueue happens-before the next dequeue of that segment.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::segmenter::{Segment, SegmentBitmap};

/// Where a segment is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    Pending,
    InFlight,
    Done,
    Failed,
}

/// Why a segment was given up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFailure {
    pub index: usize,
    pub attempts: u32,
    pub last_error: String,
}

struct QueueInner {
    segments: Vec<Segment>,
    pending: VecDeque<usize>,
    status: Vec<SegmentStatus>,
    done: SegmentBitmap,
    failures: Vec<u32>,
    failed: Option<SegmentFailure>,
}

impl QueueInner {
    fn is_complete(&self) -> bool {
        self.done.all_completed()
    }

    fn is_finished(&self) -> bool {
        self.failed.is_some() || self.is_complete()
    }
}

pub struct TaskQueue {
    inner: Mutex<QueueInner>,
    /// Signalled on enqueue and when the queue finishes (wakes workers).
    available: Condvar,
    /// Signalled when the queue finishes (wakes the supervisor).
    finished: Condvar,
}

impl TaskQueue {
    /// Queue holding every planned segment as pending, in index order.
    pub fn new(segments: Vec<Segment>) -> Self {
        let n = segments.len();
        TaskQueue {
            inner: Mutex::new(QueueInner {
                pending: (0..n).collect(),
                status: vec![SegmentStatus::Pending; n],
                done: SegmentBitmap::new(n),
                failures: vec![0; n],
                failed: None,
                segments,
            }),
            available: Condvar::new(),
            finished: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a segment back for another attempt. Ignored for done or failed
    /// segments and for segments already pending.
    pub fn enqueue(&self, segment: &Segment) {
        let mut inner = self.lock();
        let Some(status) = inner.status.get(segment.index).copied() else {
            tracing::warn!(index = segment.index, "enqueue of unknown segment ignored");
            return;
        };
        if status != SegmentStatus::InFlight {
            return;
        }
        inner.status[segment.index] = SegmentStatus::Pending;
        inner.pending.push_back(segment.index);
        drop(inner);
        self.available.notify_one();
    }

    /// Take the next pending segment, waiting up to `timeout` for one.
    ///
    /// Returns `None` on timeout or once the queue is finished.
    pub fn dequeue(&self, timeout: Duration) -> Option<Segment> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        loop {
            if inner.is_finished() {
                return None;
            }
            if let Some(index) = inner.pending.pop_front() {
                inner.status[index] = SegmentStatus::InFlight;
                return Some(inner.segments[index]);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            inner = self
                .available
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Record a successful segment. Done is terminal.
    pub fn mark_done(&self, index: usize) {
        let mut inner = self.lock();
        if index >= inner.status.len() {
            return;
        }
        inner.status[index] = SegmentStatus::Done;
        inner.done.set_completed(index);
        let finished = inner.is_finished();
        drop(inner);
        if finished {
            self.notify_finished();
        }
    }

    /// Give up on a segment; this finishes the queue.
    pub fn mark_failed(&self, index: usize, attempts: u32, last_error: impl Into<String>) {
        let mut inner = self.lock();
        if index >= inner.status.len() || inner.status[index] == SegmentStatus::Done {
            return;
        }
        inner.status[index] = SegmentStatus::Failed;
        if inner.failed.is_none() {
            inner.failed = Some(SegmentFailure {
                index,
                attempts,
                last_error: last_error.into(),
            });
        }
        drop(inner);
        self.notify_finished();
    }

    /// Count one more failed attempt for `index`; returns the new total.
    pub fn record_failure(&self, index: usize) -> u32 {
        let mut inner = self.lock();
        match inner.failures.get_mut(index) {
            Some(n) => {
                *n += 1;
                *n
            }
            None => 0,
        }
    }

    /// Failed attempts recorded so far for `index`.
    pub fn failures(&self, index: usize) -> u32 {
        self.lock().failures.get(index).copied().unwrap_or(0)
    }

    /// Every segment is done.
    pub fn is_complete(&self) -> bool {
        self.lock().is_complete()
    }

    /// Every segment is done, or some segment failed for good.
    pub fn is_finished(&self) -> bool {
        self.lock().is_finished()
    }

    /// Block until the queue is finished or `timeout` passes. Returns `is_finished()`.
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        let inner = self.lock();
        let (inner, _) = self
            .finished
            .wait_timeout_while(inner, timeout, |q| !q.is_finished())
            .unwrap_or_else(PoisonError::into_inner);
        inner.is_finished()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn status(&self, index: usize) -> Option<SegmentStatus> {
        self.lock().status.get(index).copied()
    }

    pub fn done_count(&self) -> usize {
        self.lock().done.count_completed()
    }

    /// Indices not done, ascending.
    pub fn unfinished(&self) -> Vec<usize> {
        self.lock().done.missing()
    }

    /// Number of planned segments.
    pub fn len(&self) -> usize {
        self.lock().segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First segment given up on, if any.
    pub fn failure(&self) -> Option<SegmentFailure> {
        self.lock().failed.clone()
    }

    fn notify_finished(&self) {
        self.available.notify_all();
        self.finished.notify_all();
    }
}
