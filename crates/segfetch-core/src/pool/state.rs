//! Shared state for one download: progress counter and worker table.
//!
//! One mutex guards both so the monitor sees a consistent view and progress
//! sink calls are serialized. Cancellation flags live outside the lock so the
//! transfer callbacks can poll them cheaply.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::progress::ProgressSink;

pub type WorkerId = usize;

/// Granularity of cancellable sleeps.
const PAUSE_STEP: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerLifecycle {
    Running,
    Stalled,
    Stopped,
}

/// Why a worker must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The liveness monitor flagged it.
    Stalled,
    /// The job is over.
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct WorkerState {
    pub id: WorkerId,
    /// Segment index currently being fetched.
    pub segment: Option<usize>,
    pub last_activity: Instant,
    pub lifecycle: WorkerLifecycle,
    stalled: Arc<AtomicBool>,
}

struct PoolState {
    bytes_completed: u64,
    total_bytes: u64,
    /// Per-segment high-water mark of credited bytes.
    credited: Vec<u64>,
    workers: BTreeMap<WorkerId, WorkerState>,
}

pub struct SharedState {
    inner: Mutex<PoolState>,
    shutdown: AtomicBool,
    sink: Arc<dyn ProgressSink>,
}

impl SharedState {
    /// Fresh state with a zero progress counter.
    pub fn new(total_bytes: u64, segment_count: usize, sink: Arc<dyn ProgressSink>) -> Self {
        SharedState {
            inner: Mutex::new(PoolState {
                bytes_completed: 0,
                total_bytes,
                credited: vec![0; segment_count],
                workers: BTreeMap::new(),
            }),
            shutdown: AtomicBool::new(false),
            sink,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a worker to the table as running and hand back its handle.
    pub fn register_worker(self: &Arc<Self>, id: WorkerId) -> WorkerHandle {
        let stalled = Arc::new(AtomicBool::new(false));
        self.lock().workers.insert(
            id,
            WorkerState {
                id,
                segment: None,
                last_activity: Instant::now(),
                lifecycle: WorkerLifecycle::Running,
                stalled: Arc::clone(&stalled),
            },
        );
        WorkerHandle {
            id,
            shared: Arc::clone(self),
            stalled,
        }
    }

    fn begin_segment(&self, id: WorkerId, index: usize) {
        if let Some(w) = self.lock().workers.get_mut(&id) {
            w.segment = Some(index);
            w.last_activity = Instant::now();
        }
    }

    fn end_segment(&self, id: WorkerId) {
        if let Some(w) = self.lock().workers.get_mut(&id) {
            w.segment = None;
            w.last_activity = Instant::now();
        }
    }

    /// Record activity and credit bytes beyond the segment's high-water mark.
    ///
    /// `received` is the attempt's cumulative byte count for `index`.
    fn record_chunk(&self, id: WorkerId, index: usize, received: u64) {
        let mut state = self.lock();
        if let Some(w) = state.workers.get_mut(&id) {
            w.last_activity = Instant::now();
        }
        let Some(mark) = state.credited.get(index).copied() else {
            return;
        };
        if received <= mark {
            return;
        }
        state.credited[index] = received;
        state.bytes_completed += received - mark;
        self.sink
            .on_progress(state.bytes_completed, Some(state.total_bytes));
    }

    fn mark_stopped(&self, id: WorkerId) {
        if let Some(w) = self.lock().workers.get_mut(&id) {
            w.lifecycle = WorkerLifecycle::Stopped;
            w.segment = None;
        }
    }

    /// Flag every running worker that has held a segment without activity for
    /// longer than `stall_timeout`. Returns the ids newly marked stalled.
    pub fn mark_stalled(&self, stall_timeout: Duration, now: Instant) -> Vec<WorkerId> {
        let mut state = self.lock();
        let mut marked = Vec::new();
        for w in state.workers.values_mut() {
            if w.lifecycle != WorkerLifecycle::Running || w.segment.is_none() {
                continue;
            }
            if now.saturating_duration_since(w.last_activity) > stall_timeout {
                w.lifecycle = WorkerLifecycle::Stalled;
                w.stalled.store(true, Ordering::Release);
                marked.push(w.id);
            }
        }
        marked
    }

    /// Bytes credited so far.
    pub fn bytes_completed(&self) -> u64 {
        self.lock().bytes_completed
    }

    /// Ask every worker to stop at its next check.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Copy of the worker table, ordered by id.
    pub fn snapshot(&self) -> Vec<WorkerState> {
        self.lock().workers.values().cloned().collect()
    }
}

/// A worker's view of the shared state plus its cancellation token.
#[derive(Clone)]
pub struct WorkerHandle {
    id: WorkerId,
    shared: Arc<SharedState>,
    stalled: Arc<AtomicBool>,
}

impl WorkerHandle {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Set once the monitor or the job asks this worker to stop.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.stalled.load(Ordering::Acquire) {
            Some(StopReason::Stalled)
        } else if self.shared.is_shutdown() {
            Some(StopReason::Shutdown)
        } else {
            None
        }
    }

    pub fn should_stop(&self) -> bool {
        self.stop_reason().is_some()
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Acquire)
    }

    pub fn begin_segment(&self, index: usize) {
        self.shared.begin_segment(self.id, index);
    }

    pub fn end_segment(&self) {
        self.shared.end_segment(self.id);
    }

    /// Called for every chunk received; `received` counts the whole attempt.
    pub fn record_chunk(&self, index: usize, received: u64) {
        self.shared.record_chunk(self.id, index, received);
    }

    pub fn mark_stopped(&self) {
        self.shared.mark_stopped(self.id);
    }

    /// Sleep for `duration` unless told to stop first. Returns false if interrupted.
    pub fn pause(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.should_stop() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(PAUSE_STEP));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;

    fn shared(total: u64, segments: usize) -> Arc<SharedState> {
        Arc::new(SharedState::new(total, segments, Arc::new(NoopProgress)))
    }

    #[test]
    fn retried_bytes_are_not_double_counted() {
        let s = shared(100, 2);
        let w = s.register_worker(0);
        w.record_chunk(0, 30);
        w.record_chunk(0, 40);
        assert_eq!(s.bytes_completed(), 40);
        // Second attempt of the same segment starts over.
        w.record_chunk(0, 10);
        w.record_chunk(0, 40);
        assert_eq!(s.bytes_completed(), 40);
        w.record_chunk(0, 50);
        w.record_chunk(1, 50);
        assert_eq!(s.bytes_completed(), 100);
    }

    #[test]
    fn sink_sees_monotonic_counter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let sink = move |done: u64, total: Option<u64>| {
            assert_eq!(total, Some(10));
            seen2.lock().unwrap().push(done);
        };
        let s = Arc::new(SharedState::new(10, 1, Arc::new(sink)));
        let w = s.register_worker(0);
        for n in [2, 5, 3, 5, 10] {
            w.record_chunk(0, n);
        }
        assert_eq!(*seen.lock().unwrap(), vec![2, 5, 10]);
    }

    #[test]
    fn only_idle_workers_holding_a_segment_are_stalled() {
        let s = shared(100, 4);
        let busy = s.register_worker(0);
        let idle = s.register_worker(1);
        busy.begin_segment(2);
        let later = Instant::now() + Duration::from_secs(5);
        let marked = s.mark_stalled(Duration::from_secs(1), later);
        assert_eq!(marked, vec![0]);
        assert!(busy.is_stalled());
        assert_eq!(busy.stop_reason(), Some(StopReason::Stalled));
        assert!(!idle.should_stop());
        // Already stalled: not reported twice.
        assert!(s.mark_stalled(Duration::from_secs(1), later).is_empty());
        let table = s.snapshot();
        assert_eq!(table[0].lifecycle, WorkerLifecycle::Stalled);
        assert_eq!(table[1].lifecycle, WorkerLifecycle::Running);
    }

    #[test]
    fn recent_activity_prevents_stall() {
        let s = shared(100, 1);
        let w = s.register_worker(7);
        w.begin_segment(0);
        w.record_chunk(0, 1);
        assert!(s
            .mark_stalled(Duration::from_secs(60), Instant::now())
            .is_empty());
    }

    #[test]
    fn shutdown_interrupts_pause() {
        let s = shared(1, 1);
        let w = s.register_worker(0);
        s.request_shutdown();
        assert_eq!(w.stop_reason(), Some(StopReason::Shutdown));
        assert!(!w.pause(Duration::from_secs(10)));
        w.mark_stopped();
        assert_eq!(s.snapshot()[0].lifecycle, WorkerLifecycle::Stopped);
    }

    #[test]
    fn concurrent_chunks_sum_to_total() {
        let s = shared(8 * 1000, 8);
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let w = s.register_worker(i);
                thread::spawn(move || {
                    for n in 1..=1000 {
                        w.record_chunk(i, n);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(s.bytes_completed(), 8000);
    }
}
