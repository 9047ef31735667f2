//! Worker pool and its supervisor.
//!
//! The calling thread supervises: it starts `min(workers, segments)` worker
//! threads, replaces workers the liveness monitor flagged as stalled (up to a
//! replacement budget) and returns once the queue is finished. Worker ids come
//! from a monotonically increasing allocator and are never reused.

mod lease;
mod state;
mod worker;

pub use state::{SharedState, StopReason, WorkerHandle, WorkerId, WorkerLifecycle, WorkerState};
pub use worker::WorkerExit;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::downloader::RangeSource;
use crate::error::FetchError;
use crate::queue::TaskQueue;
use crate::retry::RetryPolicy;
use worker::Worker;

/// How often the supervisor re-checks the pool when nothing finishes.
const SUPERVISOR_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Target number of concurrently running workers.
    pub workers: usize,
    /// Replacement workers allowed over the whole job.
    pub max_replacements: usize,
    pub retry: RetryPolicy,
    /// Longest a worker blocks in one dequeue before re-checking its stop flag.
    pub dequeue_wait: Duration,
    /// Final output path; segment stores are created next to it.
    pub destination: PathBuf,
}

/// Counters reported once the pool is done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolOutcome {
    /// Worker threads started, replacements included.
    pub spawned: usize,
    pub replacements: usize,
    /// Workers that exited because they were flagged stalled.
    pub stalls: usize,
}

/// Starts a worker's thread; swapped out in tests to simulate spawn failures.
type SpawnFn = fn(thread::Builder, Worker) -> io::Result<JoinHandle<WorkerExit>>;

fn spawn_worker_thread(
    builder: thread::Builder,
    worker: Worker,
) -> io::Result<JoinHandle<WorkerExit>> {
    builder.spawn(move || worker.run())
}

struct LiveWorker {
    handle: WorkerHandle,
    thread: JoinHandle<WorkerExit>,
}

struct Supervisor<'a> {
    settings: &'a PoolSettings,
    queue: &'a Arc<TaskQueue>,
    shared: &'a Arc<SharedState>,
    source: Arc<dyn RangeSource>,
    spawn_thread: SpawnFn,
    next_id: WorkerId,
    live: Vec<LiveWorker>,
    outcome: PoolOutcome,
}

impl<'a> Supervisor<'a> {
    fn new(
        settings: &'a PoolSettings,
        queue: &'a Arc<TaskQueue>,
        shared: &'a Arc<SharedState>,
        source: Arc<dyn RangeSource>,
    ) -> Self {
        Supervisor {
            settings,
            queue,
            shared,
            source,
            spawn_thread: spawn_worker_thread,
            next_id: 0,
            live: Vec::new(),
            outcome: PoolOutcome::default(),
        }
    }

    fn spawn(&mut self) -> bool {
        let id = self.next_id;
        self.next_id += 1;
        let handle = self.shared.register_worker(id);
        let worker = Worker {
            handle: handle.clone(),
            queue: Arc::clone(self.queue),
            source: Arc::clone(&self.source),
            policy: self.settings.retry,
            dequeue_wait: self.settings.dequeue_wait,
            destination: self.settings.destination.clone(),
        };
        let builder = thread::Builder::new().name(format!("segfetch-worker-{}", id));
        match (self.spawn_thread)(builder, worker) {
            Ok(thread) => {
                self.live.push(LiveWorker { handle, thread });
                self.outcome.spawned += 1;
                true
            }
            Err(e) => {
                tracing::error!(worker = id, "failed to spawn worker thread: {}", e);
                handle.mark_stopped();
                false
            }
        }
    }

    /// Join every worker whose thread has ended.
    fn reap(&mut self) {
        let (done, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.live)
            .into_iter()
            .partition(|w| w.thread.is_finished());
        self.live = running;
        for w in done {
            self.join(w);
        }
    }

    fn join(&mut self, w: LiveWorker) {
        let id = w.handle.id();
        match w.thread.join() {
            Ok(WorkerExit::Stalled) => self.outcome.stalls += 1,
            Ok(_) => {}
            Err(_) => {
                tracing::error!(worker = id, "worker thread panicked");
                w.handle.mark_stopped();
            }
        }
    }

    /// Workers still counted toward the target: alive and not flagged stalled.
    fn active(&self) -> usize {
        self.live.iter().filter(|w| !w.handle.is_stalled()).count()
    }

    fn replace_missing(&mut self, target: usize) {
        let missing = target.saturating_sub(self.active());
        let budget = self
            .settings
            .max_replacements
            .saturating_sub(self.outcome.replacements);
        for _ in 0..missing.min(budget) {
            let id = self.next_id;
            if self.spawn() {
                self.outcome.replacements += 1;
                tracing::info!(worker = id, "spawned replacement worker");
            }
        }
    }

    fn shutdown(&mut self) {
        self.shared.request_shutdown();
        for w in std::mem::take(&mut self.live) {
            self.join(w);
        }
    }
}

/// Runs workers over `queue` until every segment is done, a segment exhausts
/// its retries, or no worker is left to make progress.
pub fn run_pool(
    settings: &PoolSettings,
    queue: &Arc<TaskQueue>,
    shared: &Arc<SharedState>,
    source: Arc<dyn RangeSource>,
) -> Result<PoolOutcome, FetchError> {
    let target = settings.workers.max(1).min(queue.len());
    let mut sup = Supervisor::new(settings, queue, shared, source);
    for _ in 0..target {
        sup.spawn();
    }
    tracing::debug!(workers = sup.live.len(), segments = queue.len(), "pool started");

    let result = loop {
        let finished = queue.wait_finished(SUPERVISOR_TICK);
        sup.reap();
        if finished {
            break Ok(());
        }
        sup.replace_missing(target);
        if sup.live.is_empty() {
            break Err(FetchError::FatalExhaustion {
                unfinished: queue.unfinished().len(),
                replacements: sup.outcome.replacements,
            });
        }
    };
    sup.shutdown();
    result?;

    if let Some(f) = queue.failure() {
        return Err(FetchError::SegmentRetriesExhausted {
            index: f.index,
            attempts: f.attempts,
            last_error: f.last_error,
        });
    }
    Ok(sup.outcome)
}
