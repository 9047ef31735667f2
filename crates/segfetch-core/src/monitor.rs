//! Liveness monitor: periodic scan for workers that stopped receiving bytes.
//!
//! The monitor only flags; the worker notices its flag inside the transfer
//! callbacks, requeues its segment and exits, and the pool supervisor spawns a
//! replacement.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::pool::{SharedState, WorkerId};

/// Background thread scanning the worker table every `interval`.
pub struct LivenessMonitor {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl LivenessMonitor {
    pub fn spawn(
        shared: Arc<SharedState>,
        interval: Duration,
        stall_timeout: Duration,
    ) -> io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = thread::Builder::new()
            .name("segfetch-monitor".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        scan(&shared, stall_timeout, Instant::now());
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Self { stop_tx, thread })
    }

    /// Stop scanning and wait for the thread.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.thread.join().is_err() {
            tracing::error!("liveness monitor thread panicked");
        }
    }
}

/// One pass: flag running workers idle for longer than `stall_timeout`.
pub fn scan(shared: &SharedState, stall_timeout: Duration, now: Instant) -> Vec<WorkerId> {
    let stalled = shared.mark_stalled(stall_timeout, now);
    for id in &stalled {
        tracing::warn!(
            worker = id,
            stall_timeout_secs = stall_timeout.as_secs_f64(),
            "no bytes received within stall timeout, marking worker stalled"
        );
    }
    stalled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;

    fn shared() -> Arc<SharedState> {
        Arc::new(SharedState::new(100, 2, Arc::new(NoopProgress)))
    }

    #[test]
    fn scan_flags_idle_worker_with_segment() {
        let s = shared();
        let w = s.register_worker(3);
        w.begin_segment(1);
        let now = Instant::now() + Duration::from_secs(2);
        assert_eq!(scan(&s, Duration::from_secs(1), now), vec![3]);
        assert!(w.is_stalled());
    }

    #[test]
    fn background_thread_flags_and_stops() {
        let s = shared();
        let w = s.register_worker(0);
        w.begin_segment(0);
        let monitor = LivenessMonitor::spawn(
            Arc::clone(&s),
            Duration::from_millis(10),
            Duration::from_millis(30),
        )
        .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !w.is_stalled() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        monitor.stop();
        assert!(w.is_stalled());
    }

    #[test]
    fn active_worker_is_left_alone() {
        let s = shared();
        let w = s.register_worker(0);
        w.begin_segment(0);
        let monitor = LivenessMonitor::spawn(
            Arc::clone(&s),
            Duration::from_millis(10),
            Duration::from_millis(200),
        )
        .unwrap();
        for n in 1..=20 {
            w.record_chunk(0, n);
            thread::sleep(Duration::from_millis(10));
        }
        monitor.stop();
        assert!(!w.is_stalled());
    }
}
