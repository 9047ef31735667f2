//! RAII ownership of a dequeued segment.

use crate::queue::TaskQueue;
use crate::segmenter::Segment;

/// Puts the segment back in the queue when dropped unless it was settled
/// (completed, failed or explicitly requeued). Covers early returns and panics
/// inside the transfer.
pub(super) struct SegmentLease<'a> {
    queue: &'a TaskQueue,
    segment: Segment,
    settled: bool,
}

impl<'a> SegmentLease<'a> {
    pub(super) fn new(queue: &'a TaskQueue, segment: Segment) -> Self {
        Self {
            queue,
            segment,
            settled: false,
        }
    }

    pub(super) fn segment(&self) -> &Segment {
        &self.segment
    }

    pub(super) fn complete(mut self) {
        self.settled = true;
        self.queue.mark_done(self.segment.index);
    }

    pub(super) fn requeue(mut self) {
        self.settled = true;
        self.queue.enqueue(&self.segment);
    }

    pub(super) fn fail(mut self, attempts: u32, last_error: String) {
        self.settled = true;
        self.queue
            .mark_failed(self.segment.index, attempts, last_error);
    }
}

impl Drop for SegmentLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.queue.enqueue(&self.segment);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::SegmentStatus;
    use crate::segmenter::plan_segments;
    use std::time::Duration;

    #[test]
    fn dropped_lease_requeues() {
        let q = TaskQueue::new(plan_segments(10, 1, 1, None));
        let s = q.dequeue(Duration::ZERO).unwrap();
        drop(SegmentLease::new(&q, s));
        assert_eq!(q.status(s.index), Some(SegmentStatus::Pending));
        assert_eq!(q.pending_len(), 1);
    }

    #[test]
    fn completed_lease_stays_done() {
        let q = TaskQueue::new(plan_segments(10, 1, 1, None));
        let s = q.dequeue(Duration::ZERO).unwrap();
        SegmentLease::new(&q, s).complete();
        assert_eq!(q.status(s.index), Some(SegmentStatus::Done));
        assert_eq!(q.pending_len(), 0);
    }
}
