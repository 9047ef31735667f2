//! Segment type and range planning.

/// Segments planned per worker when the caller does not say otherwise.
pub const DEFAULT_OVER_PARTITION: usize = 2;

/// A contiguous byte range of the remote resource: [start, end], both inclusive.
///
/// The index is assigned once by the planner and identifies the segment (and its
/// store) across re-enqueues; the range never changes after planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    pub index: usize,
    /// First byte offset (inclusive).
    pub start: u64,
    /// Last byte offset (inclusive).
    pub end: u64,
}

impl Segment {
    /// Length of this segment in bytes (always >= 1 for planned segments).
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// HTTP Range header value: `bytes=start-end`.
    pub fn range_header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// Range in the form curl's `CURLOPT_RANGE` expects: `start-end`.
    pub fn curl_range(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// Builds a segment plan for `total_size` bytes fetched by `workers` workers.
///
/// Plans `workers * over_partition` segments of `total_size / count` bytes, the
/// last one absorbing the remainder. The count is capped at `total_size` so no
/// segment is smaller than one byte, and by `min_segment_size` when given.
/// Returns an empty plan for `total_size == 0`. Zero `workers` or
/// `over_partition` are treated as 1.
pub fn plan_segments(
    total_size: u64,
    workers: usize,
    over_partition: usize,
    min_segment_size: Option<u64>,
) -> Vec<Segment> {
    if total_size == 0 {
        return Vec::new();
    }

    let target = (workers.max(1) as u64).saturating_mul(over_partition.max(1) as u64);
    let mut count = target.min(total_size);
    if let Some(min) = min_segment_size.filter(|&m| m > 0) {
        count = count.min((total_size / min).max(1));
    }

    let len = total_size / count;
    let mut out = Vec::with_capacity(count as usize);
    for i in 0..count {
        let start = i * len;
        let end = if i == count - 1 {
            total_size - 1
        } else {
            start + len - 1
        };
        out.push(Segment {
            index: i as usize,
            start,
            end,
        });
    }
    out
}
