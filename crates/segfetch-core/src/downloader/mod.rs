//! Network side of the engine: per-segment range fetches and the
//! single-stream fallback, both on libcurl's easy interface.

mod segment;
mod single;

pub use segment::{parse_content_range, parse_http_status, CurlRangeSource};
pub use single::single_stream_fetch;

use std::time::Duration;

use crate::pool::WorkerHandle;
use crate::retry::SegmentError;
use crate::segmenter::Segment;
use crate::storage::SegmentStore;

/// libcurl refuses receive buffers larger than this (CURL_MAX_READ_SIZE).
const CURL_MAX_BUFFER: usize = 512 * 1024;
/// ...and smaller than this.
const CURL_MIN_BUFFER: usize = 1024;

/// Per-request transfer settings shared by every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Requested size of one network read.
    pub chunk_size: usize,
    /// Connect timeout, and the longest a transfer may go without receiving a byte.
    pub request_timeout: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl TransferOptions {
    /// `chunk_size` clamped to what libcurl accepts as a receive buffer.
    pub fn curl_buffer_size(&self) -> usize {
        self.chunk_size.clamp(CURL_MIN_BUFFER, CURL_MAX_BUFFER)
    }
}

/// Fetches one segment's bytes into its store.
///
/// Implementations append exactly the segment's bytes, report the cumulative
/// count through [`WorkerHandle::record_chunk`] after every chunk, and return
/// [`SegmentError::Stalled`] or [`SegmentError::Cancelled`] promptly once the
/// handle reports a stop reason.
pub trait RangeSource: Send + Sync {
    fn fetch(
        &self,
        segment: &Segment,
        store: &mut SegmentStore,
        worker: &WorkerHandle,
    ) -> Result<(), SegmentError>;
}
