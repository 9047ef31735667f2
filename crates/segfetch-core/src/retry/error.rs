//! Segment download error type for retry classification.

use std::fmt;

/// Error returned by a single segment attempt. Recovered by re-enqueue; only
/// surfaces (as text) when a segment's attempt budget runs out.
#[derive(Debug)]
pub enum SegmentError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// Response status was neither 206 nor 200.
    Http(u32),
    /// Server answered 200 with the full body: it ignored the Range header.
    RangeIgnored,
    /// 206 whose `Content-Range` does not match the requested span.
    ContentRangeMismatch {
        expected: (u64, u64),
        got: Option<(u64, u64)>,
    },
    /// Byte count differs from the segment length (server closed early or overran).
    PartialTransfer { expected: u64, received: u64 },
    /// Writing the segment store failed.
    Storage(std::io::Error),
    /// The liveness monitor marked the worker stalled mid-transfer.
    Stalled,
    /// The job is shutting down.
    Cancelled,
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentError::Curl(e) => write!(f, "{}", e),
            SegmentError::Http(code) => write!(f, "HTTP {}", code),
            SegmentError::RangeIgnored => write!(f, "server ignored Range header (HTTP 200)"),
            SegmentError::ContentRangeMismatch { expected, got } => match got {
                Some((s, e)) => write!(
                    f,
                    "Content-Range {}-{} does not match requested {}-{}",
                    s, e, expected.0, expected.1
                ),
                None => write!(
                    f,
                    "missing Content-Range for requested {}-{}",
                    expected.0, expected.1
                ),
            },
            SegmentError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            SegmentError::Storage(e) => write!(f, "storage: {}", e),
            SegmentError::Stalled => write!(f, "worker stalled"),
            SegmentError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SegmentError::Curl(e) => Some(e),
            SegmentError::Storage(e) => Some(e),
            _ => None,
        }
    }
}
