//! Segment failure classification and retry/backoff policy.
//!
//! Workers never give up on a segment after one failure: they classify the
//! error, ask the policy for a backoff, and re-enqueue the same segment.
//! Stalls and shutdown are not failures of the segment and bypass the policy.

mod classify;
mod error;
mod policy;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::SegmentError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
