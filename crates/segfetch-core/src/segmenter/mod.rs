//! Range math and segment planning.
//!
//! Over-partitions a download into more segments than workers so a stalled
//! segment can be handed to another worker without idling the pool, and
//! provides the completion bitmap used by the task queue.

mod bitmap;
mod range;

pub use bitmap::SegmentBitmap;
pub use range::{plan_segments, Segment, DEFAULT_OVER_PARTITION};
