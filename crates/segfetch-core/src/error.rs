//! Job-level error taxonomy returned by [`crate::Fetcher::download`].
//!
//! Probe failures, per-segment fetch failures and stalls are recovered inside the
//! engine (fallback, re-enqueue, reassignment) and never reach this type. What is
//! left here is what the caller has to act on.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Job parameters out of range (empty URL, worker count, zero timeouts).
    #[error("invalid download job: {0}")]
    InvalidJob(String),

    /// One segment kept failing until its attempt budget ran out.
    #[error("segment {index} failed after {attempts} attempt(s): {last_error}")]
    SegmentRetriesExhausted {
        index: usize,
        attempts: u32,
        last_error: String,
    },

    /// Every worker stopped with work left and no replacement budget remained.
    #[error(
        "all workers stopped with {unfinished} segment(s) unfinished \
         after {replacements} replacement worker(s)"
    )]
    FatalExhaustion {
        unfinished: usize,
        replacements: usize,
    },

    /// Segment stores were missing at merge time. The destination holds a
    /// best-effort concatenation of the stores that did exist.
    #[error("reassembly incomplete: {} segment store(s) missing {missing:?}", missing.len())]
    ReassemblyFailure {
        missing: Vec<usize>,
        bytes_written: u64,
    },

    /// Single-stream download (used when range probing fails) did not complete.
    #[error("single-stream download failed: {0}")]
    Fallback(String),

    #[error("{context} ({}): {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        FetchError::Io {
            context,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembly_failure_lists_missing_indices() {
        let e = FetchError::ReassemblyFailure {
            missing: vec![2, 5],
            bytes_written: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("2 segment store(s)"), "{}", msg);
        assert!(msg.contains("[2, 5]"), "{}", msg);
    }

    #[test]
    fn io_error_names_path_and_keeps_source() {
        let e = FetchError::io(
            "create destination",
            "/tmp/out.bin",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(e.to_string().contains("/tmp/out.bin"));
        assert!(std::error::Error::source(&e).is_some());
    }
}
