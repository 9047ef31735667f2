//! Reassembler: concatenate finished segment stores into the destination.
//!
//! Stores are appended in ascending index order regardless of the order they
//! completed in, and each is deleted once copied. A missing store is skipped
//! and reported, so a failed job still leaves a best-effort file behind.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use crate::error::FetchError;

/// What the merge produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReassemblyReport {
    pub bytes_written: u64,
    /// Planned indices whose store was absent, ascending.
    pub missing: Vec<usize>,
}

impl ReassemblyReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Write every store in `stores` (keyed by segment index) for indices
/// `0..planned` into `destination`, truncating it first.
///
/// Errors only on I/O failures of the destination or of reading a store that
/// exists; absent stores end up in [`ReassemblyReport::missing`].
pub fn reassemble(
    destination: &Path,
    stores: &BTreeMap<usize, PathBuf>,
    planned: usize,
) -> Result<ReassemblyReport, FetchError> {
    let file = File::create(destination)
        .map_err(|e| FetchError::io("create destination", destination, e))?;
    let mut out = BufWriter::new(file);
    let mut report = ReassemblyReport::default();

    for index in 0..planned {
        let Some(path) = stores.get(&index) else {
            report.missing.push(index);
            continue;
        };
        let mut input = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                report.missing.push(index);
                continue;
            }
            Err(e) => return Err(FetchError::io("open segment store", path, e)),
        };
        let copied = io::copy(&mut input, &mut out)
            .map_err(|e| FetchError::io("copy segment store", path, e))?;
        report.bytes_written += copied;
        drop(input);
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), "could not delete segment store: {}", e);
        }
    }

    let file = out
        .into_inner()
        .map_err(|e| FetchError::io("flush destination", destination, e.into_error()))?;
    file.sync_all()
        .map_err(|e| FetchError::io("sync destination", destination, e))?;

    if report.is_complete() {
        tracing::debug!(
            path = %destination.display(),
            bytes = report.bytes_written,
            segments = planned,
            "reassembled"
        );
    } else {
        tracing::warn!(
            path = %destination.display(),
            missing = ?report.missing,
            "reassembled with missing segments"
        );
    }
    Ok(report)
}
