//! Append-only writer for one segment store.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Exclusively owned by the worker fetching the segment until finalized.
pub struct SegmentStore {
    file: BufWriter<File>,
    path: PathBuf,
    written: u64,
}

impl SegmentStore {
    /// Create (or truncate) the store at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(SegmentStore {
            file: BufWriter::new(file),
            path: path.to_path_buf(),
            written: 0,
        })
    }

    /// Append `data` at the end of the store.
    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes appended so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and sync; after this the store belongs to the reassembler.
    pub fn finalize(self) -> io::Result<()> {
        let file = self.file.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }

    /// Drop the partial store from disk (failed or abandoned attempt).
    pub fn discard(self) {
        let path = self.path.clone();
        drop(self.file);
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::debug!(path = %path.display(), "could not remove partial store: {}", e);
        }
    }
}
