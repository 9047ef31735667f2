//! Segment stores: one on-disk artifact per segment index.
//!
//! Lifecycle: create (truncating any leftover from an earlier attempt) →
//! append → finalize (flush + fsync) → consumed by the reassembler → deleted.
//! Stores live next to the destination as `<destination>.part<index>`.

mod store;

pub use store::SegmentStore;

use std::path::{Path, PathBuf};

/// Suffix stem for segment stores; the segment index is appended.
pub const STORE_SUFFIX: &str = ".part";

/// Path of the store for segment `index` (e.g. `file.iso` → `file.iso.part3`).
pub fn store_path(final_path: &Path, index: usize) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(format!("{}{}", STORE_SUFFIX, index));
    PathBuf::from(o)
}

/// Path for a single-stream download in progress (e.g. `file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(STORE_SUFFIX);
    PathBuf::from(o)
}
