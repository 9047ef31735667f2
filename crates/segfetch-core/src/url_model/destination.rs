//! Where a download is written.

use std::path::{Path, PathBuf};

use super::derive_filename;

/// Resolve the output path from the user's optional file and directory.
///
/// - file and dir: `dir/<file name of file>`
/// - dir only: `dir/<name derived from url>`
/// - file only: `file`, made absolute against `cwd`
/// - neither: `cwd/<name derived from url>`
pub fn resolve_destination(
    url: &str,
    file: Option<&Path>,
    dir: Option<&Path>,
    cwd: &Path,
) -> PathBuf {
    let absolute = |p: &Path| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            cwd.join(p)
        }
    };
    match (file, dir) {
        (Some(file), Some(dir)) => {
            let name = file
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(derive_filename(url)));
            absolute(dir).join(name)
        }
        (None, Some(dir)) => absolute(dir).join(derive_filename(url)),
        (Some(file), None) => absolute(file),
        (None, None) => cwd.join(derive_filename(url)),
    }
}
