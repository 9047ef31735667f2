//! Local file naming: file name derived from the URL, and resolution of the
//! destination path from the optional file/directory the user gave.

mod destination;
mod path;
mod sanitize;

pub use destination::resolve_destination;
pub use path::last_path_segment;
pub use sanitize::sanitize_file_name;

/// Used when the URL has no usable last path segment.
pub const DEFAULT_FILENAME: &str = "download.bin";

/// File name for saving `url`: its last path segment without the query,
/// percent-decoded and sanitized; [`DEFAULT_FILENAME`] when nothing is left.
pub fn derive_filename(url: &str) -> String {
    let name = last_path_segment(url)
        .map(|s| sanitize_file_name(&s))
        .unwrap_or_default();
    if name.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        name
    }
}
