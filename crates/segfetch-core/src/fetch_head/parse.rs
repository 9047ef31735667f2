//! Parse HTTP response header lines into HeadResult.

/// Key headers of a HEAD response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResult {
    /// Total size in bytes, if `Content-Length` is present.
    pub content_length: Option<u64>,
    /// True if server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
}

/// Parse collected header lines into HeadResult.
pub fn parse_headers(lines: &[String]) -> HeadResult {
    let mut out = HeadResult::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            out.content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            out.accept_ranges = value
                .split(',')
                .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"));
        }
    }

    out
}
