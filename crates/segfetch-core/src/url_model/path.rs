//! Last path segment of a URL.

use percent_encoding::percent_decode_str;

/// Last non-empty path segment of `url`, query and fragment removed and
/// percent-decoded. Strings the `url` crate rejects are split by hand.
pub fn last_path_segment(url: &str) -> Option<String> {
    let raw = match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()?
            .filter(|s| !s.is_empty())
            .last()?
            .to_string(),
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or_default();
            path.rsplit('/').find(|s| !s.is_empty())?.to_string()
        }
    };
    let decoded = percent_decode_str(&raw).decode_utf8_lossy().into_owned();
    Some(decoded).filter(|s| !s.is_empty())
}
