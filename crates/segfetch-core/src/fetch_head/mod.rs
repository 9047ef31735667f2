//! Range probing: HTTP HEAD against the target URL.
//!
//! Uses the curl crate (libcurl) to read `Content-Length` and
//! `Accept-Ranges: bytes`. Probing never fails hard: any network error,
//! non-2xx status or missing length reports `range_supported = false`, which
//! sends the caller down the single-stream path.

mod parse;

pub use parse::{parse_headers, HeadResult};

use std::str;
use std::time::Duration;

/// What the segmented engine needs to know about the remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Total size in bytes, when the server reported it.
    pub total_size: Option<u64>,
    /// True only when the length is known and the server advertises byte ranges.
    pub range_supported: bool,
}

impl ProbeResult {
    fn unsupported(total_size: Option<u64>) -> Self {
        Self {
            total_size,
            range_supported: false,
        }
    }
}

impl From<&HeadResult> for ProbeResult {
    fn from(head: &HeadResult) -> Self {
        Self {
            total_size: head.content_length,
            range_supported: head.content_length.is_some() && head.accept_ranges,
        }
    }
}

/// Performs a HEAD request and reports size and range support.
///
/// Follows redirects. `timeout` bounds connect and the whole request.
/// Runs in the current thread.
pub fn probe(url: &str, timeout: Duration) -> ProbeResult {
    match head(url, timeout) {
        Ok(head) => {
            let result = ProbeResult::from(&head);
            if !result.range_supported {
                tracing::warn!(
                    url,
                    content_length = ?head.content_length,
                    accept_ranges = head.accept_ranges,
                    "server does not support segmented download"
                );
            }
            result
        }
        Err(e) => {
            tracing::warn!(url, "range probe failed: {:#}", e);
            ProbeResult::unsupported(None)
        }
    }
}

/// Raw HEAD request returning every header the engine looks at.
pub fn head(url: &str, timeout: Duration) -> anyhow::Result<HeadResult> {
    use anyhow::Context;

    let mut headers: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.nobody(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(timeout)?;
    easy.timeout(timeout)?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                let line = s.trim_end();
                // Redirect hops each send their own header block; keep only the last.
                if line.starts_with("HTTP/") {
                    headers.clear();
                }
                headers.push(line.to_string());
            }
            true
        })?;
        transfer.perform().context("HEAD request failed")?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("HEAD {} returned HTTP {}", url, code);
    }

    Ok(parse_headers(&headers))
}
