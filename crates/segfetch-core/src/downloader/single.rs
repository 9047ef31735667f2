//! Single-stream HTTP GET (used when the server cannot serve ranges).
//!
//! Streams the whole body into `<destination>.part` and renames it over the
//! destination only once the transfer succeeded.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::TransferOptions;
use crate::error::FetchError;
use crate::progress::ProgressSink;
use crate::storage::temp_path;

/// Downloads `url` with one plain GET into `destination`.
///
/// `expected_len` (from the probe, when known) is reported as the progress
/// total and checked against the byte count. Returns the number of bytes written.
pub fn single_stream_fetch(
    url: &str,
    destination: &Path,
    expected_len: Option<u64>,
    opts: &TransferOptions,
    progress: &dyn ProgressSink,
) -> Result<u64, FetchError> {
    let tmp = temp_path(destination);
    let result = fetch_into(url, &tmp, expected_len, opts, progress);
    match result {
        Ok(written) => {
            fs::rename(&tmp, destination)
                .map_err(|e| FetchError::io("rename downloaded file", destination, e))?;
            Ok(written)
        }
        Err(e) => {
            if let Err(rm) = fs::remove_file(&tmp) {
                tracing::debug!(path = %tmp.display(), "could not remove partial download: {}", rm);
            }
            Err(e)
        }
    }
}

fn fetch_into(
    url: &str,
    tmp: &Path,
    expected_len: Option<u64>,
    opts: &TransferOptions,
    progress: &dyn ProgressSink,
) -> Result<u64, FetchError> {
    let file = File::create(tmp).map_err(|e| FetchError::io("create download file", tmp, e))?;
    let mut out = BufWriter::new(file);
    let mut written = 0u64;
    let mut write_error: Option<io::Error> = None;

    let curl_err = |e: curl::Error| FetchError::Fallback(format!("GET {}: {}", url, e));

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.max_redirections(10).map_err(curl_err)?;
    easy.connect_timeout(opts.request_timeout).map_err(curl_err)?;
    easy.low_speed_limit(1).map_err(curl_err)?;
    easy.low_speed_time(opts.request_timeout).map_err(curl_err)?;
    easy.buffer_size(opts.curl_buffer_size()).map_err(curl_err)?;
    easy.fail_on_error(true).map_err(curl_err)?;

    let perform_result = {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                if let Err(e) = out.write_all(data) {
                    write_error = Some(e);
                    return Ok(0);
                }
                written += data.len() as u64;
                progress.on_progress(written, expected_len);
                Ok(data.len())
            })
            .map_err(curl_err)?;
        transfer.perform()
    };

    if let Some(e) = write_error {
        return Err(FetchError::io("write download file", tmp, e));
    }
    if let Err(e) = perform_result {
        let code = easy.response_code().unwrap_or(0);
        return Err(if code >= 400 {
            FetchError::Fallback(format!("GET {} returned HTTP {}", url, code))
        } else {
            curl_err(e)
        });
    }

    if let Some(exp) = expected_len {
        if written != exp {
            return Err(FetchError::Fallback(format!(
                "partial transfer: wrote {} of {} bytes",
                written, exp
            )));
        }
    }

    let file = out
        .into_inner()
        .map_err(|e| FetchError::io("flush download file", tmp, e.into_error()))?;
    file.sync_all()
        .map_err(|e| FetchError::io("sync download file", tmp, e))?;
    tracing::debug!(url, bytes = written, "single-stream download complete");
    Ok(written)
}
