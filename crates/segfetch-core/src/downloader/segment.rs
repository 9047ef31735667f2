//! Single-segment HTTP Range GET streamed into a segment store.
//!
//! The response is validated before the first body byte is written: only a
//! 206 whose `Content-Range` names exactly the requested span is accepted.

use std::cell::RefCell;
use std::str;

use super::{RangeSource, TransferOptions};
use crate::pool::{StopReason, WorkerHandle};
use crate::retry::SegmentError;
use crate::segmenter::Segment;
use crate::storage::SegmentStore;

/// Range fetches against one URL with libcurl.
#[derive(Debug, Clone)]
pub struct CurlRangeSource {
    url: String,
    opts: TransferOptions,
}

impl CurlRangeSource {
    pub fn new(url: impl Into<String>, opts: TransferOptions) -> Self {
        Self {
            url: url.into(),
            opts,
        }
    }
}

impl RangeSource for CurlRangeSource {
    fn fetch(
        &self,
        segment: &Segment,
        store: &mut SegmentStore,
        worker: &WorkerHandle,
    ) -> Result<(), SegmentError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(&self.url).map_err(SegmentError::Curl)?;
        easy.follow_location(true).map_err(SegmentError::Curl)?;
        easy.max_redirections(10).map_err(SegmentError::Curl)?;
        easy.connect_timeout(self.opts.request_timeout)
            .map_err(SegmentError::Curl)?;
        // No byte for request_timeout aborts the attempt; the stall timeout is separate.
        easy.low_speed_limit(1).map_err(SegmentError::Curl)?;
        easy.low_speed_time(self.opts.request_timeout)
            .map_err(SegmentError::Curl)?;
        easy.buffer_size(self.opts.curl_buffer_size())
            .map_err(SegmentError::Curl)?;
        easy.progress(true).map_err(SegmentError::Curl)?;
        easy.range(&segment.curl_range()).map_err(SegmentError::Curl)?;

        let state = RefCell::new(SegmentTransfer::new(*segment, store, worker));
        let perform_result = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    state.borrow_mut().on_header(data);
                    true
                })
                .map_err(SegmentError::Curl)?;
            transfer
                .write_function(|data| Ok(state.borrow_mut().on_data(data)))
                .map_err(SegmentError::Curl)?;
            transfer
                .progress_function(|_, _, _, _| state.borrow_mut().keep_going())
                .map_err(SegmentError::Curl)?;
            transfer.perform()
        };

        let mut state = state.into_inner();
        if let Some(e) = state.failure.take() {
            return Err(e);
        }
        perform_result.map_err(SegmentError::Curl)?;

        let code = easy.response_code().map_err(SegmentError::Curl)?;
        state.finish(code)
    }
}

/// Per-attempt transfer state driven by the curl callbacks.
struct SegmentTransfer<'a> {
    segment: Segment,
    store: &'a mut SegmentStore,
    worker: &'a WorkerHandle,
    headers: Vec<String>,
    validated: bool,
    received: u64,
    /// First error seen inside a callback; the transfer is aborted right after.
    failure: Option<SegmentError>,
}

impl<'a> SegmentTransfer<'a> {
    fn new(segment: Segment, store: &'a mut SegmentStore, worker: &'a WorkerHandle) -> Self {
        Self {
            segment,
            store,
            worker,
            headers: Vec::new(),
            validated: false,
            received: 0,
            failure: None,
        }
    }

    fn on_header(&mut self, data: &[u8]) {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            if line.starts_with("HTTP/") {
                self.headers.clear();
            }
            self.headers.push(line.to_string());
        }
    }

    /// Returns the number of bytes consumed; anything short of `data.len()`
    /// makes curl abort the transfer.
    fn on_data(&mut self, data: &[u8]) -> usize {
        if self.check_stop() {
            return 0;
        }
        if !self.validated {
            if let Err(e) = self.validate() {
                self.failure = Some(e);
                return 0;
            }
            self.validated = true;
        }
        let received = self.received + data.len() as u64;
        if received > self.segment.len() {
            self.failure = Some(SegmentError::PartialTransfer {
                expected: self.segment.len(),
                received,
            });
            return 0;
        }
        if let Err(e) = self.store.append(data) {
            self.failure = Some(SegmentError::Storage(e));
            return 0;
        }
        self.received = received;
        self.worker.record_chunk(self.segment.index, received);
        data.len()
    }

    /// Progress callback: false aborts the transfer.
    fn keep_going(&mut self) -> bool {
        !self.check_stop()
    }

    fn check_stop(&mut self) -> bool {
        match self.worker.stop_reason() {
            None => false,
            Some(reason) => {
                if self.failure.is_none() {
                    self.failure = Some(match reason {
                        StopReason::Stalled => SegmentError::Stalled,
                        StopReason::Shutdown => SegmentError::Cancelled,
                    });
                }
                true
            }
        }
    }

    fn validate(&self) -> Result<(), SegmentError> {
        match parse_http_status(&self.headers) {
            Some(206) => {
                let expected = (self.segment.start, self.segment.end);
                let got = parse_content_range(&self.headers);
                if got == Some(expected) {
                    Ok(())
                } else {
                    Err(SegmentError::ContentRangeMismatch { expected, got })
                }
            }
            Some(200) => Err(SegmentError::RangeIgnored),
            Some(code) => Err(SegmentError::Http(code)),
            None => Err(SegmentError::Http(0)),
        }
    }

    /// Verdict once curl reports the transfer complete.
    fn finish(self, code: u32) -> Result<(), SegmentError> {
        match code {
            206 => {}
            200 => return Err(SegmentError::RangeIgnored),
            other => return Err(SegmentError::Http(other)),
        }
        if self.received != self.segment.len() {
            return Err(SegmentError::PartialTransfer {
                expected: self.segment.len(),
                received: self.received,
            });
        }
        Ok(())
    }
}

/// Status code from the most recent `HTTP/` status line.
pub fn parse_http_status(lines: &[String]) -> Option<u32> {
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("HTTP/"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
}

/// `Content-Range: bytes start-end/total` → `(start, end)`, both inclusive.
pub fn parse_content_range(lines: &[String]) -> Option<(u64, u64)> {
    lines.iter().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if !name.trim().eq_ignore_ascii_case("content-range") {
            return None;
        }
        let value = value.trim();
        let spec = value
            .strip_prefix("bytes")
            .map(str::trim_start)?
            .split('/')
            .next()?;
        let (start, end) = spec.split_once('-')?;
        let start = start.trim().parse().ok()?;
        let end = end.trim().parse().ok()?;
        (start <= end).then_some((start, end))
    })
}
