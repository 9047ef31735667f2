//! Minimal HTTP/1.1 server for integration tests: HEAD, GET and Range GET
//! over one static body, with scripted faults.
//!
//! Faults are keyed by the start offset of the requested range: fail the first
//! N requests with 500, or send part of the body and then go silent once.
//! Every request is logged so tests can check which ranges were asked for.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// If false, HEAD returns 405 (servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes` even when ranges work.
    pub advertise_ranges: bool,
    /// Range start → number of leading requests answered with 500.
    pub fail_first: HashMap<u64, u32>,
    /// Range starts whose first request stalls after a few bytes.
    pub stall_once: HashSet<u64>,
    /// How long a stalled response stays silent before the server hangs up.
    pub stall_for: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            advertise_ranges: true,
            fail_first: HashMap::new(),
            stall_once: HashSet::new(),
            stall_for: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedRequest {
    pub method: String,
    /// Inclusive range from the `Range` header, if any.
    pub range: Option<(u64, u64)>,
}

struct ServerState {
    body: Vec<u8>,
    opts: ServerOptions,
    failures_left: Mutex<HashMap<u64, u32>>,
    stalls_left: Mutex<HashSet<u64>>,
    log: Mutex<Vec<LoggedRequest>>,
}

pub struct RangeServer {
    base: String,
    state: Arc<ServerState>,
}

impl RangeServer {
    /// Serve `body` with default options.
    pub fn start(body: Vec<u8>) -> Self {
        Self::start_with(body, ServerOptions::default())
    }

    /// Serve `body` from a background thread until the process exits.
    pub fn start_with(body: Vec<u8>, opts: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(ServerState {
            failures_left: Mutex::new(opts.fail_first.clone()),
            stalls_left: Mutex::new(opts.stall_once.clone()),
            log: Mutex::new(Vec::new()),
            body,
            opts,
        });
        let accept_state = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&accept_state);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    /// URL of the served body under `/name`.
    pub fn url(&self, name: &str) -> String {
        format!("{}/{}", self.base, name)
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.state.log.lock().unwrap().clone()
    }

    /// Every range requested by a GET, in arrival order.
    pub fn requested_ranges(&self) -> Vec<(u64, u64)> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "GET")
            .filter_map(|r| r.range)
            .collect()
    }
}

fn handle(mut stream: TcpStream, state: &ServerState) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let Some((method, range)) = read_request(&mut stream) else {
        return;
    };
    state.log.lock().unwrap().push(LoggedRequest {
        method: method.clone(),
        range,
    });

    let opts = &state.opts;
    let body = &state.body[..];
    let total = body.len() as u64;
    let accept_ranges = if opts.advertise_ranges && opts.support_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    match method.as_str() {
        "HEAD" if opts.head_allowed => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
                total, accept_ranges
            );
            let _ = stream.write_all(head.as_bytes());
        }
        "GET" => {
            let range = range.filter(|_| opts.support_ranges);
            let Some((start, end)) = range else {
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
                    total, accept_ranges
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(body);
                return;
            };
            if take_failure(state, start) {
                let _ = stream.write_all(
                    b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                );
                return;
            }
            let end = end.min(total.saturating_sub(1));
            if start > end {
                let head = format!(
                    "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    total
                );
                let _ = stream.write_all(head.as_bytes());
                return;
            }
            let slice = &body[start as usize..=end as usize];
            let head = format!(
                "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\n{}Connection: close\r\n\r\n",
                slice.len(),
                start,
                end,
                total,
                accept_ranges
            );
            let _ = stream.write_all(head.as_bytes());
            if take_stall(state, start) {
                let _ = stream.write_all(&slice[..slice.len().min(16) / 2]);
                let _ = stream.flush();
                thread::sleep(opts.stall_for);
                return;
            }
            let _ = stream.write_all(slice);
        }
        _ => {
            let _ = stream.write_all(
                b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
    }
}

fn take_failure(state: &ServerState, start: u64) -> bool {
    let mut left = state.failures_left.lock().unwrap();
    match left.get_mut(&start) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    }
}

fn take_stall(state: &ServerState, start: u64) -> bool {
    state.stalls_left.lock().unwrap().remove(&start)
}

/// Reads the request head; returns (method, optional inclusive range).
fn read_request(stream: &mut TcpStream) -> Option<(String, Option<(u64, u64)>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let text = String::from_utf8_lossy(&buf);
    let mut lines = text.lines();
    let method = lines.next()?.split_whitespace().next()?.to_string();
    let mut range = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("range") {
            continue;
        }
        let spec = value.trim().strip_prefix("bytes=")?;
        let (a, b) = spec.split_once('-')?;
        let start = a.trim().parse().ok()?;
        let end = match b.trim() {
            "" => u64::MAX,
            b => b.parse().ok()?,
        };
        range = Some((start, end));
    }
    Some((method, range))
}
