//! `segfetch get`: download one URL with the segmented engine.

use anyhow::{Context, Result};
use segfetch_core::config::FetchConfig;
use segfetch_core::url_model::resolve_destination;
use segfetch_core::{
    checksum, ChannelProgress, DownloadJob, DownloadMode, DownloadReport, Fetcher, ProgressStats,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
const MIB: f64 = 1_048_576.0;

/// Parsed `get` arguments; `None` means "use the config value".
#[derive(Debug, Clone)]
pub struct GetArgs {
    pub url: String,
    pub file: Option<PathBuf>,
    pub dir: Option<PathBuf>,
    pub threads: Option<usize>,
    pub chunk: Option<usize>,
    pub stall_timeout: Option<u64>,
    pub sha256: bool,
    pub expect_sha256: Option<String>,
}

pub async fn run_get(args: GetArgs, cfg: &FetchConfig) -> Result<()> {
    let cwd = std::env::current_dir().context("current directory")?;
    let job = build_job(&args, cfg, &cwd);
    println!("Downloading {} -> {}", job.url(), job.destination().display());

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<ProgressStats>(16);
    let progress_handle = tokio::spawn(async move {
        let mut last_print: Option<Instant> = None;
        let mut last_shown: Option<ProgressStats> = None;
        while let Some(stats) = progress_rx.recv().await {
            let now = Instant::now();
            let finished = stats.total_bytes == Some(stats.bytes_done);
            if finished || last_print.map_or(true, |t| now.duration_since(t) >= PROGRESS_INTERVAL) {
                println!("  {}", format_progress(&stats));
                last_print = Some(now);
                last_shown = Some(stats);
            }
        }
        last_shown
    });

    let fetcher = Fetcher::with_progress(Arc::new(ChannelProgress::new(progress_tx)));
    let download_job = job.clone();
    let result = tokio::task::spawn_blocking(move || fetcher.download(&download_job)).await?;
    // The sender was dropped with the fetcher, so the printer has drained.
    let last_shown = progress_handle.await.unwrap_or(None);

    let report = result.with_context(|| format!("download of {} failed", job.url()))?;
    if let Some(line) = final_progress_line(last_shown.as_ref(), &report) {
        println!("  {}", line);
    }
    println!("{}", format_summary(&report));

    if args.sha256 {
        let digest = checksum::sha256_path(&report.destination)?;
        println!("{}  {}", digest, report.destination.display());
    }
    if let Some(expected) = &args.expect_sha256 {
        if !checksum::verify_sha256(&report.destination, expected)? {
            anyhow::bail!(
                "SHA-256 of {} does not match {}",
                report.destination.display(),
                expected
            );
        }
        println!("SHA-256 verified");
    }
    Ok(())
}

/// Config values overridden by whatever flags were given.
fn build_job(args: &GetArgs, cfg: &FetchConfig, cwd: &Path) -> DownloadJob {
    let destination = resolve_destination(
        &args.url,
        args.file.as_deref(),
        args.dir.as_deref(),
        cwd,
    );
    let mut job = DownloadJob::from_config(args.url.clone(), destination, cfg);
    if let Some(threads) = args.threads {
        job = job.with_workers(threads);
    }
    if let Some(chunk) = args.chunk {
        job = job.with_chunk_size(chunk);
    }
    if let Some(secs) = args.stall_timeout {
        job = job.with_stall_timeout(Duration::from_secs(secs));
    }
    job
}

fn format_progress(stats: &ProgressStats) -> String {
    let done_mib = stats.bytes_done as f64 / MIB;
    let rate_mib = stats.bytes_per_sec() / MIB;
    match (stats.total_bytes, stats.fraction()) {
        (Some(total), Some(fraction)) => {
            let eta = stats
                .eta_secs()
                .map(|s| format!("{:.0}s", s))
                .unwrap_or_else(|| "?".to_string());
            format!(
                "{:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}",
                done_mib,
                total as f64 / MIB,
                fraction * 100.0,
                rate_mib,
                eta
            )
        }
        _ => format!("{:.1} MiB  {:.2} MiB/s", done_mib, rate_mib),
    }
}

/// Progress updates are sent with `try_send` and may be dropped, so the 100%
/// line is printed from the report when the printer never showed it.
fn final_progress_line(
    last_shown: Option<&ProgressStats>,
    report: &DownloadReport,
) -> Option<String> {
    if last_shown.is_some_and(|s| s.bytes_done == report.bytes) {
        return None;
    }
    Some(format_progress(&ProgressStats {
        bytes_done: report.bytes,
        total_bytes: Some(report.bytes),
        elapsed_secs: report.elapsed.as_secs_f64(),
    }))
}

fn format_summary(report: &DownloadReport) -> String {
    let secs = report.elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        report.bytes as f64 / secs / MIB
    } else {
        0.0
    };
    let how = match report.mode {
        DownloadMode::Segmented {
            segments,
            workers_spawned,
            ..
        } => format!("{} segments, {} workers", segments, workers_spawned),
        DownloadMode::SingleStream => "single stream".to_string(),
    };
    format!(
        "Saved {} ({} bytes) in {:.2}s, {:.2} MiB/s [{}]",
        report.destination.display(),
        report.bytes,
        secs,
        rate,
        how
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(url: &str) -> GetArgs {
        GetArgs {
            url: url.to_string(),
            file: None,
            dir: None,
            threads: None,
            chunk: None,
            stall_timeout: None,
            sha256: false,
            expect_sha256: None,
        }
    }

    #[test]
    fn flags_override_config() {
        let mut a = args("https://example.com/x.iso");
        a.threads = Some(64);
        a.chunk = Some(4096);
        a.stall_timeout = Some(5);
        let job = build_job(&a, &FetchConfig::default(), Path::new("/work"));
        assert_eq!(job.workers(), 64);
        assert_eq!(job.chunk_size(), 4096);
        assert_eq!(job.stall_timeout(), Duration::from_secs(5));
        assert_eq!(job.destination(), Path::new("/work/x.iso"));
    }

    #[test]
    fn config_used_without_flags() {
        let cfg = FetchConfig {
            workers: 3,
            ..FetchConfig::default()
        };
        let mut a = args("https://example.com/");
        a.dir = Some(PathBuf::from("/data"));
        let job = build_job(&a, &cfg, Path::new("/work"));
        assert_eq!(job.workers(), 3);
        assert_eq!(job.destination(), Path::new("/data/download.bin"));
    }

    #[test]
    fn progress_line_with_and_without_total() {
        let known = ProgressStats {
            bytes_done: 1_048_576,
            total_bytes: Some(2_097_152),
            elapsed_secs: 1.0,
        };
        let line = format_progress(&known);
        assert!(line.contains("1.0 / 2.0 MiB (50.0%)"), "{}", line);
        assert!(line.contains("ETA 1s"), "{}", line);

        let unknown = ProgressStats {
            total_bytes: None,
            ..known
        };
        assert_eq!(format_progress(&unknown), "1.0 MiB  1.00 MiB/s");
    }

    #[test]
    fn final_line_printed_only_when_update_was_dropped() {
        let report = DownloadReport {
            mode: DownloadMode::SingleStream,
            bytes: 2_097_152,
            elapsed: Duration::from_secs(2),
            destination: PathBuf::from("/tmp/f.bin"),
        };
        let behind = ProgressStats {
            bytes_done: 1_048_576,
            total_bytes: Some(2_097_152),
            elapsed_secs: 1.0,
        };
        let line = final_progress_line(Some(&behind), &report).unwrap();
        assert!(line.contains("2.0 / 2.0 MiB (100.0%)"), "{}", line);
        assert!(final_progress_line(None, &report).is_some());

        let done = ProgressStats {
            bytes_done: 2_097_152,
            ..behind
        };
        assert!(final_progress_line(Some(&done), &report).is_none());
    }

    #[test]
    fn summary_mentions_mode_and_speed() {
        let report = DownloadReport {
            mode: DownloadMode::SingleStream,
            bytes: 2 * 1_048_576,
            elapsed: Duration::from_secs(2),
            destination: PathBuf::from("/tmp/f.bin"),
        };
        let s = format_summary(&report);
        assert!(s.contains("2.00s"), "{}", s);
        assert!(s.contains("1.00 MiB/s"), "{}", s);
        assert!(s.contains("single stream"), "{}", s);
    }
}
