//! CLI for the segfetch parallel downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use segfetch_core::config;
use segfetch_core::job::MAX_WORKERS;
use std::path::{Path, PathBuf};

use commands::{run_checksum, run_config, run_get, GetArgs};

/// Top-level CLI for segfetch.
#[derive(Debug, Parser)]
#[command(name = "segfetch")]
#[command(about = "segfetch: parallel segmented HTTP downloader with stall recovery", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL using parallel range requests.
    Get {
        /// Direct HTTP/HTTPS URL to download.
        url: String,

        /// Output file name (only its file name is used when --dir is given).
        #[arg(short = 'f', long = "file", value_name = "FILE")]
        file: Option<PathBuf>,

        /// Directory to save into (default: current directory).
        #[arg(short = 'd', long = "dir", value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Number of download threads (1-10000; default from config).
        #[arg(
            short = 't',
            long = "threads",
            value_name = "THREADS",
            value_parser = clap::value_parser!(u64).range(1..=MAX_WORKERS as u64)
        )]
        threads: Option<u64>,

        /// Network read size in bytes (default from config).
        #[arg(short = 'c', long = "chunk", value_name = "BYTES")]
        chunk: Option<usize>,

        /// Seconds without data before a worker is declared stalled.
        #[arg(long = "stall-timeout", value_name = "SECS")]
        stall_timeout: Option<u64>,

        /// Print the SHA-256 of the finished file.
        #[arg(long)]
        sha256: bool,

        /// Fail unless the finished file has this SHA-256 (hex).
        #[arg(long = "expect-sha256", value_name = "HEX")]
        expect_sha256: Option<String>,
    },

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: String,
    },

    /// Show the config file path and the effective settings.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                url,
                file,
                dir,
                threads,
                chunk,
                stall_timeout,
                sha256,
                expect_sha256,
            } => {
                let args = GetArgs {
                    url,
                    file,
                    dir,
                    threads: threads.map(|t| t as usize),
                    chunk,
                    stall_timeout,
                    sha256,
                    expect_sha256,
                };
                run_get(args, &cfg).await?
            }
            CliCommand::Checksum { path } => run_checksum(Path::new(&path)).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
