//! Optional checksum of a finished download (SHA-256).
//!
//! Computed on demand after reassembly, never inline with the transfer.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// SHA-256 of the file at `path` as lowercase hex.
pub fn sha256_path(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).with_context(|| format!("read {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Compare the file's digest with `expected` (hex, case-insensitive).
pub fn verify_sha256(path: &Path, expected: &str) -> Result<bool> {
    Ok(sha256_path(path)?.eq_ignore_ascii_case(expected.trim()))
}
