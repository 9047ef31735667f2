//! `segfetch config`: where the config lives and what is in effect.

use anyhow::Result;
use segfetch_core::config::{self, FetchConfig};

pub fn run_config(cfg: &FetchConfig) -> Result<()> {
    println!("config file: {}", config::config_path()?.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
