use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;

pub const DEFAULT_FILTER: &str = "upkeep=info,warn";

/// `--log-level` wins over `RUST_LOG`, which wins over [`DEFAULT_FILTER`].
pub fn build_filter(level: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = level {
        return EnvFilter::try_new(level).with_context(|| format!("invalid log filter '{level}'"));
    }
    Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
}

pub fn init(level: Option<&str>, log_file: Option<&Path>) -> Result<()> {
    let filter = build_filter(level)?;
    let builder = fmt().with_env_filter(filter).with_target(true);
    let result = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file: {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    result.map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}
