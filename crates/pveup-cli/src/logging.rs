use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use pveup_core::UpgradeConfig;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Console logging follows `RUST_LOG`, then `general.log_level`. The run log,
/// when configured, always records our crates at debug level.
pub(crate) fn init_tracing(config: &UpgradeConfig, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            config
                .general
                .log_level
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        )
    });
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(filter);

    let file_layer = match log_file {
        Some(path) => Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(open_run_log(path)?))
                .with_ansi(false)
                .with_filter(run_log_targets()),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to initialize logging")?;
    Ok(())
}

fn run_log_targets() -> Targets {
    Targets::new()
        .with_target("pveup", LevelFilter::DEBUG)
        .with_target("pveup_engine", LevelFilter::DEBUG)
        .with_target("pveup_host", LevelFilter::DEBUG)
        .with_default(LevelFilter::INFO)
}

pub(crate) fn open_run_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open run log {}", path.display()))
}
