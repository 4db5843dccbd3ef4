use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

/// Keeps the file writer flushing; drop it only when the run is over.
pub struct LogHandle {
    pub path: PathBuf,
    _guard: WorkerGuard,
}

/// Start logging to a fresh `pilot_<timestamp>.log` under `log_dir`.
///
/// The file gets `info` (or `debug` when `verbose`), and `RUST_LOG` overrides
/// either. Warnings and errors are echoed to stderr.
pub fn init(log_dir: &Path, verbose: bool) -> Result<LogHandle> {
    fs::create_dir_all(log_dir)?;
    let name = format!("pilot_{}.log", Local::now().format("%Y%m%d_%H%M%S"));
    let path = log_dir.join(&name);

    let appender = tracing_appender::rolling::never(log_dir, &name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = fmt::layer().with_writer(writer).with_ansi(false).with_filter(filter);
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false).with_filter(LevelFilter::WARN);

    let _ = tracing_subscriber::registry().with(file_layer).with(stderr_layer).try_init();

    Ok(LogHandle { path, _guard: guard })
}
