//! Logging initialization.
//!
//! Logs always go to stderr. When `log_dir` is configured they are also
//! written to `imagedeck-{datetime}.log` in that directory.

use std::path::PathBuf;

use anyhow::Result;
use imagedeck_core::Config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps the file writer alive. Dropping it flushes buffered lines.
pub struct LoggingHandle {
    pub _guard: Option<WorkerGuard>,
    pub log_file_path: Option<PathBuf>,
}

/// Use RUST_LOG to control the level (e.g. RUST_LOG=imagedeck_core=debug).
/// Without it the level is `warn`, or `debug` with `--debug`.
pub fn init_logging(config: &Config, debug: bool) -> Result<LoggingHandle> {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let Some(logs_dir) = config.log_dir.as_ref() else {
        tracing_subscriber::registry().with(filter).with(stderr).init();
        return Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        });
    };

    std::fs::create_dir_all(logs_dir)?;
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    let log_filename = format!("imagedeck-{}.log", timestamp);
    let log_file_path = logs_dir.join(&log_filename);

    let file_appender = tracing_appender::rolling::never(logs_dir, &log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    Ok(LoggingHandle {
        _guard: Some(guard),
        log_file_path: Some(log_file_path),
    })
}
