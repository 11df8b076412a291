//! Logging setup for hosts embedding the sync engine
//!
//! `RUST_LOG` wins over the level argument when set, so a single noisy order
//! can be traced with e.g. `RUST_LOG=sync_client=debug`.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the logger (stdout, `info`)
pub fn init_logger() {
    init_logger_with_file(None, None);
}

/// Initialize the logger with optional daily-rolling file output
///
/// Falls back to stdout when `log_dir` does not exist. Calling this twice is
/// harmless; the second call leaves the first subscriber in place.
pub fn init_logger_with_file(log_level: Option<&str>, log_dir: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir {
        let log_path = Path::new(dir);
        if log_path.is_dir() {
            let file_appender = tracing_appender::rolling::daily(log_path, "sync-client");
            if builder.with_ansi(false).with_writer(file_appender).try_init().is_err() {
                tracing::debug!("Logger already initialized");
            }
            return;
        }
        eprintln!("Log directory {} not found, logging to stdout", dir);
    }

    if builder.try_init().is_err() {
        tracing::debug!("Logger already initialized");
    }
}
