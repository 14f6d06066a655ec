//! Logging infrastructure for cogify.
//!
//! Provides structured logging with file output and console output:
//! - Writes to `<log_dir>/cogify.log` (cleared on each run)
//! - Also prints to stderr so stdout stays free for command output
//! - Configurable via `RUST_LOG`, which wins over the verbosity flag

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Initialize logging system.
///
/// Creates the log directory if needed, clears the previous log file,
/// and sets up dual output to both file and stderr.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or the log file
/// cannot be cleared.
pub fn init_logging(
    log_dir: &Path,
    log_file: &str,
    verbose: bool,
) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(log_dir)?;
    fs::write(log_dir.join(log_file), "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(false);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .compact();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Default log directory (`~/.cogify/logs`).
pub fn default_log_dir() -> std::path::PathBuf {
    crate::config::config_directory().join("logs")
}

/// Default log file name.
pub fn default_log_file() -> &'static str {
    "cogify.log"
}
