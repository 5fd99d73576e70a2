//! File-based logging for the CLI.
//!
//! Logs are written to `~/.local/state/edge-doctor/debug.log` using a
//! daily rolling file appender. Stderr output is enabled when `RUST_LOG`
//! is set (useful for development). Stdout is never used for logs — it is
//! reserved for the diagnostic summary.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_DIR_NAME: &str = "edge-doctor";

const LOG_FILE_NAME: &str = "debug.log";

/// Initialise the tracing subscriber with file + optional stderr layers.
///
/// Returns a [`WorkerGuard`] that **must** be held for the lifetime of the
/// program — dropping it flushes and closes the log file writer.
pub fn init_logging(default_level: &str, verbose: bool) -> WorkerGuard {
    let log_dir = log_directory();

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!(
            "warning: could not create log directory {}: {e}",
            log_dir.display()
        );
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false);

    // Stderr layer: only active in verbose mode or when RUST_LOG is set
    // (developer mode).
    let stderr_layer = if verbose || std::env::var("RUST_LOG").is_ok() {
        Some(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(true),
        )
    } else {
        None
    };

    // Respect RUST_LOG if set, otherwise use the CLI's level. Silence
    // noisy debug output from the transport layers so that RUST_LOG=debug
    // shows application logs without drowning in SSH chatter.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level))
        .add_directive("russh=warn".parse().unwrap())
        .add_directive("russh_keys=warn".parse().unwrap())
        .add_directive("russh_sftp=warn".parse().unwrap())
        .add_directive("tokio=warn".parse().unwrap());

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    guard
}

/// Resolve the log directory path, preferring the XDG state directory
/// (`~/.local/state/edge-doctor/` on Linux).
fn log_directory() -> std::path::PathBuf {
    if let Some(state) = dirs::state_dir() {
        return state.join(LOG_DIR_NAME);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".local").join("state").join(LOG_DIR_NAME);
    }
    std::path::PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_directory_ends_with_app_name() {
        let dir = log_directory();
        assert!(
            dir.ends_with(LOG_DIR_NAME),
            "log directory should end with '{LOG_DIR_NAME}': {}",
            dir.display()
        );
    }

    #[test]
    fn log_directory_is_absolute_or_fallback() {
        let dir = log_directory();
        assert!(
            dir.is_absolute() || dir.to_string_lossy() == ".",
            "log directory should be absolute or current dir fallback: {}",
            dir.display()
        );
    }
}
