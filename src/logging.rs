//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to both console and files
//! for debugging process supervision and dispatch decisions.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// An unusable log directory degrades to console-only logging; it never
/// aborts startup.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let pid = process::id();
        let log_dir = PathBuf::from("log");
        let mut log_path = None;
        let file_layer = if ensure_log_dir(&log_dir) {
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
            let log_filename = format!("{environment}.{pid}.{timestamp}.log");
            log_path = Some(log_dir.join(&log_filename));

            let file_appender = tracing_appender::rolling::never(&log_dir, log_filename);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            // Keep the non-blocking writer alive for the process lifetime.
            std::mem::forget(guard);

            Some(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(log_level.clone())),
            )
        } else {
            None
        };

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(true)
                    .with_filter(EnvFilter::new(log_level)),
            )
            .with(file_layer);

        // A global subscriber may already be set by an embedding host;
        // that is not an error.
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        match &log_path {
            Some(path) => tracing::info!(
                pid = pid,
                environment = %environment,
                log_file = %path.display(),
                "Structured logging initialized with file output"
            ),
            None => tracing::warn!(
                pid = pid,
                environment = %environment,
                "Structured logging initialized, console only"
            ),
        }
    });
}

/// Create the log directory, reporting whether file output is possible.
fn ensure_log_dir(dir: &Path) -> bool {
    match fs::create_dir_all(dir) {
        Ok(()) => true,
        Err(err) => {
            // tracing is not up yet at this point.
            eprintln!(
                "Failed to create log directory {}: {err}; file logging disabled",
                dir.display()
            );
            false
        }
    }
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("DAGFLOW_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_detection() {
        std::env::set_var("DAGFLOW_ENV", "test_override");
        let env = get_environment();
        assert_eq!(env, "test_override");
        std::env::remove_var("DAGFLOW_ENV");
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
    }

    #[test]
    fn test_unusable_log_dir_is_not_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(ensure_log_dir(&tmp.path().join("log")));

        // A regular file in the way makes the directory uncreatable.
        let blocker = tmp.path().join("occupied");
        std::fs::write(&blocker, b"").unwrap();
        assert!(!ensure_log_dir(&blocker.join("log")));
    }
}
