//! Logging and tracing utilities for romscope
//!
//! This module provides structured logging using the `tracing` crate,
//! with spans around handler invocations.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Whether tracing has been initialized
static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize the default tracing subscriber
///
/// This should be called once at application startup. Multiple calls are safe
/// and will be ignored.
pub fn init_default() {
    init_with_config(TracingConfig::default());
}

/// Initialize tracing with a custom configuration
///
/// `RUST_LOG` takes precedence over `config.default_level`.
pub fn init_with_config(config: TracingConfig) {
    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_ok()
    {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file)
            .with_line_number(config.show_line_number);

        // Another subscriber may already be installed by the host
        let _ = tracing_subscriber::registry()
            .with(fmt_layer)
            .with(filter)
            .try_init();
    }
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default log level filter (e.g., "info", "debug", "warn")
    pub default_level: String,
    /// Show the target (module path) in log output
    pub show_target: bool,
    /// Show thread IDs in log output
    pub show_thread_ids: bool,
    /// Show source file in log output
    pub show_file: bool,
    /// Show line number in log output
    pub show_line_number: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: "warn,romscope=info".to_string(),
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

impl TracingConfig {
    /// Config for a `-v` count: 0 = warn, 1 = info, 2 = debug, 3+ = trace
    pub fn for_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        Self {
            default_level: level.to_string(),
            show_thread_ids: verbosity >= 3,
            ..Self::default()
        }
    }
}

/// Macros for common logging patterns
#[macro_export]
macro_rules! log_parse_start {
    ($handler:expr, $len:expr) => {
        tracing::debug!(
            handler = %$handler,
            length = %$len,
            "Starting parse"
        );
    };
}

#[macro_export]
macro_rules! log_parse_complete {
    ($handler:expr, $duration:expr, $properties:expr) => {
        tracing::info!(
            handler = %$handler,
            duration_ms = %$duration.as_millis(),
            properties = %$properties,
            "Parse complete"
        );
    };
}

#[macro_export]
macro_rules! log_parse_error {
    ($handler:expr, $error:expr) => {
        tracing::warn!(
            handler = %$handler,
            error = %$error,
            "Parse failed"
        );
    };
}

/// Run `f` inside a `parse` span and log its duration
pub fn instrument_parse<T, F>(name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let span = tracing::info_span!("parse", handler = %name);
    let _guard = span.enter();

    let start = std::time::Instant::now();
    let result = f();
    let duration = start.elapsed();

    tracing::debug!(duration_ms = %duration.as_millis(), "Parse operation complete");

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert!(config.default_level.contains("info"));
        assert!(config.show_target);
        assert!(!config.show_thread_ids);
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(TracingConfig::for_verbosity(0).default_level, "warn");
        assert_eq!(TracingConfig::for_verbosity(2).default_level, "debug");
        assert_eq!(TracingConfig::for_verbosity(9).default_level, "trace");
    }

    #[test]
    fn test_instrument_parse() {
        let result = instrument_parse("test", || 42);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_default();
        init_default();
        assert!(TRACING_INITIALIZED.load(Ordering::SeqCst));
    }
}
