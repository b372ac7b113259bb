//! Tracing configuration for the uniq-ip binary
//!
//! Logs go to stderr so that stdout carries only the count.

use tracing_subscriber::{EnvFilter, prelude::*};

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default log level filter (e.g., "info,uniq_ip=debug")
    pub default_log_level: String,

    /// Whether to include thread names (worker ids) in each line
    pub thread_names: bool,

    /// Whether to colour the output
    pub ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_log_level: "info".to_string(),
            thread_names: true,
            ansi: false,
        }
    }
}

impl TracingConfig {
    /// Set the default log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.default_log_level = level.into();
        self
    }

    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.ansi = enable;
        self
    }
}

/// Initialize tracing with the given configuration
///
/// `RUST_LOG` takes precedence over `default_log_level`.
///
/// # Panics
///
/// Panics if a global subscriber is already set.
pub fn initialize_tracing(config: TracingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(config.thread_names)
        .with_ansi(config.ansi);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::debug!(
        level = %config.default_log_level,
        "Tracing initialized - adjust log level with RUST_LOG"
    );
}
