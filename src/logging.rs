//! Structured logging initialization.
//!
//! Sets up a `tracing` subscriber with an env filter and a JSON or
//! pretty-printed fmt layer, optionally behind a non-blocking writer.
//! Configured from `METAGEN_LOG_*` environment variables:
//!
//! - `METAGEN_LOG_LEVEL` - trace/debug/info/warn/error (default `info`)
//! - `METAGEN_LOG_FORMAT` - json/pretty (default `pretty`)
//! - `METAGEN_LOG_ASYNC` - buffered writer (default `false`)
//! - `METAGEN_LOG_TARGET_FILTER` - extra comma-separated directives
//! - `METAGEN_LOG_INCLUDE_LOCATION` - file:line in records (default `false`)
//!
//! `RUST_LOG`, when set, takes precedence over `METAGEN_LOG_LEVEL`.

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for machines, pretty-print for operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level: trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Write through a background thread
    pub async_logging: bool,
    /// Module filter (comma-separated)
    pub target_filter: Option<String>,
    /// Include file:line location
    pub include_location: bool,
}

impl LogConfig {
    /// Parse configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            log_level: lookup("METAGEN_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            format: LogFormat::parse(
                &lookup("METAGEN_LOG_FORMAT").unwrap_or_else(|| "pretty".to_string()),
            ),
            async_logging: lookup("METAGEN_LOG_ASYNC")
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            target_filter: lookup("METAGEN_LOG_TARGET_FILTER"),
            include_location: lookup("METAGEN_LOG_INCLUDE_LOCATION")
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
        }
    }

    /// Verbose settings for local debugging and tests
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));
        // sqlx logs every statement at info.
        if let Ok(directive) = "sqlx=warn".parse() {
            filter = filter.add_directive(directive);
        }
        if let Some(target_filter) = &self.target_filter {
            for raw in target_filter.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match raw.parse() {
                    Ok(directive) => filter = filter.add_directive(directive),
                    Err(_) => eprintln!("Warning: Invalid log filter directive: {raw}"),
                }
            }
        }
        filter
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    if config.async_logging {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());
        let fmt_layer = match config.format {
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_writer(non_blocking)
                .boxed(),
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_writer(non_blocking)
                .boxed(),
        };
        registry
            .with(fmt_layer)
            .try_init()
            .context("Failed to initialize async logging")?;
        // Keep the writer thread alive for the whole process.
        std::mem::forget(guard);
    } else {
        let fmt_layer = match config.format {
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_writer(std::io::stderr)
                .boxed(),
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_writer(std::io::stderr)
                .boxed(),
        };
        registry
            .with(fmt_layer)
            .try_init()
            .context("Failed to initialize logging")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("other"), LogFormat::Pretty);
    }

    #[test]
    fn test_from_lookup_defaults() {
        let cfg = LogConfig::from_lookup(|_| None);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.format, LogFormat::Pretty);
        assert!(!cfg.async_logging);
        assert!(cfg.target_filter.is_none());
    }

    #[test]
    fn test_from_lookup_values() {
        let env: HashMap<&str, &str> = [
            ("METAGEN_LOG_LEVEL", "debug"),
            ("METAGEN_LOG_FORMAT", "json"),
            ("METAGEN_LOG_ASYNC", "true"),
            ("METAGEN_LOG_TARGET_FILTER", "metagen::sync=trace"),
        ]
        .into_iter()
        .collect();
        let cfg = LogConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.level(), Level::DEBUG);
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(cfg.async_logging);
        assert_eq!(cfg.target_filter.as_deref(), Some("metagen::sync=trace"));
    }

    #[test]
    fn test_default_dev() {
        let cfg = LogConfig::default_dev();
        assert_eq!(cfg.level(), Level::DEBUG);
        assert!(cfg.include_location);
    }
}
