//! Structured logging configuration, independent of the OpenTelemetry span
//! pipeline in [`crate::tracing_setup`].
//!
//! Most deployments only need `init_tracing` (which also installs a `fmt`
//! layer), but some entry points -- CLIs, migration tools, short-lived
//! jobs -- want plain structured logs without pulling in OTLP. This module
//! covers that case.

use std::io;
use tracing_subscriber::{fmt, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, single line per event.
    #[default]
    Text,
    /// Newline-delimited JSON, one object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "gateway_core=trace,warn").
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Include target module path in each line.
    pub with_target: bool,
    /// Include thread ids in each line.
    pub with_thread_ids: bool,
    /// Emit a log line for span enter/exit events, in addition to `event!`s.
    pub with_span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            with_target: true,
            with_thread_ids: false,
            with_span_events: false,
        }
    }
}

impl LoggingConfig {
    /// Create a configuration at the given level, defaults otherwise.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// Use JSON output.
    #[must_use]
    pub fn with_json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    /// Include span enter/exit/close events in the log stream.
    #[must_use]
    pub fn with_span_events(mut self) -> Self {
        self.with_span_events = true;
        self
    }
}

/// Logging initialization error.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The global subscriber was already installed (e.g. by `init_tracing`).
    #[error("failed to install logging subscriber: {0}")]
    Init(String),
}

/// Install a process-global structured logging subscriber.
///
/// Mutually exclusive with [`crate::tracing_setup::init_tracing`] -- only one
/// global subscriber may be installed per process. Call this instead when the
/// binary has no need for OpenTelemetry spans.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match config.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_writer(io::stdout)
                .with_target(config.with_target)
                .with_thread_ids(config.with_thread_ids)
                .with_span_events(span_events);

            tracing_subscriber::registry()
                .with(layer.with_filter(filter))
                .try_init()
                .map_err(|e| LoggingError::Init(e.to_string()))
        }
        LogFormat::Text => {
            let layer = fmt::layer()
                .with_target(config.with_target)
                .with_thread_ids(config.with_thread_ids)
                .with_span_events(span_events);

            tracing_subscriber::registry()
                .with(layer.with_filter(filter))
                .try_init()
                .map_err(|e| LoggingError::Init(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Text);
    }

    #[test]
    fn test_builder() {
        let config = LoggingConfig::new("debug").with_json().with_span_events();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.with_span_events);
    }
}
