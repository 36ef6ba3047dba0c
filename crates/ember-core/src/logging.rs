//! Tracing subscriber setup for hosts embedding the engine
//!
//! Every crate in the workspace logs through `tracing` and never installs a
//! subscriber itself. A host calls [`init`] once at startup and keeps the
//! returned [`LoggingGuard`] alive until exit so buffered file output is
//! flushed.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const LOG_FILE_PREFIX: &str = "ember.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON files
    pub log_dir: PathBuf,
    pub json_file: bool,
    pub console: bool,
    /// Include source file and line in console output
    pub include_location: bool,
    /// Emit span open/close events, useful when timing catalog loads
    pub span_events: bool,
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl LoggingConfig {
    /// Verbose console output for the engine crates
    pub fn development() -> Self {
        Self {
            log_dir: default_log_dir(),
            json_file: false,
            console: true,
            include_location: cfg!(debug_assertions),
            span_events: cfg!(debug_assertions),
            default_filter: engine_filter("info", "debug"),
        }
    }

    /// Warnings only on the console path, engine activity to JSON files
    pub fn production() -> Self {
        Self {
            log_dir: default_log_dir(),
            json_file: true,
            console: false,
            include_location: false,
            span_events: false,
            default_filter: engine_filter("warn", "info"),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }

    fn fmt_span(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

fn engine_filter(base: &str, engine: &str) -> String {
    ["ember_core", "ember_settings", "ember_metadata", "ember_history"]
        .iter()
        .fold(base.to_string(), |filter, target| {
            format!("{filter},{target}={engine}")
        })
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ember")
        .join("logs")
}

/// Keeps the background file writer running. Dropping it flushes pending
/// log lines.
#[must_use = "file logging stops when the guard is dropped"]
pub struct LoggingGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber is already installed or the log directory
/// cannot be created.
pub fn init(config: LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut file_writer = None;

    if config.console {
        layers.push(console_layer(&config));
    }
    if config.json_file {
        let (layer, guard) = json_file_layer(&config)?;
        layers.push(layer);
        file_writer = Some(guard);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::info!(
        log_dir = %config.log_dir.display(),
        json_file = config.json_file,
        console = config.console,
        "logging initialized"
    );
    Ok(LoggingGuard {
        _file_writer: file_writer,
    })
}

fn console_layer(config: &LoggingConfig) -> BoxedLayer {
    fmt::layer()
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_span_events(config.fmt_span())
        .with_filter(config.env_filter())
        .boxed()
}

fn json_file_layer(config: &LoggingConfig) -> anyhow::Result<(BoxedLayer, WorkerGuard)> {
    std::fs::create_dir_all(&config.log_dir)?;
    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(config.fmt_span())
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(config.env_filter())
        .boxed();
    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_engine_filter_covers_every_crate() {
        assert_eq!(
            engine_filter("warn", "info"),
            "warn,ember_core=info,ember_settings=info,ember_metadata=info,ember_history=info"
        );
    }

    #[test]
    fn test_profiles() {
        let production = LoggingConfig::production();
        assert!(production.json_file);
        assert!(!production.console);
        assert!(production.log_dir.ends_with("ember/logs"));

        let development = LoggingConfig::default();
        assert!(development.console);
        assert!(!development.json_file);
        assert!(development.default_filter.starts_with("info,"));
    }
}
