//! Logging bootstrap using `tracing` and `tracing-subscriber`.
//!
//! ```rust,ignore
//! use plugify_runtime::{config::load_config, logging};
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//! ```
//!
//! `RUST_LOG`, when set, replaces the configured base level. Per-module
//! `filters` are added on top either way.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize logging from a [`LoggingConfig`].
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_from_config(config: &LoggingConfig) -> bool {
    LoggingBuilder::from_config(config).try_init().is_ok()
}

/// Parses a configured level name; unknown names fall back to `INFO`.
pub fn parse_level(level: &str) -> tracing::Level {
    level.parse().unwrap_or(tracing::Level::INFO)
}

/// Subscriber settings resolved from a [`LoggingConfig`].
#[derive(Debug)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    format: LogFormat,
    output: LogOutput,
    thread_ids: bool,
    file_location: bool,
    file_path: Option<PathBuf>,
}

impl LoggingBuilder {
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            level: parse_level(&config.level),
            directives: config
                .filters
                .iter()
                .map(|(module, level)| format!("{module}={}", level.to_lowercase()))
                .collect(),
            format: config.format,
            output: config.output,
            thread_ids: config.thread_ids,
            file_location: config.file_location,
            file_path: config.file_path.clone(),
        }
    }

    fn build_filter(&self) -> EnvFilter {
        let base = self.level.to_string().to_lowercase();
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base));

        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => warn!(directive = %directive, error = %e, "Ignoring log directive"),
            }
        }
        filter
    }

    /// Log file directory and name; a bare file name lands in the working
    /// directory.
    fn file_target(path: &Path) -> (&Path, &OsStr) {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path.file_name().unwrap_or_else(|| OsStr::new("plugify.log"));
        (dir, name)
    }

    fn writer(&self) -> BoxMakeWriter {
        match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => BoxMakeWriter::new(std::io::stdout),
            (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                let (dir, name) = Self::file_target(path);
                BoxMakeWriter::new(tracing_appender::rolling::never(dir, name))
            }
            (LogOutput::File, None) => {
                warn!("File output requested but no file path configured, falling back to stdout");
                BoxMakeWriter::new(std::io::stdout)
            }
        }
    }

    fn layer(&self) -> BoxedLayer {
        let writer = self.writer();
        let base = fmt::layer()
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_location)
            .with_line_number(self.file_location);

        match self.format {
            LogFormat::Compact => base.compact().with_writer(writer).boxed(),
            LogFormat::Pretty => base.pretty().with_writer(writer).boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => base.json().with_writer(writer).boxed(),
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => {
                warn!("JSON logs need the `json-log` feature, using the full format");
                base.with_writer(writer).boxed()
            }
            LogFormat::Full => base.with_writer(writer).boxed(),
        }
    }

    /// Installs the global subscriber.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();
        tracing_subscriber::registry()
            .with(self.layer())
            .with(filter)
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), tracing::Level::DEBUG);
        assert_eq!(parse_level("WARN"), tracing::Level::WARN);
        assert_eq!(parse_level("nonsense"), tracing::Level::INFO);
    }

    #[test]
    fn test_from_config() {
        let config = LoggingConfig {
            level: "debug".into(),
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            thread_ids: true,
            file_location: true,
            filters: BTreeMap::from([("plugify_framework".to_string(), "TRACE".to_string())]),
            ..Default::default()
        };

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, tracing::Level::DEBUG);
        assert_eq!(builder.format, LogFormat::Pretty);
        assert_eq!(builder.output, LogOutput::Stderr);
        assert!(builder.thread_ids && builder.file_location);
        assert_eq!(builder.directives, ["plugify_framework=trace"]);
    }

    #[test]
    fn test_file_target() {
        let (dir, name) = LoggingBuilder::file_target(Path::new("logs/plugify.log"));
        assert_eq!(dir, Path::new("logs"));
        assert_eq!(name, "plugify.log");

        let (dir, _) = LoggingBuilder::file_target(Path::new("run.log"));
        assert_eq!(dir, Path::new("."));
    }
}
