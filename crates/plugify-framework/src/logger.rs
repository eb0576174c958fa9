//! Logger capability handed to plugins.
//!
//! The manager receives a [`Logger`] at construction and passes it to every
//! plugin through [`PluginComponents`](crate::component::PluginComponents).
//! [`TracingLogger`] forwards to `tracing`; [`NoopLogger`] discards everything.

use std::fmt;

use tracing::{debug, error, info, warn};

/// Package reported for the logger capability in component listings.
pub const LOGGER_PACKAGE: &str = module_path!();

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// Context attached to contextual log calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    pub plugin: Option<String>,
    pub stage: Option<String>,
}

impl LogContext {
    pub fn plugin(id: impl Into<String>) -> Self {
        Self {
            plugin: Some(id.into()),
            stage: None,
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }
}

/// Leveled, optionally contextual logging.
///
/// Implementors only provide [`log`](Logger::log).
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, context: Option<&LogContext>, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, None, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, None, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, None, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, None, message);
    }

    fn debug_ctx(&self, context: &LogContext, message: &str) {
        self.log(LogLevel::Debug, Some(context), message);
    }

    fn info_ctx(&self, context: &LogContext, message: &str) {
        self.log(LogLevel::Info, Some(context), message);
    }

    fn warn_ctx(&self, context: &LogContext, message: &str) {
        self.log(LogLevel::Warn, Some(context), message);
    }

    fn error_ctx(&self, context: &LogContext, message: &str) {
        self.log(LogLevel::Error, Some(context), message);
    }
}

/// Forwards to the `tracing` macros under the `plugify::plugin` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, context: Option<&LogContext>, message: &str) {
        let plugin = context.and_then(|c| c.plugin.as_deref()).unwrap_or("-");
        let stage = context.and_then(|c| c.stage.as_deref()).unwrap_or("-");
        match level {
            LogLevel::Debug => debug!(target: "plugify::plugin", plugin, stage, "{message}"),
            LogLevel::Info => info!(target: "plugify::plugin", plugin, stage, "{message}"),
            LogLevel::Warn => warn!(target: "plugify::plugin", plugin, stage, "{message}"),
            LogLevel::Error => error!(target: "plugify::plugin", plugin, stage, "{message}"),
        }
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: LogLevel, _context: Option<&LogContext>, _message: &str) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::*;

    /// Captures log lines for assertions.
    #[derive(Default)]
    pub struct MemoryLogger {
        pub lines: Mutex<Vec<(LogLevel, Option<String>, String)>>,
    }

    impl Logger for MemoryLogger {
        fn log(&self, level: LogLevel, context: Option<&LogContext>, message: &str) {
            let plugin = context.and_then(|c| c.plugin.clone());
            self.lines.lock().push((level, plugin, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryLogger;
    use super::*;

    #[test]
    fn test_default_methods_route_to_log() {
        let logger = MemoryLogger::default();
        logger.info("loaded");
        logger.error_ctx(&LogContext::plugin("greet").with_stage("run"), "failed");

        let lines = logger.lines.lock();
        assert_eq!(lines[0], (LogLevel::Info, None, "loaded".to_string()));
        assert_eq!(
            lines[1],
            (LogLevel::Error, Some("greet".to_string()), "failed".to_string())
        );
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Error);
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }
}
