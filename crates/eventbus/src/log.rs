//! Injectable logging.
//!
//! Every producer, consumer and backend connection carries its own
//! [`LogHandle`]: a [`Logger`] plus the minimum [`LogLevel`] it emits. The
//! composition root picks the logger (usually [`TracingLogger`]); instances can
//! swap theirs at runtime through their `set_logger` methods.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

/// Severity of a log message, ordered `Debug < Info < Warn < Error`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum LogLevel {
    /// Diagnostic chatter.
    Debug,

    /// Normal lifecycle events.
    #[default]
    Info,

    /// Something unexpected that was handled.
    Warn,

    /// A failed operation.
    Error,
}

impl LogLevel {
    /// Upper-case name of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown level name.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown log level: {0}")]
pub struct ParseLogLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ParseLogLevelError(s.to_string())),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Sink for log records.
pub trait Logger: Send + Sync + 'static {
    /// Writes one already-filtered record.
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards records to `tracing` events under the `eventbus` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "eventbus", "{message}"),
            LogLevel::Info => tracing::info!(target: "eventbus", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "eventbus", "{message}"),
            LogLevel::Error => tracing::error!(target: "eventbus", "{message}"),
        }
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// A logger paired with the minimum level it emits.
#[derive(Clone)]
pub struct LogHandle {
    logger: Arc<dyn Logger>,
    level: LogLevel,
}

impl LogHandle {
    /// Creates a handle around `logger` that emits records at `level` or above.
    pub fn new(logger: Arc<dyn Logger>, level: LogLevel) -> Self {
        Self { logger, level }
    }

    /// A [`TracingLogger`] handle.
    #[must_use]
    pub fn tracing(level: LogLevel) -> Self {
        Self::new(Arc::new(TracingLogger), level)
    }

    /// A handle that emits nothing.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopLogger), LogLevel::Error)
    }

    /// The minimum emitted level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Returns a copy of this handle with a different level.
    #[must_use]
    pub fn with_level(&self, level: LogLevel) -> Self {
        Self::new(self.logger.clone(), level)
    }

    /// Whether a record at `level` would be emitted.
    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.level <= level
    }

    /// Emits `args` at `level` if enabled.
    pub fn log(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if self.enabled(level) {
            self.logger.log(level, &args.to_string());
        }
    }

    /// Emits at [`LogLevel::Debug`].
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Debug, args);
    }

    /// Emits at [`LogLevel::Info`].
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Info, args);
    }

    /// Emits at [`LogLevel::Warn`].
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Warn, args);
    }

    /// Emits at [`LogLevel::Error`].
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Error, args);
    }
}

impl Default for LogHandle {
    fn default() -> Self {
        Self::tracing(LogLevel::default())
    }
}

impl fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHandle")
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}
