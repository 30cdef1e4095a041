//! Process-wide logger and free-function entry points
//!
//! The global logger starts with the default stderr handler and lives for
//! the rest of the process. It is never dropped, so batching sinks installed
//! here only send their open window on their own timer or on [`flush`].

use crate::config::{LoggingConfig, SinkRegistry};
use crate::core::{Handler, Logger, Result, Session, TimestampFormat};
use std::fmt;
use std::sync::{Arc, OnceLock};

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// The process-wide logger, created on first use
pub fn logger() -> &'static Logger {
    LOGGER.get_or_init(Logger::new)
}

/// Apply `config` using the built-in sink types
///
/// # Errors
///
/// On any error the previous handlers and time layout stay active.
pub fn configure(config: &LoggingConfig) -> Result<()> {
    logger().apply_config(config, &SinkRegistry::new())
}

pub fn configure_with(config: &LoggingConfig, registry: &SinkRegistry) -> Result<()> {
    logger().apply_config(config, registry)
}

pub fn reconfigure<I>(handlers: I)
where
    I: IntoIterator<Item = Arc<Handler>>,
{
    logger().reconfigure(handlers);
}

pub fn set_time_format(format: TimestampFormat) {
    logger().set_time_format(format);
}

pub fn add_path_marker(marker: impl Into<String>) {
    logger().add_path_marker(marker);
}

pub fn flush() -> Result<()> {
    logger().flush()
}

#[inline(never)]
pub fn log_with_skip(
    skip: usize,
    level: impl AsRef<str>,
    session: Option<&Session>,
    args: fmt::Arguments<'_>,
) {
    logger().log_with_skip(skip + 1, level.as_ref(), session, args);
}

#[inline(never)]
pub fn log(level: impl AsRef<str>, args: fmt::Arguments<'_>) {
    logger().log_with_skip(1, level.as_ref(), None, args);
}

#[inline(never)]
pub fn debug(args: fmt::Arguments<'_>) {
    logger().log_with_skip(1, "debug", None, args);
}

#[inline(never)]
pub fn info(args: fmt::Arguments<'_>) {
    logger().log_with_skip(1, "info", None, args);
}

#[inline(never)]
pub fn warn(args: fmt::Arguments<'_>) {
    logger().log_with_skip(1, "warn", None, args);
}

#[inline(never)]
pub fn error(args: fmt::Arguments<'_>) {
    logger().log_with_skip(1, "error", None, args);
}

#[inline(never)]
pub fn fatal(args: fmt::Arguments<'_>) {
    logger().log_with_skip(1, "fatal", None, args);
}
