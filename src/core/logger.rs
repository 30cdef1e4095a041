//! Main logger implementation
//!
//! A log call looks up the handlers for its level, assembles the context
//! layers once, and lets every handler format and deliver. Levels with no
//! handler are a silent no-op. A failing handler is reported on stderr and
//! counted; it never fails the caller or the other handlers.

use super::{
    assembler::ContextAssembler,
    call_site::{CallSiteCache, DEFAULT_PATH_MARKERS},
    context::Context,
    error::Result,
    handler::Handler,
    metrics::LoggerMetrics,
    router::LevelRouter,
    session::Session,
    timestamp::TimestampFormat,
};
use crate::config::{LoggingConfig, SinkRegistry};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Suggested wait for `BatchingEmailSink::shutdown` before exit
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Logger {
    router: LevelRouter,
    assembler: ContextAssembler,
    metrics: LoggerMetrics,
}

impl Logger {
    /// Logger with the default stderr handler and default time layout
    #[must_use]
    pub fn new() -> Self {
        Self {
            router: LevelRouter::new(),
            assembler: ContextAssembler::new(),
            metrics: LoggerMetrics::new(),
        }
    }

    /// Log `args` at `level`, attributing the call `skip` frames above our caller
    ///
    /// `skip == 0` attributes the call to whoever called this method.
    #[inline(never)]
    pub fn log_with_skip(
        &self,
        skip: usize,
        level: &str,
        session: Option<&Session>,
        args: fmt::Arguments<'_>,
    ) {
        // An owned snapshot: a write below may block on a batching sink.
        let table = self.router.snapshot();
        let handlers = table.handlers(level);
        if handlers.is_empty() {
            self.metrics.record_unrouted();
            return;
        }

        let stack = self.assembler.assemble(skip + 1, level, args, session);
        let layers = stack.layers();

        for (idx, handler) in handlers.iter().enumerate() {
            match handler.deliver(&layers) {
                Ok(()) => {
                    self.metrics.record_delivered();
                }
                Err(e) => {
                    self.metrics.record_failed();
                    eprintln!(
                        "[LOGGER ERROR] Handler #{} for level '{}' failed: {}",
                        idx, level, e
                    );
                }
            }
        }
    }

    #[inline(never)]
    pub fn log(&self, level: impl AsRef<str>, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, level.as_ref(), None, args);
    }

    #[inline(never)]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "debug", None, args);
    }

    #[inline(never)]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "info", None, args);
    }

    #[inline(never)]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "warn", None, args);
    }

    #[inline(never)]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "error", None, args);
    }

    #[inline(never)]
    pub fn fatal(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "fatal", None, args);
    }

    /// View of this logger that layers `session` onto every call
    pub fn session<'a>(&'a self, session: &'a Session) -> SessionLogger<'a> {
        SessionLogger {
            logger: self,
            session,
        }
    }

    /// Replace the routing table with one built from `handlers`
    pub fn reconfigure<I>(&self, handlers: I)
    where
        I: IntoIterator<Item = Arc<Handler>>,
    {
        self.router.reconfigure(handlers);
    }

    /// Build every handler in `config`, then swap them in
    ///
    /// # Errors
    ///
    /// Any sink or time-format error aborts before anything is swapped, so
    /// the previous table and layout stay active.
    pub fn apply_config(&self, config: &LoggingConfig, registry: &SinkRegistry) -> Result<()> {
        let time_format = config.parsed_time_format()?;
        let handlers = registry.build_handlers(&config.handlers)?;

        self.router.reconfigure(handlers);
        if let Some(format) = time_format {
            self.assembler.set_time_format(format);
        }
        Ok(())
    }

    pub fn set_time_format(&self, format: TimestampFormat) {
        self.assembler.set_time_format(format);
    }

    pub fn add_path_marker(&self, marker: impl Into<String>) {
        self.assembler.call_sites().add_path_marker(marker);
    }

    /// Flush every sink reachable from the current table
    ///
    /// Batching sinks send their open window immediately.
    pub fn flush(&self) -> Result<()> {
        let mut first_error = None;
        for handler in self.router.snapshot().unique_handlers() {
            if let Err(e) = handler.flush() {
                eprintln!("[LOGGER ERROR] Failed to flush handler: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn router(&self) -> &LevelRouter {
        &self.router
    }

    pub fn call_sites(&self) -> &CallSiteCache {
        self.assembler.call_sites()
    }

    pub fn time_format(&self) -> TimestampFormat {
        self.assembler.time_format()
    }

    /// Get the logger metrics for observability
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_pipeline::Logger;
    ///
    /// let logger = Logger::builder().build();
    /// logger.log("trace", format_args!("nobody listens"));
    /// assert_eq!(logger.metrics().unrouted_count(), 1);
    /// ```
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Level calls bound to a logger and a session overlay
#[derive(Clone, Copy)]
pub struct SessionLogger<'a> {
    logger: &'a Logger,
    session: &'a Session,
}

impl SessionLogger<'_> {
    #[inline(never)]
    pub fn log_with_skip(&self, skip: usize, level: impl AsRef<str>, args: fmt::Arguments<'_>) {
        self.logger
            .log_with_skip(skip + 1, level.as_ref(), Some(self.session), args);
    }

    #[inline(never)]
    pub fn log(&self, level: impl AsRef<str>, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, level, args);
    }

    #[inline(never)]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "debug", args);
    }

    #[inline(never)]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "info", args);
    }

    #[inline(never)]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "warn", args);
    }

    #[inline(never)]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "error", args);
    }

    #[inline(never)]
    pub fn fatal(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "fatal", args);
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use rust_log_pipeline::prelude::*;
///
/// let logger = Logger::builder()
///     .time_format(TimestampFormat::Rfc3339)
///     .path_marker("/workspace/")
///     .handler(Handler::new("$level $message").levels(["error"]).sink(ConsoleSink::stderr()))
///     .build();
/// assert_eq!(logger.router().route("error").len(), 1);
/// assert!(logger.router().route("info").is_empty());
/// ```
pub struct LoggerBuilder {
    time_format: TimestampFormat,
    path_markers: Vec<String>,
    global_fields: Context,
    escape_line_breaks: bool,
    handlers: Vec<Arc<Handler>>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            time_format: TimestampFormat::default(),
            path_markers: DEFAULT_PATH_MARKERS.iter().map(|m| m.to_string()).collect(),
            global_fields: Context::new(),
            escape_line_breaks: false,
            handlers: Vec::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn time_format(mut self, format: TimestampFormat) -> Self {
        self.time_format = format;
        self
    }

    /// Add a source-tree marker trimmed from call-site file paths
    ///
    /// The defaults only cover cargo registry, git checkout and toolchain
    /// sources. Application files keep their absolute build path unless a
    /// marker such as `"/src/"` or the workspace directory name is added.
    #[must_use = "builder methods return a new value"]
    pub fn path_marker(mut self, marker: impl Into<String>) -> Self {
        self.path_markers.push(marker.into());
        self
    }

    /// Extra process-wide fields, layered over `ip` and `hostname`
    #[must_use = "builder methods return a new value"]
    pub fn global_context(mut self, fields: Context) -> Self {
        self.global_fields.extend_from(&fields);
        self
    }

    /// Escape `\n`, `\r` and `\t` in messages so every call stays on one line
    #[must_use = "builder methods return a new value"]
    pub fn escape_line_breaks(mut self, enabled: bool) -> Self {
        self.escape_line_breaks = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn handler(mut self, handler: Handler) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shared_handler(mut self, handler: Arc<Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Build the Logger
    ///
    /// Without any handler the default stderr handler is installed.
    pub fn build(self) -> Logger {
        let router = if self.handlers.is_empty() {
            LevelRouter::new()
        } else {
            LevelRouter::with_handlers(self.handlers)
        };

        let mut global = super::assembler::global_static_context().as_ref().clone();
        global.extend_from(&self.global_fields);

        Logger {
            router,
            assembler: ContextAssembler::with_parts(
                Arc::new(global),
                CallSiteCache::with_markers(self.path_markers),
                self.time_format,
            )
            .escape_line_breaks(self.escape_line_breaks),
            metrics: LoggerMetrics::new(),
        }
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Create a builder for Logger
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }
}
