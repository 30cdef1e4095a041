//! Handler: a template bound to an ordered list of sinks

use super::context::Context;
use super::error::{panic_message, LoggerError, Result};
use super::log_level::LogLevel;
use super::sink::Sink;
use super::template::Template;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Template used by the handler installed before any configuration
pub const DEFAULT_FORMAT: &str = "$level [$time][$file:$line][$func] $message";

/// Formats a message once and writes it to each of its sinks in order
///
/// Handlers are immutable once built and shared by every level they serve.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::core::Handler;
/// use rust_log_pipeline::sinks::ConsoleSink;
///
/// let handler = Handler::new("$level: $message")
///     .levels(["warn", "error"])
///     .sink(ConsoleSink::stderr());
/// assert_eq!(handler.level_names(), ["warn", "error"]);
/// ```
pub struct Handler {
    levels: Vec<String>,
    template: Template,
    sinks: Vec<Arc<dyn Sink>>,
}

impl Handler {
    pub fn new(format: &str) -> Self {
        Self {
            levels: Vec::new(),
            template: Template::parse(format),
            sinks: Vec::new(),
        }
    }

    /// Set the levels this handler serves
    #[must_use = "builder methods return a new value"]
    pub fn levels<I, S>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.levels = levels.into_iter().map(|l| l.as_ref().to_string()).collect();
        self
    }

    /// Append a sink
    #[must_use = "builder methods return a new value"]
    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Append an already shared sink
    #[must_use = "builder methods return a new value"]
    pub fn shared_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// The handler installed by default: every standard level to stderr
    pub fn default_stderr() -> Self {
        Handler::new(DEFAULT_FORMAT)
            .levels(LogLevel::ALL)
            .sink(crate::sinks::ConsoleSink::stderr())
    }

    pub fn level_names(&self) -> &[String] {
        &self.levels
    }

    pub fn format(&self) -> &str {
        self.template.source()
    }

    pub fn sinks(&self) -> &[Arc<dyn Sink>] {
        &self.sinks
    }

    /// Render one line (newline included) for the given layers
    pub fn render(&self, contexts: &[&Context]) -> String {
        let mut line = self.template.render(contexts);
        line.push('\n');
        line
    }

    /// Format once and write to every sink, stopping at the first failure
    ///
    /// A sink that panics is reported as a failure of that sink.
    pub fn deliver(&self, contexts: &[&Context]) -> Result<()> {
        let line = self.render(contexts);
        let bytes = line.as_bytes();

        for sink in &self.sinks {
            match catch_unwind(AssertUnwindSafe(|| sink.write(bytes))) {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e),
                Err(panic_info) => {
                    return Err(LoggerError::sink_panicked(
                        sink.name(),
                        panic_message(panic_info.as_ref()),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Flush every sink, reporting the first error after trying them all
    pub fn flush(&self) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("levels", &self.levels)
            .field("format", &self.template.source())
            .field(
                "sinks",
                &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
