//! Logging macros with `format!`-style arguments.
//!
//! Every level macro has two forms: with a logger (or session) expression
//! first, or starting with the format string to use the process-wide logger.
//!
//! # Examples
//!
//! ```
//! use rust_log_pipeline::prelude::*;
//! use rust_log_pipeline::{info, warn};
//!
//! let logger = Logger::builder().build();
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! let session = Session::new().with("request_id", "abc-123");
//! warn!(logger.session(&session), "slow request: {}ms", 950);
//!
//! // Process-wide logger
//! info!("cache warmed with {} entries", 128);
//! ```

/// Log at any level, including ones outside the standard five.
///
/// # Examples
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let logger = Logger::builder().build();
/// use rust_log_pipeline::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, "audit", "user {} exported the report", 42);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format_args!($($arg)+))
    };
}

/// Log a debug-level message.
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let logger = Logger::builder().build();
/// use rust_log_pipeline::debug;
/// debug!(logger, "Counter value: {}", 10);
/// ```
#[macro_export]
macro_rules! debug {
    ($fmt:literal $($rest:tt)*) => {
        $crate::global::log($crate::LogLevel::Debug, format_args!($fmt $($rest)*))
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let logger = Logger::builder().build();
/// use rust_log_pipeline::info;
/// info!(logger, "Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! info {
    ($fmt:literal $($rest:tt)*) => {
        $crate::global::log($crate::LogLevel::Info, format_args!($fmt $($rest)*))
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($fmt:literal $($rest:tt)*) => {
        $crate::global::log($crate::LogLevel::Warn, format_args!($fmt $($rest)*))
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let logger = Logger::builder().build();
/// use rust_log_pipeline::error;
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($fmt:literal $($rest:tt)*) => {
        $crate::global::log($crate::LogLevel::Error, format_args!($fmt $($rest)*))
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message. Logging only; the process keeps running.
#[macro_export]
macro_rules! fatal {
    ($fmt:literal $($rest:tt)*) => {
        $crate::global::log($crate::LogLevel::Fatal, format_args!($fmt $($rest)*))
    };
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{Handler, LogLevel, Logger, Result, Session, Sink};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl Sink for Lines {
        fn write(&self, buf: &[u8]) -> Result<usize> {
            self.0.lock().push(String::from_utf8_lossy(buf).into_owned());
            Ok(buf.len())
        }

        fn name(&self) -> &str {
            "lines"
        }
    }

    fn logger() -> (Logger, Arc<Lines>) {
        let lines = Arc::new(Lines::default());
        let logger = Logger::builder()
            .handler(
                Handler::new("$level|$message|$tag")
                    .levels(["debug", "info", "warn", "error", "fatal", "audit"])
                    .shared_sink(lines.clone()),
            )
            .build();
        (logger, lines)
    }

    #[test]
    fn test_level_macros() {
        let (logger, lines) = logger();
        debug!(logger, "d{}", 1);
        info!(logger, "i");
        warn!(logger, "w{}", "!");
        error!(logger, "e{code}", code = 500);
        fatal!(logger, "f");

        assert_eq!(
            *lines.0.lock(),
            vec![
                "debug|d1|$tag\n",
                "info|i|$tag\n",
                "warn|w!|$tag\n",
                "error|e500|$tag\n",
                "fatal|f|$tag\n",
            ]
        );
    }

    #[test]
    fn test_log_macro_with_custom_level() {
        let (logger, lines) = logger();
        log!(logger, "audit", "exported {}", "report");
        log!(logger, LogLevel::Info, "typed");
        log!(logger, "trace", "dropped");

        assert_eq!(
            *lines.0.lock(),
            vec!["audit|exported report|$tag\n", "info|typed|$tag\n"]
        );
    }

    #[test]
    fn test_session_macro() {
        let (logger, lines) = logger();
        let session = Session::new().with("tag", "s1");
        info!(logger.session(&session), "with session");

        assert_eq!(*lines.0.lock(), vec!["info|with session|s1\n"]);
    }
}
