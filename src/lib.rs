//! # Rust Log Pipeline
//!
//! A process-local logging pipeline: leveled calls are routed to handlers,
//! each handler renders a `$key` template against layered context and
//! writes the line to its sinks.
//!
//! ## Features
//!
//! - **Atomic reconfiguration**: the level routing table is swapped whole
//! - **Layered context**: host facts, cached call-site facts, per-call facts and sessions
//! - **Sinks**: console, file, time-rotating file, and batched email
//! - **Typed configuration**: JSON descriptors resolved through a sink registry
//!
//! ```
//! use rust_log_pipeline::prelude::*;
//! use rust_log_pipeline::error;
//!
//! let logger = Logger::builder()
//!     .handler(Handler::new("$level: $message").levels(["error"]).sink(ConsoleSink::stderr()))
//!     .build();
//! error!(logger, "disk {}", "full");
//! ```

pub mod config;
pub mod core;
pub mod global;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::config::{HandlerConfig, LoggingConfig, SinkConfig, SinkRegistry};
    pub use crate::core::{
        Context, FieldValue, Handler, LogLevel, Logger, LoggerBuilder, LoggerError,
        LoggerMetrics, Result, Session, SessionLogger, Sink, TimestampFormat,
        DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::sinks::{BatchSettings, BatchingEmailSink, ConsoleSink, FileSink, TimeRotateSink};
}

pub use config::{LoggingConfig, SinkRegistry};
pub use core::{
    BatchMetrics, Context, FieldValue, Handler, LevelRouter, LogLevel, Logger, LoggerBuilder,
    LoggerError, LoggerMetrics, Result, Session, SessionLogger, Sink, TimestampFormat,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use sinks::{ConsoleSink, FileSink};
