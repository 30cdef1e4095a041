//! Core pipeline types and traits

pub mod assembler;
pub mod call_site;
pub mod context;
pub mod error;
pub mod handler;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod router;
pub mod session;
pub mod sink;
pub mod template;
pub mod timestamp;

pub use assembler::{ContextAssembler, ContextStack};
pub use call_site::CallSiteCache;
pub use context::{Context, FieldValue};
pub use error::{LoggerError, Result};
pub use handler::Handler;
pub use log_level::LogLevel;
pub use logger::{Logger, LoggerBuilder, SessionLogger, DEFAULT_SHUTDOWN_TIMEOUT};
pub use metrics::{BatchMetrics, LoggerMetrics};
pub use router::{LevelRouter, RoutingTable};
pub use session::Session;
pub use sink::Sink;
pub use template::Template;
pub use timestamp::TimestampFormat;
