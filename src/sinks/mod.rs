//! Sink implementations

pub mod console;
pub mod email;
pub mod file;
pub mod rotating_file;

pub use console::ConsoleSink;
pub use email::{BatchSettings, BatchingEmailSink, EmailConfig, MailEnvelope, MailTransport};
#[cfg(feature = "smtp")]
pub use email::SmtpMailer;
pub use file::{FileConfig, FileSink};
pub use rotating_file::{RotationStrategy, TimeRotateConfig, TimeRotateSink};

pub use crate::core::Sink;
