//! Error types for the logging pipeline

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (configuration) parse error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Sink descriptor names a type no constructor is registered for
    #[error("Unknown sink type: {0:?}")]
    UnknownSinkType(String),

    /// Sink descriptor carries no `type` discriminator
    #[error("Missing sink type")]
    MissingSinkType,

    /// Time layout that chrono cannot render
    #[error("Invalid time format: {0:?}")]
    InvalidTimeFormat(String),

    /// A sink panicked while writing
    #[error("Sink '{sink}' panicked: {message}")]
    SinkPanicked { sink: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Outbound mail could not be built or delivered
    #[error("Mail transport error: {0}")]
    MailTransport(String),

    /// Batching worker is no longer accepting messages
    #[error("Failed to hand message to batching worker")]
    ChannelSendError,
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn sink_panicked(sink: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::SinkPanicked {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a mail transport error
    pub fn mail<S: Into<String>>(msg: S) -> Self {
        LoggerError::MailTransport(msg.into())
    }

    /// Whether this error came from configuration rather than delivery
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LoggerError::InvalidConfiguration { .. }
                | LoggerError::UnknownSinkType(_)
                | LoggerError::MissingSinkType
                | LoggerError::InvalidTimeFormat(_)
                | LoggerError::JsonError(_)
        )
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LoggerError::config("email", "missing field `server`");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
        assert!(err.is_configuration());

        let err = LoggerError::sink_panicked("capture", "boom");
        assert!(matches!(err, LoggerError::SinkPanicked { .. }));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_error_display() {
        let err = LoggerError::UnknownSinkType("carrier-pigeon".to_string());
        assert_eq!(err.to_string(), "Unknown sink type: \"carrier-pigeon\"");

        let err = LoggerError::file_rotation("/var/log/app.log", "Disk full");
        assert_eq!(
            err.to_string(),
            "File rotation failed for '/var/log/app.log': Disk full"
        );

        let err = LoggerError::mail("connection refused");
        assert_eq!(err.to_string(), "Mail transport error: connection refused");
    }

    #[test]
    fn test_io_operation_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = LoggerError::io_operation("opening log file", "cannot open app.log", io_err);

        assert!(matches!(err, LoggerError::IoOperation { .. }));
        assert!(err.to_string().contains("opening log file"));
        assert!(err.to_string().contains("cannot open app.log"));
    }
}
