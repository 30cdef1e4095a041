//! Time layouts for the `$time` context field
//!
//! Times are rendered in the local timezone. Configuration accepts either one
//! of the named layouts below or a chrono strftime string; strftime strings
//! are validated when parsed. A `Custom` layout built directly is never
//! checked, so rendering falls back to the raw layout rather than failing.

use super::error::{LoggerError, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use std::fmt::Write as _;

/// Layout used when none is configured: `2025-01-08:10:30:45+0100`
pub const DEFAULT_TIME_LAYOUT: &str = "%Y-%m-%d:%H:%M:%S%z";

/// Timestamp layout options
///
/// # Examples
///
/// ```
/// use rust_log_pipeline::core::TimestampFormat;
///
/// let format = TimestampFormat::parse("rfc3339").unwrap();
/// assert_eq!(format, TimestampFormat::Rfc3339);
///
/// let custom = TimestampFormat::parse("%d/%b/%Y:%H:%M:%S %z").unwrap();
/// assert!(matches!(custom, TimestampFormat::Custom(_)));
///
/// assert!(TimestampFormat::parse("%Q").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123+01:00`
    Iso8601,

    /// ISO 8601 with microseconds: `2025-01-08T10:30:45.123456+01:00`
    Iso8601Micros,

    /// RFC 3339: `2025-01-08T10:30:45+01:00`
    Rfc3339,

    /// Unix timestamp in seconds
    Unix,

    /// Unix timestamp in milliseconds
    UnixMillis,

    /// Unix timestamp in microseconds
    UnixMicros,

    /// strftime layout; build with `parse` to validate it up front. An
    /// invalid layout is rendered verbatim instead of a time.
    Custom(String),
}

impl Default for TimestampFormat {
    fn default() -> Self {
        TimestampFormat::Custom(DEFAULT_TIME_LAYOUT.to_string())
    }
}

impl TimestampFormat {
    /// Parse a layout name or strftime string
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimeFormat` for an empty string or a strftime string
    /// containing a specifier chrono does not understand.
    pub fn parse(layout: &str) -> Result<Self> {
        let named = match layout.to_ascii_lowercase().as_str() {
            "iso8601" => Some(TimestampFormat::Iso8601),
            "iso8601_micros" => Some(TimestampFormat::Iso8601Micros),
            "rfc3339" => Some(TimestampFormat::Rfc3339),
            "unix" => Some(TimestampFormat::Unix),
            "unix_millis" => Some(TimestampFormat::UnixMillis),
            "unix_micros" => Some(TimestampFormat::UnixMicros),
            _ => None,
        };
        if let Some(format) = named {
            return Ok(format);
        }

        if layout.is_empty()
            || StrftimeItems::new(layout).any(|item| matches!(item, Item::Error))
        {
            return Err(LoggerError::InvalidTimeFormat(layout.to_string()));
        }
        Ok(TimestampFormat::Custom(layout.to_string()))
    }

    #[must_use]
    pub fn format(&self, datetime: &DateTime<Local>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string(),
            TimestampFormat::Iso8601Micros => {
                datetime.format("%Y-%m-%dT%H:%M:%S%.6f%:z").to_string()
            }
            TimestampFormat::Rfc3339 => datetime.to_rfc3339(),
            TimestampFormat::Unix => datetime.timestamp().to_string(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::UnixMicros => datetime.timestamp_micros().to_string(),
            TimestampFormat::Custom(layout) => {
                // Layouts built without `parse` may hold specifiers chrono rejects.
                let mut rendered = String::new();
                match write!(rendered, "{}", datetime.format(layout)) {
                    Ok(()) => rendered,
                    Err(_) => layout.clone(),
                }
            }
        }
    }

    /// Render the current local time
    #[must_use]
    pub fn now(&self) -> String {
        self.format(&Local::now())
    }

    /// Check if this is a Unix-based numeric format
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TimestampFormat::Unix | TimestampFormat::UnixMillis | TimestampFormat::UnixMicros
        )
    }
}
