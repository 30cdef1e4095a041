//! Sink trait for byte-stream log destinations

use super::error::Result;

/// Destination for formatted log lines
///
/// A sink receives the already formatted bytes of one message per call and
/// knows nothing about levels or templates. Sinks are shared between handlers
/// and threads, so writes take `&self` and implementations synchronize
/// internally.
pub trait Sink: Send + Sync {
    /// Write one formatted message, returning the number of bytes accepted
    fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Push buffered output to its destination
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}
