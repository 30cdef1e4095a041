//! Console sinks

use crate::core::{Result, Sink};
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stderr,
    Stdout,
}

/// Writes formatted lines to the process's standard error or output
///
/// Each line is written under the stream lock, so lines from concurrent
/// callers never interleave.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    stream: Stream,
}

impl ConsoleSink {
    pub fn stderr() -> Self {
        Self {
            stream: Stream::Stderr,
        }
    }

    pub fn stdout() -> Self {
        Self {
            stream: Stream::Stdout,
        }
    }

    pub fn is_stderr(&self) -> bool {
        self.stream == Stream::Stderr
    }
}

impl Sink for ConsoleSink {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        match self.stream {
            Stream::Stderr => io::stderr().lock().write_all(buf)?,
            Stream::Stdout => io::stdout().lock().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&self) -> Result<()> {
        match self.stream {
            Stream::Stderr => io::stderr().flush()?,
            Stream::Stdout => io::stdout().flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        match self.stream {
            Stream::Stderr => "stderr",
            Stream::Stdout => "stdout",
        }
    }
}
