//! Append-only file sink

use crate::core::{LoggerError, Result, Sink};
use parking_lot::Mutex;
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Settings for the `file` sink type
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub path: PathBuf,
    /// Flush after every line instead of on demand
    #[serde(default = "default_auto_flush")]
    pub auto_flush: bool,
}

fn default_auto_flush() -> bool {
    true
}

pub struct FileSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    auto_flush: bool,
}

impl FileSink {
    /// Open `path` for appending, creating parent directories as needed
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(path.into(), true)
    }

    pub fn from_config(config: &FileConfig) -> Result<Self> {
        Self::open(config.path.clone(), config.auto_flush)
    }

    fn open(path: PathBuf, auto_flush: bool) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LoggerError::io_operation(
                    "open log file",
                    format!("Failed to open '{}'", path.display()),
                    e,
                )
            })?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
            auto_flush,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut writer = self.writer.lock();
        writer.write_all(buf)?;
        if self.auto_flush {
            writer.flush()?;
        }
        Ok(buf.len())
    }

    fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.writer.get_mut().flush();
    }
}
