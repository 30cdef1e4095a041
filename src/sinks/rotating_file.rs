//! Time-rotating file sink (`timerotate`)
//!
//! Lines are appended to a single active file. When the configured boundary
//! passes, the active file becomes `<name>.1`, older backups shift up by
//! one, and anything beyond `max_backups` is deleted. Backups can be gzip
//! compressed on rotation.

use crate::core::{LoggerError, Result, Sink};
use chrono::{DateTime, Local, Timelike};
use parking_lot::Mutex;
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// When the active file is rotated
///
/// # Examples
///
/// ```
/// use rust_log_pipeline::sinks::RotationStrategy;
///
/// let nightly = RotationStrategy::Daily { hour: 2 };
/// let large = RotationStrategy::Size { max_bytes: 50 * 1024 * 1024 };
/// assert_ne!(nightly, large);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RotationStrategy {
    /// At the start of every clock hour
    Hourly,

    /// Once a day, the first write at or after `hour` (0-23)
    Daily { hour: u8 },

    /// Every `secs` seconds since the last rotation
    Interval { secs: u64 },

    /// Once the file reaches `max_bytes`
    Size { max_bytes: u64 },

    /// Never; useful when rotation is done externally
    Never,
}

impl Default for RotationStrategy {
    fn default() -> Self {
        RotationStrategy::Daily { hour: 0 }
    }
}

impl RotationStrategy {
    /// Whether a file last rotated at `last`, now `size` bytes long, is due at `now`
    pub fn is_due(&self, last: DateTime<Local>, now: DateTime<Local>, size: u64) -> bool {
        match self {
            RotationStrategy::Never => false,

            RotationStrategy::Size { max_bytes } => size >= *max_bytes,

            RotationStrategy::Interval { secs } => {
                let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
                elapsed >= Duration::from_secs(*secs)
            }

            RotationStrategy::Daily { hour } => {
                now.date_naive() != last.date_naive() && now.hour() >= u32::from(*hour)
            }

            RotationStrategy::Hourly => {
                now.date_naive() != last.date_naive() || now.hour() != last.hour()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            RotationStrategy::Daily { hour } if *hour > 23 => Err(LoggerError::config(
                "timerotate",
                format!("daily rotation hour must be 0-23, got {}", hour),
            )),
            RotationStrategy::Interval { secs: 0 } => Err(LoggerError::config(
                "timerotate",
                "rotation interval must be positive",
            )),
            _ => Ok(()),
        }
    }
}

fn default_max_backups() -> usize {
    7
}

/// Settings for the `timerotate` sink type
///
/// ```
/// use rust_log_pipeline::sinks::{RotationStrategy, TimeRotateConfig};
///
/// let config: TimeRotateConfig = serde_json::from_str(
///     r#"{"path": "/var/log/app.log", "strategy": {"kind": "hourly"}, "compress": true}"#,
/// ).unwrap();
/// assert_eq!(config.strategy, RotationStrategy::Hourly);
/// assert_eq!(config.max_backups, 7);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeRotateConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub strategy: RotationStrategy,
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    #[serde(default)]
    pub compress: bool,
}

impl TimeRotateConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            strategy: RotationStrategy::default(),
            max_backups: default_max_backups(),
            compress: false,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn strategy(mut self, strategy: RotationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

#[derive(Debug)]
struct ActiveFile {
    writer: Option<BufWriter<File>>,
    size: u64,
    last_rotation: DateTime<Local>,
}

#[derive(Debug)]
pub struct TimeRotateSink {
    base_path: PathBuf,
    config: TimeRotateConfig,
    active: Mutex<ActiveFile>,
}

impl TimeRotateSink {
    /// Open the active file, creating parent directories as needed
    ///
    /// The file's modification time counts as the last rotation, so a
    /// restart does not reset the current period.
    pub fn new(config: TimeRotateConfig) -> Result<Self> {
        config.strategy.validate()?;
        let base_path = config.path.clone();

        if let Some(parent) = base_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let (file, size, last_rotation) = open_active(&base_path)?;

        Ok(Self {
            base_path,
            config,
            active: Mutex::new(ActiveFile {
                writer: Some(BufWriter::new(file)),
                size,
                last_rotation,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    pub fn strategy(&self) -> &RotationStrategy {
        &self.config.strategy
    }

    pub fn current_size(&self) -> u64 {
        self.active.lock().size
    }

    /// Rotate immediately regardless of the strategy
    pub fn rotate_now(&self) -> Result<()> {
        let mut active = self.active.lock();
        self.rotate(&mut active)
    }

    fn rotate(&self, active: &mut ActiveFile) -> Result<()> {
        if let Some(mut writer) = active.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        if self.config.max_backups == 0 {
            if self.base_path.exists() {
                fs::remove_file(&self.base_path).map_err(|e| {
                    LoggerError::file_rotation(
                        self.base_path.display().to_string(),
                        format!("Failed to discard log file: {}", e),
                    )
                })?;
            }
        } else {
            self.shift_backups()?;

            let first = self.backup_path(1, false);
            if self.base_path.exists() {
                fs::rename(&self.base_path, &first).map_err(|e| {
                    LoggerError::file_rotation(
                        self.base_path.display().to_string(),
                        format!("Failed to rotate current log file: {}", e),
                    )
                })?;

                if self.config.compress {
                    compress_file(&first, &self.backup_path(1, true))?;
                }
            }
        }

        let (file, size, _) = open_active(&self.base_path)?;
        active.writer = Some(BufWriter::new(file));
        active.size = size;
        active.last_rotation = Local::now();
        Ok(())
    }

    /// Drop the oldest backup and move `n` to `n + 1` for the rest
    fn shift_backups(&self) -> Result<()> {
        let max = self.config.max_backups;
        for compressed in [false, true] {
            let oldest = self.backup_path(max, compressed);
            if oldest.exists() {
                if let Err(e) = fs::remove_file(&oldest) {
                    eprintln!(
                        "[LOGGER WARNING] Failed to remove oldest backup {}: {}",
                        oldest.display(),
                        e
                    );
                }
            }
        }

        for index in (1..max).rev() {
            for compressed in [false, true] {
                let from = self.backup_path(index, compressed);
                if from.exists() {
                    let to = self.backup_path(index + 1, compressed);
                    fs::rename(&from, &to).map_err(|e| {
                        LoggerError::file_rotation(
                            from.display().to_string(),
                            format!("Failed to rotate backup files: {}", e),
                        )
                    })?;
                }
            }
        }
        Ok(())
    }

    /// `<name>.<index>` or `<name>.<index>.gz`
    pub fn backup_path(&self, index: usize, compressed: bool) -> PathBuf {
        let filename = self
            .base_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("app.log");
        let name = if compressed {
            format!("{}.{}.gz", filename, index)
        } else {
            format!("{}.{}", filename, index)
        };
        self.base_path.with_file_name(name)
    }
}

fn open_active(path: &Path) -> Result<(File, u64, DateTime<Local>)> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            LoggerError::io_operation(
                "open log file",
                format!("Failed to open '{}'", path.display()),
                e,
            )
        })?;

    let metadata = file.metadata().map_err(|e| {
        LoggerError::io_operation(
            "open log file",
            format!("Cannot access metadata of '{}'", path.display()),
            e,
        )
    })?;

    let last_rotation = metadata
        .modified()
        .map(DateTime::<Local>::from)
        .unwrap_or_else(|_| Local::now());
    Ok((file, metadata.len(), last_rotation))
}

/// Gzip `path` into `gz_path`, removing the original only once the archive is complete
fn compress_file(path: &Path, gz_path: &Path) -> Result<()> {
    use flate2::{write::GzEncoder, Compression};
    use std::io::{self, BufReader};

    let temp_path = gz_path.with_extension("gz.tmp");
    let compress = || -> io::Result<()> {
        let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
        let output = BufWriter::with_capacity(64 * 1024, File::create(&temp_path)?);
        let mut encoder = GzEncoder::new(output, Compression::default());
        io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()?;
        fs::rename(&temp_path, gz_path)
    };

    if let Err(e) = compress() {
        let _ = fs::remove_file(&temp_path);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress '{}'", path.display()),
            e,
        ));
    }

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compressed {} but failed to remove the original: {}",
            path.display(),
            e
        );
    }
    Ok(())
}

impl Sink for TimeRotateSink {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut active = self.active.lock();

        if self
            .config
            .strategy
            .is_due(active.last_rotation, Local::now(), active.size)
        {
            if let Err(e) = self.rotate(&mut active) {
                eprintln!(
                    "[LOGGER WARNING] Log rotation failed: {}. Continuing with current file.",
                    e
                );
                if active.writer.is_none() {
                    let (file, size, _) = open_active(&self.base_path)?;
                    active.writer = Some(BufWriter::new(file));
                    active.size = size;
                }
                // Start a fresh period so a broken rotation is not retried on every line.
                active.last_rotation = Local::now();
                active.size = 0;
            }
        }

        let writer = active
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("rotating file writer not initialized"))?;
        writer.write_all(buf)?;
        writer.flush()?;
        active.size += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&self) -> Result<()> {
        if let Some(writer) = self.active.lock().writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "timerotate"
    }
}

impl Drop for TimeRotateSink {
    fn drop(&mut self) {
        if let Some(writer) = self.active.get_mut().writer.as_mut() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Read;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, day: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, day, h, m, 0).unwrap()
    }

    #[test]
    fn test_hourly_due_on_hour_change() {
        let s = RotationStrategy::Hourly;
        assert!(!s.is_due(at(10, 5, 1), at(10, 59, 1), 0));
        assert!(s.is_due(at(10, 59, 1), at(11, 0, 1), 0));
        assert!(s.is_due(at(10, 0, 1), at(10, 0, 2), 0));
    }

    #[test]
    fn test_daily_due_after_hour_on_new_day() {
        let s = RotationStrategy::Daily { hour: 2 };
        assert!(!s.is_due(at(23, 0, 1), at(1, 0, 2), 0));
        assert!(s.is_due(at(23, 0, 1), at(2, 0, 2), 0));
        assert!(!s.is_due(at(3, 0, 2), at(23, 0, 2), 0));
    }

    #[test]
    fn test_interval_and_size() {
        let s = RotationStrategy::Interval { secs: 600 };
        assert!(!s.is_due(at(10, 0, 1), at(10, 9, 1), 0));
        assert!(s.is_due(at(10, 0, 1), at(10, 10, 1), 0));

        let s = RotationStrategy::Size { max_bytes: 10 };
        assert!(!s.is_due(at(10, 0, 1), at(10, 0, 1), 9));
        assert!(s.is_due(at(10, 0, 1), at(10, 0, 1), 10));
        assert!(!RotationStrategy::Never.is_due(at(0, 0, 1), at(0, 0, 9), u64::MAX));
    }

    #[test]
    fn test_invalid_strategy_rejected() {
        let dir = TempDir::new().unwrap();
        let config = TimeRotateConfig::new(dir.path().join("a.log"))
            .strategy(RotationStrategy::Daily { hour: 24 });
        assert!(TimeRotateSink::new(config).unwrap_err().is_configuration());
    }

    #[test]
    fn test_size_rotation_keeps_numbered_backups() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let sink = TimeRotateSink::new(
            TimeRotateConfig::new(&path)
                .strategy(RotationStrategy::Size { max_bytes: 4 })
                .max_backups(2),
        )
        .unwrap();

        for line in ["aaaa\n", "bbbb\n", "cccc\n", "dddd\n"] {
            sink.write(line.as_bytes()).unwrap();
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), "dddd\n");
        assert_eq!(fs::read_to_string(sink.backup_path(1, false)).unwrap(), "cccc\n");
        assert_eq!(fs::read_to_string(sink.backup_path(2, false)).unwrap(), "bbbb\n");
        assert!(!sink.backup_path(3, false).exists());
    }

    #[test]
    fn test_compressed_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let sink = TimeRotateSink::new(
            TimeRotateConfig::new(&path)
                .strategy(RotationStrategy::Never)
                .compress(true),
        )
        .unwrap();

        sink.write(b"archived line\n").unwrap();
        sink.rotate_now().unwrap();
        sink.write(b"fresh\n").unwrap();

        let gz = sink.backup_path(1, true);
        assert!(gz.exists());
        assert!(!sink.backup_path(1, false).exists());

        let mut decoded = String::new();
        flate2::read::GzDecoder::new(File::open(gz).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "archived line\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
        assert_eq!(sink.current_size(), 6);
    }

    #[test]
    fn test_config_from_json() {
        let config: TimeRotateConfig = serde_json::from_str(
            r#"{"path": "x.log", "strategy": {"kind": "daily", "hour": 3}, "max_backups": 3}"#,
        )
        .unwrap();
        assert_eq!(config.strategy, RotationStrategy::Daily { hour: 3 });
        assert_eq!(config.max_backups, 3);
        assert!(!config.compress);
    }
}
