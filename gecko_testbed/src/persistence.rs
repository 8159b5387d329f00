//! Durable storage: run-log files and the calibration record.

use chrono::{DateTime, Local};
use gecko_common::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name pattern of run logs.
pub const LOG_FILE_FORMAT: &str = "log_%Y-%m-%d__%H-%M-%S.txt";

// ─── Run logs ───────────────────────────────────────────────────────

/// Destination of one run's log.
pub trait RunLogWriter: Send {
    /// Append one line.
    fn append_line(&mut self, line: &str) -> Result<(), TestbedError>;

    /// Flush and close; returns where the log was stored.
    fn close(self: Box<Self>) -> Result<String, TestbedError>;
}

/// Factory of run-log writers.
pub trait LogStore: Send + Sync {
    /// Create the log for a run started at `started`.
    fn create(&self, started: DateTime<Local>) -> Result<Box<dyn RunLogWriter>, TestbedError>;
}

/// One text file per run in a directory.
pub struct FileLogStore {
    dir: PathBuf,
}

impl FileLogStore {
    /// Store writing into `dir` (created on demand).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the log for a run started at `started`.
    pub fn path_for(&self, started: DateTime<Local>) -> PathBuf {
        self.dir.join(started.format(LOG_FILE_FORMAT).to_string())
    }
}

impl LogStore for FileLogStore {
    fn create(&self, started: DateTime<Local>) -> Result<Box<dyn RunLogWriter>, TestbedError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            TestbedError::Persistence(format!("cannot create {:?}: {e}", self.dir))
        })?;
        let path = self.path_for(started);
        let file = File::create(&path)
            .map_err(|e| TestbedError::Persistence(format!("cannot create {path:?}: {e}")))?;
        debug!("Run log opened at {:?}", path);
        Ok(Box::new(FileLogWriter {
            path,
            out: BufWriter::new(file),
        }))
    }
}

struct FileLogWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl RunLogWriter for FileLogWriter {
    fn append_line(&mut self, line: &str) -> Result<(), TestbedError> {
        writeln!(self.out, "{line}")
            .map_err(|e| TestbedError::Persistence(format!("{:?}: {e}", self.path)))
    }

    fn close(mut self: Box<Self>) -> Result<String, TestbedError> {
        self.out
            .flush()
            .map_err(|e| TestbedError::Persistence(format!("{:?}: {e}", self.path)))?;
        Ok(self.path.display().to_string())
    }
}

// ─── Calibration ────────────────────────────────────────────────────

/// JSON calibration record on disk.
pub struct CalibrationFile {
    path: PathBuf,
}

impl CalibrationFile {
    /// Record at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored profile, `None` if no record exists.
    pub fn load(&self) -> Result<Option<CalibrationProfile>, TestbedError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(TestbedError::Persistence(format!(
                    "cannot read {:?}: {e}",
                    self.path
                )));
            }
        };
        let profile: CalibrationProfile = serde_json::from_str(&text).map_err(|e| {
            TestbedError::Persistence(format!("invalid calibration in {:?}: {e}", self.path))
        })?;
        profile.validate()?;
        info!("Loaded calibration from {:?}: {}", self.path, profile);
        Ok(Some(profile))
    }

    /// Load the stored profile or fall back to `defaults`.
    pub fn load_or(&self, defaults: CalibrationProfile) -> Result<CalibrationProfile, TestbedError> {
        Ok(self.load()?.unwrap_or(defaults))
    }

    /// Write the profile, replacing any previous record.
    pub fn save(&self, profile: &CalibrationProfile) -> Result<(), TestbedError> {
        let text = serde_json::to_string_pretty(profile)
            .map_err(|e| TestbedError::Persistence(e.to_string()))?;
        fs::write(&self.path, text)
            .map_err(|e| TestbedError::Persistence(format!("cannot write {:?}: {e}", self.path)))?;
        info!("Saved calibration to {:?}", self.path);
        Ok(())
    }
}
