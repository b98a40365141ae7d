//! Traffic log
//!
//! Appends clean received lines and sent payloads to a plain text file.
//! Every append opens, writes and closes the file; no handle is kept.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::error::LogError;

/// Prefix marking outbound records
pub const SENT_PREFIX: &str = "Sent: ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    pub path: Option<PathBuf>,
}

/// Append-only log, shared between the shell and the session threads
#[derive(Debug, Default)]
pub struct LogSink {
    settings: Mutex<LogSettings>,
}

impl LogSink {
    pub fn new(settings: LogSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }

    /// Replace the settings; `None` keeps the current path
    pub fn configure(&self, enabled: bool, path: Option<PathBuf>) {
        let mut settings = self.lock();
        settings.enabled = enabled;
        if path.is_some() {
            settings.path = path;
        }
    }

    pub fn settings(&self) -> LogSettings {
        self.lock().clone()
    }

    /// Append a received line
    ///
    /// Returns `Ok(false)` without touching the filesystem when logging is
    /// disabled or no path has been chosen.
    pub fn append(&self, line: &str) -> Result<bool, LogError> {
        let settings = self.settings();
        match settings.path {
            Some(ref path) if settings.enabled => {
                write_record(path, line)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Append an outbound payload, tagged with `SENT_PREFIX`
    pub fn append_sent(&self, text: &str) -> Result<bool, LogError> {
        let text = text.trim_end_matches(['\r', '\n']);
        self.append(&format!("{}{}", SENT_PREFIX, text))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogSettings> {
        // Settings are plain data; a poisoned lock still holds a usable value
        self.settings.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn write_record(path: &Path, line: &str) -> Result<(), LogError> {
    let to_err = |source| LogError::Io {
        path: path.to_path_buf(),
        source: Arc::new(source),
    };

    let record: String = line.chars().filter(|&c| c != '\0').collect();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_err)?;
    writeln!(file, "{}", record).map_err(to_err)
}
