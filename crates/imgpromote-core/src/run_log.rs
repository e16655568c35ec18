//! Per-run, append-only log artifact.
//!
//! A `RunLog` is created by the driver for one run and handed to the
//! promoter. Each entry becomes one line, `<RFC3339> <LEVEL> <message>`, in
//! the log file that is later attached to the notification email. Entries are
//! mirrored to `tracing` so console output and the artifact agree.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};

/// Severity of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARNING",
            LogLevel::Error => "ERROR",
        })
    }
}

#[derive(Debug)]
enum Sink {
    Discard,
    File { path: PathBuf, file: Mutex<File> },
    Memory(Mutex<Vec<String>>),
}

/// Cloneable handle to the run's log sink.
#[derive(Debug, Clone)]
pub struct RunLog {
    sink: Arc<Sink>,
}

impl RunLog {
    /// Append to `path`, creating it and its parent directory if needed.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            sink: Arc::new(Sink::File {
                path: path.to_path_buf(),
                file: Mutex::new(file),
            }),
        })
    }

    /// Keep entries in memory; used by tests and dry inspection.
    pub fn in_memory() -> Self {
        Self {
            sink: Arc::new(Sink::Memory(Mutex::new(Vec::new()))),
        }
    }

    /// Mirror to tracing only.
    pub fn discard() -> Self {
        Self {
            sink: Arc::new(Sink::Discard),
        }
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match self.sink.as_ref() {
            Sink::File { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Lines recorded by an in-memory log.
    pub fn lines(&self) -> Vec<String> {
        match self.sink.as_ref() {
            Sink::Memory(lines) => lines.lock().map(|l| l.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.record(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.record(LogLevel::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.record(LogLevel::Error, message.as_ref());
    }

    pub fn record(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => tracing::info!(target: "imgpromote::run_log", "{}", message),
            LogLevel::Warn => tracing::warn!(target: "imgpromote::run_log", "{}", message),
            LogLevel::Error => tracing::error!(target: "imgpromote::run_log", "{}", message),
        }

        let line = format!(
            "{} {} {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            message
        );

        match self.sink.as_ref() {
            Sink::Discard => {}
            Sink::Memory(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line);
                }
            }
            Sink::File { path, file } => {
                // A failed log write must not fail the promotion it describes.
                let written = file
                    .lock()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
                    .and_then(|mut f| writeln!(f, "{}", line).and_then(|_| f.flush()));
                if let Err(e) = written {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to write run log");
                }
            }
        }
    }
}
