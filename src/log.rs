use std::cell::RefCell;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::DeployResult;

const MASK: &str = "***";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: String,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [{}] {}", self.timestamp, self.severity, self.message)
    }
}

/// Append-only sink shared by every stage. Records go to stderr, to
/// the per-day file when one is attached, and to an in-memory list the
/// controller reads back. Registered secrets are scrubbed first.
pub struct Logger {
    file: Option<File>,
    path: Option<PathBuf>,
    console: bool,
    secrets: RefCell<Vec<String>>,
    records: RefCell<Vec<LogRecord>>,
}

impl Logger {
    /// Open (or create) today's log file under `dir` in append mode.
    pub fn daily(dir: &Path) -> DeployResult<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(daily_file_name());
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            file: Some(file),
            path: Some(path),
            console: true,
            secrets: RefCell::new(Vec::new()),
            records: RefCell::new(Vec::new()),
        })
    }

    /// A logger that only keeps records in memory.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            file: None,
            path: None,
            console: false,
            secrets: RefCell::new(Vec::new()),
            records: RefCell::new(Vec::new()),
        }
    }

    #[must_use]
    pub const fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Register a value that must never appear in any record.
    pub fn redact(&self, secret: &str) {
        if !secret.is_empty() {
            self.secrets.borrow_mut().push(secret.to_string());
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.append(Severity::Info, message.as_ref());
    }

    pub fn success(&self, message: impl AsRef<str>) {
        self.append(Severity::Success, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.append(Severity::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.append(Severity::Error, message.as_ref());
    }

    pub fn fatal(&self, message: impl AsRef<str>) {
        self.append(Severity::Fatal, message.as_ref());
    }

    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.borrow().clone()
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.records
            .borrow()
            .iter()
            .filter(|r| r.severity == severity)
            .count()
    }

    fn append(&self, severity: Severity, message: &str) {
        let record = LogRecord {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            severity,
            message: self.scrub(message),
        };

        if self.console {
            eprintln!("{record}");
        }

        // A failing log file must not take the deployment down with it.
        if let Some(mut file) = self.file.as_ref() {
            let _ = writeln!(file, "{record}");
        }

        self.records.borrow_mut().push(record);
    }

    fn scrub(&self, message: &str) -> String {
        self.secrets
            .borrow()
            .iter()
            .fold(message.to_string(), |acc, secret| acc.replace(secret.as_str(), MASK))
    }
}

fn daily_file_name() -> String {
    format!("dropship_{}.log", Local::now().format("%Y%m%d"))
}
