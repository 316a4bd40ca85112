use crate::core::window::FetchWindow;
use serde::{Deserialize, Serialize, Serializer};
use std::{fmt, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Transient,
    Rejected,
    Decode,
    ReportTimeout,
    Write,
    Lookup,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transient => "transient",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Decode => "decode",
            ErrorKind::ReportTimeout => "report_timeout",
            ErrorKind::Write => "write",
            ErrorKind::Lookup => "lookup",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// Smallest unit the error was contained to: `page 3`, `chunk 2/4`, `batch 1`.
    pub scope: String,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            scope: scope.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Done,
    Failed,
}

/// Outcome of processing one source during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub source_name: String,
    pub window: FetchWindow,
    pub status: SourceStatus,
    pub critical: bool,
    pub pages_fetched: usize,
    pub rows_written: usize,
    pub rows_skipped: usize,
    pub errors: Vec<ErrorRecord>,
    #[serde(serialize_with = "as_secs", deserialize_with = "from_secs")]
    pub duration: Duration,
}

impl RunReport {
    pub fn new(source_name: &str, window: FetchWindow, critical: bool) -> Self {
        Self {
            source_name: source_name.to_string(),
            window,
            status: SourceStatus::Done,
            critical,
            pages_fetched: 0,
            rows_written: 0,
            rows_skipped: 0,
            errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn record(&mut self, error: ErrorRecord) {
        self.errors.push(error);
    }

    pub fn fail(&mut self, error: ErrorRecord) {
        self.status = SourceStatus::Failed;
        self.errors.push(error);
    }

    pub fn is_failed(&self) -> bool {
        self.status == SourceStatus::Failed
    }

    pub fn errors_of(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

fn from_secs<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Ok(Duration::from_secs_f64(secs.max(0.0)))
}
