use crate::{core::window::FetchWindow, pagination::cursor::Cursor};
use serde::{Deserialize, Serialize};

/// Records returned by one upstream call, still in their source shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPage {
    pub records: Vec<serde_json::Value>,
    pub window: FetchWindow,
    pub next: Option<Cursor>,
    /// Where the page came from inside a source, e.g. `chunk 2/5`.
    pub label: Option<String>,
}

impl RawPage {
    pub fn new(window: FetchWindow, records: Vec<serde_json::Value>) -> Self {
        Self {
            records,
            window,
            next: None,
            label: None,
        }
    }

    pub fn with_next(mut self, next: Option<Cursor>) -> Self {
        self.next = next;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
