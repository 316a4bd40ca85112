use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid fetch window: start {start} is after end {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    #[error("window reaching {days} days back from {from} is out of range")]
    WindowOutOfRange { from: NaiveDate, days: u64 },
}
