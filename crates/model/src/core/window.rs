use crate::execution::errors::ModelError;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive calendar date range handed to a connector for one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl FetchWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ModelError> {
        if start > end {
            return Err(ModelError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// `[today - lookback - overlap, today - lookback]`.
    pub fn trailing(today: NaiveDate, lookback_days: u32, overlap_days: u32) -> Result<Self, ModelError> {
        let days_back = |from: NaiveDate, days: u32| {
            let days = u64::from(days);
            from.checked_sub_days(Days::new(days))
                .ok_or(ModelError::WindowOutOfRange { from, days })
        };
        let end = days_back(today, lookback_days)?;
        let start = days_back(end, overlap_days)?;
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> u32 {
        (self.end - self.start).num_days() as u32 + 1
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Splits into consecutive sub-windows of at most `max_days` each, oldest first.
    pub fn split(&self, max_days: u32) -> Vec<FetchWindow> {
        let max_days = u64::from(max_days.max(1));
        let mut windows = Vec::new();
        let mut start = self.start;

        while start <= self.end {
            let candidate = start + Days::new(max_days - 1);
            let end = candidate.min(self.end);
            windows.push(FetchWindow { start, end });
            start = end + Days::new(1);
        }

        windows
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
