use chrono::NaiveDate;
use engine_config::sources::WindowRule;
use model::{core::window::FetchWindow, execution::errors::ModelError};

/// Which dates a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDates {
    /// Daily run anchored on `today`; each source derives its trailing window.
    Daily { today: NaiveDate },
    /// Explicit window given by the operator.
    Backfill(FetchWindow),
}

impl RunDates {
    /// Last calendar day the run is about.
    pub fn anchor(&self) -> NaiveDate {
        match self {
            RunDates::Daily { today } => *today,
            RunDates::Backfill(window) => window.end(),
        }
    }
}

/// Window a source fetches for this run, before sub-window splitting.
///
/// Reference sources ignore dates; they are reported against the last day
/// of the run.
pub fn plan_window(
    dates: RunDates,
    rule: WindowRule,
    lookback_days: u32,
    overlap_days: u32,
) -> Result<FetchWindow, ModelError> {
    match dates {
        RunDates::Daily { today } => match rule {
            WindowRule::Reference | WindowRule::EndDay => {
                FetchWindow::trailing(today, lookback_days, 0)
            }
            WindowRule::Overlap | WindowRule::SnapshotOverlap => {
                FetchWindow::trailing(today, lookback_days, overlap_days)
            }
        },
        RunDates::Backfill(window) => Ok(match rule {
            WindowRule::Reference => FetchWindow::single_day(window.end()),
            _ => window,
        }),
    }
}

/// Splits `window` into pieces no longer than the connector accepts.
pub fn sub_windows(window: FetchWindow, max_days: Option<u32>) -> Vec<FetchWindow> {
    match max_days {
        Some(max) if window.days() > max => window.split(max),
        _ => vec![window],
    }
}
