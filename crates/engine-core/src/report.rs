//! Request, poll and download cycle of asynchronous upstream reports.

use crate::{
    error::{FetchError, classify_fetch_error},
    rate_limit::RateLimiter,
    retry::RetryPolicy,
};
use async_trait::async_trait;
use model::core::window::FetchWindow;
use std::{sync::Arc, time::Duration};
use tokio::time::{Instant, sleep};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    Pending(String),
    Ready,
    Failed(String),
}

/// Upstream side of an asynchronous report.
#[async_trait]
pub trait ReportApi: Send + Sync {
    async fn request_report(&self, ids: &[String], window: FetchWindow)
    -> Result<String, FetchError>;
    async fn report_status(&self, report_id: &str) -> Result<ReportStatus, FetchError>;
    async fn download_report(&self, report_id: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug)]
pub enum ReportState {
    Requested { report_id: String, since: Instant },
    Ready { report_id: String },
    TimedOut { report_id: String, waited: Duration },
    Failed { report_id: String, state: String },
    Downloaded { report_id: String, payload: Vec<u8> },
}

impl ReportState {
    fn name(&self) -> &'static str {
        match self {
            ReportState::Requested { .. } => "requested",
            ReportState::Ready { .. } => "ready",
            ReportState::TimedOut { .. } => "timed_out",
            ReportState::Failed { .. } => "failed",
            ReportState::Downloaded { .. } => "downloaded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReportState::TimedOut { .. }
                | ReportState::Failed { .. }
                | ReportState::Downloaded { .. }
        )
    }
}

/// Drives a report through `Requested -> Ready | TimedOut -> Downloaded`.
///
/// Status checks happen at a fixed interval until the report is ready or
/// `max_wait` has elapsed since it was requested. Each upstream call waits
/// on the limiter and runs under the retry policy.
#[derive(Debug, Clone)]
pub struct ReportPoller {
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub retry: RetryPolicy,
    pub limiter: Arc<RateLimiter>,
}

impl ReportPoller {
    pub async fn request<A: ReportApi + ?Sized>(
        &self,
        api: &A,
        ids: &[String],
        window: FetchWindow,
    ) -> Result<ReportState, FetchError> {
        let limiter = &self.limiter;
        let report_id = self
            .retry
            .run(
                || async move {
                    limiter.wait().await;
                    api.request_report(ids, window).await
                },
                classify_fetch_error,
            )
            .await?;

        info!(report_id = %report_id, campaigns = ids.len(), %window, "Report requested");
        Ok(ReportState::Requested {
            report_id,
            since: Instant::now(),
        })
    }

    /// Advances the state machine by one transition. Terminal states are returned as is.
    pub async fn step<A: ReportApi + ?Sized>(
        &self,
        api: &A,
        state: ReportState,
    ) -> Result<ReportState, FetchError> {
        let limiter = &self.limiter;
        let next = match state {
            ReportState::Requested { report_id, since } => {
                let id = report_id.as_str();
                let status = self
                    .retry
                    .run(
                        || async move {
                            limiter.wait().await;
                            api.report_status(id).await
                        },
                        classify_fetch_error,
                    )
                    .await?;

                match status {
                    ReportStatus::Ready => ReportState::Ready { report_id },
                    ReportStatus::Failed(state) => ReportState::Failed { report_id, state },
                    ReportStatus::Pending(_) => {
                        let waited = since.elapsed();
                        if waited >= self.max_wait {
                            ReportState::TimedOut { report_id, waited }
                        } else {
                            sleep(self.poll_interval.min(self.max_wait - waited)).await;
                            return Ok(ReportState::Requested { report_id, since });
                        }
                    }
                }
            }
            ReportState::Ready { report_id } => {
                let id = report_id.as_str();
                let payload = self
                    .retry
                    .run(
                        || async move {
                            limiter.wait().await;
                            api.download_report(id).await
                        },
                        classify_fetch_error,
                    )
                    .await?;
                ReportState::Downloaded { report_id, payload }
            }
            terminal => return Ok(terminal),
        };

        info!(state = next.name(), "Report state changed");
        Ok(next)
    }

    /// Requests, waits for and downloads one report.
    pub async fn run<A: ReportApi + ?Sized>(
        &self,
        api: &A,
        ids: &[String],
        window: FetchWindow,
    ) -> Result<Vec<u8>, FetchError> {
        let mut state = self.request(api, ids, window).await?;
        while !state.is_terminal() {
            state = self.step(api, state).await?;
        }

        match state {
            ReportState::Downloaded { payload, .. } => Ok(payload),
            ReportState::TimedOut { report_id, waited } => {
                Err(FetchError::ReportTimeout { report_id, waited })
            }
            ReportState::Failed { report_id, state } => {
                Err(FetchError::ReportFailed { report_id, state })
            }
            other => Err(FetchError::Configuration(format!(
                "report left in non-terminal state {}",
                other.name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    /// Reports ready after `ready_after` status checks, or never.
    struct FakeReports {
        ready_after: Option<usize>,
        failed_state: Option<String>,
        status_calls: Mutex<usize>,
        downloads: Mutex<usize>,
    }

    impl FakeReports {
        fn ready_after(checks: usize) -> Self {
            Self {
                ready_after: Some(checks),
                failed_state: None,
                status_calls: Mutex::new(0),
                downloads: Mutex::new(0),
            }
        }

        fn never_ready() -> Self {
            Self {
                ready_after: None,
                ..Self::ready_after(0)
            }
        }
    }

    #[async_trait]
    impl ReportApi for FakeReports {
        async fn request_report(
            &self,
            ids: &[String],
            _window: FetchWindow,
        ) -> Result<String, FetchError> {
            Ok(format!("report-{}", ids.join("-")))
        }

        async fn report_status(&self, _report_id: &str) -> Result<ReportStatus, FetchError> {
            let mut calls = self.status_calls.lock().unwrap();
            *calls += 1;
            if let Some(state) = &self.failed_state {
                return Ok(ReportStatus::Failed(state.clone()));
            }
            match self.ready_after {
                Some(n) if *calls >= n => Ok(ReportStatus::Ready),
                _ => Ok(ReportStatus::Pending("IN_PROGRESS".into())),
            }
        }

        async fn download_report(&self, _report_id: &str) -> Result<Vec<u8>, FetchError> {
            *self.downloads.lock().unwrap() += 1;
            Ok(b"csv".to_vec())
        }
    }

    fn poller() -> ReportPoller {
        ReportPoller {
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(300),
            retry: RetryPolicy::none(),
            limiter: Arc::new(RateLimiter::unlimited("reports")),
        }
    }

    fn window() -> FetchWindow {
        FetchWindow::single_day(NaiveDate::from_ymd_opt(2026, 1, 18).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn ready_report_is_downloaded() {
        let api = FakeReports::ready_after(3);
        let start = Instant::now();
        let payload = poller()
            .run(&api, &["1".to_string()], window())
            .await
            .unwrap();

        assert_eq!(payload, b"csv");
        assert_eq!(*api.status_calls.lock().unwrap(), 3);
        assert_eq!(*api.downloads.lock().unwrap(), 1);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn transitions_are_explicit() {
        let api = FakeReports::ready_after(1);
        let poller = poller();
        let state = poller.request(&api, &["7".to_string()], window()).await.unwrap();
        assert!(matches!(state, ReportState::Requested { ref report_id, .. } if report_id == "report-7"));

        let state = poller.step(&api, state).await.unwrap();
        assert!(matches!(state, ReportState::Ready { .. }));

        let state = poller.step(&api, state).await.unwrap();
        assert!(matches!(state, ReportState::Downloaded { .. }));
        assert!(state.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn pending_report_times_out_after_max_wait() {
        let api = FakeReports::never_ready();
        let start = Instant::now();
        let err = poller()
            .run(&api, &["1".to_string()], window())
            .await
            .unwrap_err();

        match err {
            FetchError::ReportTimeout { report_id, waited } => {
                assert_eq!(report_id, "report-1");
                assert!(waited >= Duration::from_secs(300));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(start.elapsed(), Duration::from_secs(300));
        assert_eq!(*api.status_calls.lock().unwrap(), 31);
        assert_eq!(*api.downloads.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_failure_state_is_reported() {
        let api = FakeReports {
            failed_state: Some("ERROR".into()),
            ..FakeReports::ready_after(1)
        };
        let err = poller()
            .run(&api, &["1".to_string()], window())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ReportFailed { ref state, .. } if state == "ERROR"));
    }
}
