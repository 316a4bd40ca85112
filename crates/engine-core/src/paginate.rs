use crate::{
    error::{FetchError, classify_fetch_error},
    rate_limit::RateLimiter,
    retry::RetryPolicy,
};
use async_trait::async_trait;
use futures::{StreamExt, stream, stream::BoxStream};
use model::pagination::{cursor::Cursor, page::RawPage};
use std::sync::Arc;
use tracing::{debug, warn};

/// Lazy, forward-only sequence of pages from one source.
pub type PageStream<'a> = BoxStream<'a, Result<RawPage, FetchError>>;

/// One request against a paginated endpoint.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, cursor: &Cursor) -> Result<RawPage, FetchError>;
}

/// Rate ceiling, retry policy and page cap applied around every fetch.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub limiter: Arc<RateLimiter>,
    pub retry: RetryPolicy,
    pub max_pages: usize,
}

impl Pacing {
    pub fn new(limiter: Arc<RateLimiter>, retry: RetryPolicy, max_pages: usize) -> Self {
        Self {
            limiter,
            retry,
            max_pages: max_pages.max(1),
        }
    }
}

struct Pager<F> {
    fetcher: F,
    cursor: Option<Cursor>,
    fetched: usize,
    pacing: Pacing,
}

/// Drives `fetcher` from `first` until a page comes back empty, carries no
/// continuation, or the page cap is reached.
///
/// Every request waits on the rate limiter and runs under the retry policy.
/// A page that fails to decode is yielded as an error and paging resumes at
/// the following offset when one can be derived. Any other error is yielded
/// and ends the stream; pages already yielded stay valid.
pub fn paginate<'a, F>(fetcher: F, first: Cursor, pacing: Pacing) -> PageStream<'a>
where
    F: PageFetcher + 'a,
{
    let pager = Pager {
        fetcher,
        cursor: Some(first),
        fetched: 0,
        pacing,
    };

    stream::unfold(pager, |mut pager| async move {
        let cursor = pager.cursor.take()?;
        if pager.fetched >= pager.pacing.max_pages {
            warn!(
                max_pages = pager.pacing.max_pages,
                "Page cap reached, stopping pagination"
            );
            return None;
        }

        let fetcher = &pager.fetcher;
        let limiter = &pager.pacing.limiter;
        let current = &cursor;
        let result = pager
            .pacing
            .retry
            .run(
                || async move {
                    limiter.wait().await;
                    fetcher.fetch_page(current).await
                },
                classify_fetch_error,
            )
            .await;
        pager.fetched += 1;

        match result {
            Ok(page) if page.is_empty() => {
                debug!(page = pager.fetched, "Empty page, pagination finished");
                None
            }
            Ok(page) => {
                debug!(
                    page = pager.fetched,
                    records = page.len(),
                    has_next = page.next.is_some(),
                    "Page fetched"
                );
                pager.cursor = page.next.clone();
                Some((Ok(page), pager))
            }
            Err(err) => {
                let err = FetchError::from(err);
                if err.is_page_local() {
                    pager.cursor = cursor.following();
                }
                Some((Err(err), pager))
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::core::window::FetchWindow;
    use std::{sync::Mutex, time::Duration};
    use tokio::time::Instant;

    fn window() -> FetchWindow {
        let d = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        FetchWindow::new(d, d + chrono::Days::new(1)).unwrap()
    }

    fn pacing(rpm: u32, max_pages: usize) -> Pacing {
        Pacing::new(
            Arc::new(RateLimiter::per_minute("test", rpm)),
            RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(100)),
            max_pages,
        )
    }

    /// Serves `total` records in offset pages, optionally failing some calls first.
    struct FakeListing {
        total: usize,
        failures: Mutex<Vec<FetchError>>,
        calls: Mutex<Vec<(Cursor, Instant)>>,
    }

    impl FakeListing {
        fn new(total: usize) -> Self {
            Self {
                total,
                failures: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_with(self, failures: Vec<FetchError>) -> Self {
            *self.failures.lock().unwrap() = failures;
            self
        }

        fn calls(&self) -> Vec<(Cursor, Instant)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<'l> PageFetcher for &'l FakeListing {
        async fn fetch_page(&self, cursor: &Cursor) -> Result<RawPage, FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((cursor.clone(), Instant::now()));
            if let Some(err) = self.failures.lock().unwrap().pop() {
                return Err(err);
            }

            let (offset, limit) = match cursor {
                Cursor::Offset { offset, limit } => (*offset, *limit),
                _ => (0, self.total),
            };
            let records: Vec<_> = (offset..(offset + limit).min(self.total))
                .map(|i| serde_json::json!({ "id": i }))
                .collect();
            let next = cursor.after_page(records.len());
            Ok(RawPage::new(window(), records).with_next(next))
        }
    }

    async fn collect(stream: PageStream<'_>) -> Vec<Result<RawPage, FetchError>> {
        stream.collect().await
    }

    fn ids(pages: &[Result<RawPage, FetchError>]) -> Vec<u64> {
        pages
            .iter()
            .filter_map(|p| p.as_ref().ok())
            .flat_map(|p| p.records.iter().map(|r| r["id"].as_u64().unwrap()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn pages_concatenate_to_the_unpaginated_result() {
        let listing = FakeListing::new(7);
        let pages = collect(paginate(&listing, Cursor::first_offset(3), pacing(0, 100))).await;
        assert_eq!(pages.len(), 3);
        assert_eq!(ids(&pages), (0..7).collect::<Vec<_>>());

        let single = collect(paginate(&listing, Cursor::Start, pacing(0, 100))).await;
        assert_eq!(ids(&single), ids(&pages));
    }

    #[tokio::test(start_paused = true)]
    async fn exact_multiple_ends_on_empty_page() {
        let listing = FakeListing::new(6);
        let pages = collect(paginate(&listing, Cursor::first_offset(3), pacing(0, 100))).await;
        assert_eq!(pages.len(), 2);
        assert_eq!(listing.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn five_pages_at_three_per_minute_wait_eighty_seconds() {
        let listing = FakeListing::new(10);
        let start = Instant::now();
        let pages = collect(paginate(&listing, Cursor::first_offset(2), pacing(3, 5))).await;
        assert_eq!(pages.len(), 5);

        let calls = listing.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0].1, start);
        for pair in calls.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_secs(20));
        }
        assert!(start.elapsed() >= Duration::from_secs(80));
    }

    #[tokio::test(start_paused = true)]
    async fn page_cap_stops_runaway_listing() {
        let listing = FakeListing::new(1_000);
        let pages = collect(paginate(&listing, Cursor::first_offset(1), pacing(0, 4))).await;
        assert_eq!(pages.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_within_a_page() {
        let listing = FakeListing::new(2).failing_with(vec![FetchError::Network {
            endpoint: "t".into(),
            message: "reset".into(),
        }]);
        let pages = collect(paginate(&listing, Cursor::Start, pacing(0, 10))).await;
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_ok());
        assert_eq!(listing.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_end_the_stream_after_partial_pages() {
        let listing = FakeListing::new(4);
        let mut stream = paginate(&listing, Cursor::first_offset(2), pacing(0, 10));

        let first = stream.next().await.unwrap();
        assert!(first.is_ok());

        let http = |status| FetchError::Http {
            endpoint: "t".into(),
            status,
            body: String::new(),
        };
        *listing.failures.lock().unwrap() = vec![http(503), http(503), http(503)];

        let second = stream.next().await.unwrap();
        assert!(matches!(
            second,
            Err(FetchError::TransientFailure { attempts: 3, .. })
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn decode_failure_skips_to_next_offset() {
        let listing =
            FakeListing::new(6).failing_with(vec![FetchError::decode("t", "unexpected shape")]);
        let pages = collect(paginate(&listing, Cursor::first_offset(2), pacing(0, 10))).await;

        assert_eq!(pages.len(), 3);
        assert!(matches!(pages[0], Err(FetchError::Decode { .. })));
        assert_eq!(ids(&pages), vec![2, 3, 4, 5]);
    }
}
