//! Connectors for the secondary marketplace: the paged analytics API and
//! the asynchronous advertising report API.

use crate::{
    chunk::{chunk, paginate_chunks},
    connectors::source::{Connector, FetchParams},
    error::{FetchError, classify_fetch_error},
    paginate::{PageFetcher, PageStream, Pacing, paginate},
    report::{ReportApi, ReportPoller, ReportStatus},
};
use async_trait::async_trait;
use connectors::ozon::{
    performance::OzonPerformanceClient,
    report::{CampaignReport, decode_report},
    seller::{ANALYTICS_PAGE_LIMIT, OzonSellerClient},
};
use futures::{StreamExt, future, stream};
use model::{
    core::window::FetchWindow,
    pagination::{cursor::Cursor, page::RawPage},
};
use std::sync::Arc;
use tracing::info;

pub const PERFORMANCE_MAX_WINDOW_DAYS: u32 = 62;

pub struct OzonAnalyticsConnector {
    client: Arc<OzonSellerClient>,
    pacing: Pacing,
}

impl OzonAnalyticsConnector {
    pub fn new(client: Arc<OzonSellerClient>, pacing: Pacing) -> Self {
        Self { client, pacing }
    }
}

struct AnalyticsRequest<'a> {
    client: &'a OzonSellerClient,
    window: FetchWindow,
}

#[async_trait]
impl PageFetcher for AnalyticsRequest<'_> {
    async fn fetch_page(&self, cursor: &Cursor) -> Result<RawPage, FetchError> {
        let (offset, limit) = match cursor {
            Cursor::Offset { offset, limit } => (*offset, *limit),
            _ => (0, ANALYTICS_PAGE_LIMIT),
        };
        let records = self
            .client
            .analytics(self.window.start(), self.window.end(), offset, limit)
            .await?;
        let next = cursor.after_page(records.len());
        Ok(RawPage::new(self.window, records).with_next(next))
    }
}

impl Connector for OzonAnalyticsConnector {
    fn name(&self) -> &str {
        "ozon_analytics"
    }

    fn fetch<'a>(&'a self, window: FetchWindow, _params: &'a FetchParams) -> PageStream<'a> {
        let request = AnalyticsRequest {
            client: &self.client,
            window,
        };
        paginate(
            request,
            Cursor::first_offset(ANALYTICS_PAGE_LIMIT),
            self.pacing.clone(),
        )
    }
}

/// Report side of the performance API in the shape the poller drives.
pub struct PerformanceReports {
    client: Arc<OzonPerformanceClient>,
}

impl PerformanceReports {
    pub fn new(client: Arc<OzonPerformanceClient>) -> Self {
        Self { client }
    }
}

/// Maps upstream report states onto poller states.
pub fn report_status(state: &str) -> ReportStatus {
    match state {
        "OK" => ReportStatus::Ready,
        "ERROR" | "FAILED" | "CANCELLED" => ReportStatus::Failed(state.to_string()),
        other => ReportStatus::Pending(other.to_string()),
    }
}

#[async_trait]
impl ReportApi for PerformanceReports {
    async fn request_report(
        &self,
        ids: &[String],
        window: FetchWindow,
    ) -> Result<String, FetchError> {
        Ok(self
            .client
            .request_report(ids, window.start(), window.end())
            .await?)
    }

    async fn report_status(&self, report_id: &str) -> Result<ReportStatus, FetchError> {
        let state = self.client.report_state(report_id).await?;
        Ok(report_status(&state))
    }

    async fn download_report(&self, report_id: &str) -> Result<Vec<u8>, FetchError> {
        Ok(self.client.download_report(report_id).await?.to_vec())
    }
}

/// Campaign statistics through request, poll and download cycles, one per
/// chunk of campaigns. A chunk whose report fails or times out is reported
/// as an error and the remaining chunks still run.
pub struct OzonPerformanceConnector {
    api: Arc<dyn ReportApi>,
    campaigns: Arc<OzonPerformanceClient>,
    poller: ReportPoller,
    chunk_size: usize,
}

impl OzonPerformanceConnector {
    pub fn new(client: Arc<OzonPerformanceClient>, poller: ReportPoller, chunk_size: usize) -> Self {
        Self {
            api: Arc::new(PerformanceReports::new(client.clone())),
            campaigns: client,
            poller,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Replaces the report API, keeping the campaign listing client.
    pub fn with_report_api(mut self, api: Arc<dyn ReportApi>) -> Self {
        self.api = api;
        self
    }

    async fn campaign_ids(&self, params: &FetchParams) -> Result<Vec<String>, FetchError> {
        if !params.identifiers.is_empty() {
            return Ok(params.identifiers.iter().map(ToString::to_string).collect());
        }

        let client = &self.campaigns;
        let limiter = &self.poller.limiter;
        let ids = self
            .poller
            .retry
            .run(
                || async move {
                    limiter.wait().await;
                    client.running_campaigns().await.map_err(FetchError::from)
                },
                classify_fetch_error,
            )
            .await?;
        Ok(ids)
    }

    fn report_pages(&self, campaigns: Vec<String>, window: FetchWindow) -> PageStream<'_> {
        let download = async move {
            let payload = self.poller.run(self.api.as_ref(), &campaigns, window).await?;
            decode_report(&payload).map_err(FetchError::from)
        };

        stream::once(download)
            .map(move |result| match result {
                Ok(reports) => stream::iter(
                    reports
                        .into_iter()
                        .map(move |report| Ok::<_, FetchError>(campaign_page(report, window))),
                )
                .boxed(),
                Err(err) => stream::once(future::ready(Err(err))).boxed(),
            })
            .flatten()
            .boxed()
    }
}

fn campaign_page(report: CampaignReport, window: FetchWindow) -> RawPage {
    let page = RawPage::new(window, report.rows);
    match report.campaign_id {
        Some(id) => page.with_label(format!("campaign {id}")),
        None => page,
    }
}

impl Connector for OzonPerformanceConnector {
    fn name(&self) -> &str {
        "ozon_performance"
    }

    fn max_window_days(&self) -> Option<u32> {
        Some(PERFORMANCE_MAX_WINDOW_DAYS)
    }

    fn fetch<'a>(&'a self, window: FetchWindow, params: &'a FetchParams) -> PageStream<'a> {
        stream::once(self.campaign_ids(params))
            .map(move |result| match result {
                Ok(ids) if ids.is_empty() => {
                    info!("No running campaigns");
                    stream::empty().boxed()
                }
                Ok(ids) => {
                    let chunks = chunk(&ids, self.chunk_size);
                    info!(
                        campaigns = ids.len(),
                        chunks = chunks.len(),
                        "Requesting campaign reports"
                    );
                    paginate_chunks(chunks, move |campaigns| {
                        self.report_pages(campaigns, window)
                    })
                }
                Err(err) => stream::once(future::ready(Err(err))).boxed(),
            })
            .flatten()
            .boxed()
    }
}
