//! Connectors for the primary marketplace's seller APIs.

use crate::{
    chunk::{chunk, paginate_chunks},
    connectors::source::{Connector, FetchParams},
    error::FetchError,
    paginate::{PageFetcher, PageStream, Pacing, paginate},
};
use async_trait::async_trait;
use connectors::wildberries::{client::WbClient, requests::SEARCH_REPORT_PAGE_LIMIT};
use futures::{StreamExt, stream};
use model::{
    core::{identifiers::Identifier, window::FetchWindow},
    pagination::{cursor::Cursor, page::RawPage},
};
use std::sync::Arc;
use tracing::{info, warn};

/// Report endpoints that enumerate everything for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WbReport {
    Adverts,
    Commission,
    SalesFunnel,
    Orders,
    SearchReport,
}

impl WbReport {
    pub fn source_name(&self) -> &'static str {
        match self {
            WbReport::Adverts => "adverts_settings",
            WbReport::Commission => "tariffs_commission",
            WbReport::SalesFunnel => "sales_funnel",
            WbReport::Orders => "spp",
            WbReport::SearchReport => "search_report",
        }
    }

    fn first_cursor(&self) -> Cursor {
        match self {
            WbReport::SearchReport => Cursor::first_offset(SEARCH_REPORT_PAGE_LIMIT),
            _ => Cursor::Start,
        }
    }
}

pub struct WbReportConnector {
    client: Arc<WbClient>,
    report: WbReport,
    pacing: Pacing,
}

impl WbReportConnector {
    pub fn new(client: Arc<WbClient>, report: WbReport, pacing: Pacing) -> Self {
        Self {
            client,
            report,
            pacing,
        }
    }
}

struct ReportRequest<'a> {
    client: &'a WbClient,
    report: WbReport,
    window: FetchWindow,
}

#[async_trait]
impl PageFetcher for ReportRequest<'_> {
    async fn fetch_page(&self, cursor: &Cursor) -> Result<RawPage, FetchError> {
        let (start, end) = (self.window.start(), self.window.end());
        let records = match self.report {
            WbReport::Adverts => self.client.adverts().await?,
            WbReport::Commission => self.client.commission().await?,
            WbReport::SalesFunnel => self.client.sales_funnel(start, end).await?,
            WbReport::Orders => self.client.orders(start).await?,
            WbReport::SearchReport => {
                let (offset, limit) = match cursor {
                    Cursor::Offset { offset, limit } => (*offset, *limit),
                    _ => (0, SEARCH_REPORT_PAGE_LIMIT),
                };
                self.client.search_report(start, end, offset, limit).await?
            }
        };

        let next = cursor.after_page(records.len());
        Ok(RawPage::new(self.window, records).with_next(next))
    }
}

impl Connector for WbReportConnector {
    fn name(&self) -> &str {
        self.report.source_name()
    }

    fn max_window_days(&self) -> Option<u32> {
        match self.report {
            WbReport::SalesFunnel | WbReport::Orders | WbReport::SearchReport => Some(1),
            WbReport::Adverts | WbReport::Commission => None,
        }
    }

    fn fetch<'a>(&'a self, window: FetchWindow, _params: &'a FetchParams) -> PageStream<'a> {
        let request = ReportRequest {
            client: &self.client,
            report: self.report,
            window,
        };
        paginate(request, self.report.first_cursor(), self.pacing.clone())
    }
}

/// Endpoints that take a bounded list of identifiers per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WbChunkedReport {
    Fullstats,
    SearchTexts,
    NormqueryStats,
}

impl WbChunkedReport {
    pub fn source_name(&self) -> &'static str {
        match self {
            WbChunkedReport::Fullstats => "adverts_fullstats",
            WbChunkedReport::SearchTexts => "search_texts",
            WbChunkedReport::NormqueryStats => "normquery_stats",
        }
    }
}

pub struct WbChunkedConnector {
    client: Arc<WbClient>,
    report: WbChunkedReport,
    chunk_size: usize,
    pacing: Pacing,
}

impl WbChunkedConnector {
    pub fn new(
        client: Arc<WbClient>,
        report: WbChunkedReport,
        chunk_size: usize,
        pacing: Pacing,
    ) -> Self {
        Self {
            client,
            report,
            chunk_size: chunk_size.max(1),
            pacing,
        }
    }

    fn usable_ids(&self, identifiers: &[Identifier]) -> Vec<Identifier> {
        if self.report != WbChunkedReport::NormqueryStats {
            return identifiers.to_vec();
        }
        let (pairs, incomplete): (Vec<_>, Vec<_>) =
            identifiers.iter().cloned().partition(|id| id.get(1).is_some());
        if !incomplete.is_empty() {
            warn!(
                source = self.report.source_name(),
                dropped = incomplete.len(),
                "Identifiers without a product id skipped"
            );
        }
        pairs
    }
}

struct ChunkRequest<'a> {
    client: &'a WbClient,
    report: WbChunkedReport,
    ids: Vec<Identifier>,
    window: FetchWindow,
}

#[async_trait]
impl PageFetcher for ChunkRequest<'_> {
    async fn fetch_page(&self, _cursor: &Cursor) -> Result<RawPage, FetchError> {
        let (start, end) = (self.window.start(), self.window.end());
        let firsts: Vec<i64> = self.ids.iter().filter_map(Identifier::first).collect();
        let records = match self.report {
            WbChunkedReport::Fullstats => self.client.fullstats(&firsts, start, end).await?,
            WbChunkedReport::SearchTexts => self.client.search_texts(&firsts, start, end).await?,
            WbChunkedReport::NormqueryStats => {
                let pairs: Vec<(i64, i64)> = self
                    .ids
                    .iter()
                    .filter_map(|id| Some((id.get(0)?, id.get(1)?)))
                    .collect();
                self.client.normquery_stats(&pairs, start, end).await?
            }
        };
        Ok(RawPage::new(self.window, records))
    }
}

impl Connector for WbChunkedConnector {
    fn name(&self) -> &str {
        self.report.source_name()
    }

    fn max_window_days(&self) -> Option<u32> {
        match self.report {
            WbChunkedReport::SearchTexts => Some(1),
            WbChunkedReport::Fullstats | WbChunkedReport::NormqueryStats => None,
        }
    }

    fn fetch<'a>(&'a self, window: FetchWindow, params: &'a FetchParams) -> PageStream<'a> {
        let ids = self.usable_ids(&params.identifiers);
        if ids.is_empty() {
            info!(
                source = self.report.source_name(),
                "No identifiers to fetch"
            );
            return stream::empty().boxed();
        }

        let chunks = chunk(&ids, self.chunk_size);
        info!(
            source = self.report.source_name(),
            identifiers = ids.len(),
            chunks = chunks.len(),
            "Fetching in chunks"
        );

        paginate_chunks(chunks, move |ids| {
            let request = ChunkRequest {
                client: &self.client,
                report: self.report,
                ids,
                window,
            };
            paginate(request, Cursor::Start, self.pacing.clone())
        })
    }
}
