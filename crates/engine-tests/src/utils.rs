//! Fakes shared by the scenario tests: scripted connectors, a recording
//! warehouse and upstream record builders.

use async_trait::async_trait;
use chrono::NaiveDate;
use engine_core::{
    chunk::{chunk, paginate_chunks},
    connectors::{
        destination::Warehouse,
        memory::MemoryWarehouse,
        source::{Connector, FetchParams},
    },
    error::{FetchError, WarehouseError},
    paginate::PageStream,
    report::{ReportApi, ReportPoller, ReportStatus},
    retry::RetryPolicy,
    rate_limit::RateLimiter,
};
use engine_processing::consumer::writer::UpsertWriter;
use engine_runtime::{lookup::LookupTables, orchestrator::Orchestrator};
use futures::{StreamExt, stream};
use model::{
    core::{identifiers::Identifier, window::FetchWindow},
    pagination::page::RawPage,
    records::{query::SelectQuery, row::RowData},
};
use serde_json::{Value as Json, json};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

pub const ADVERTS_TABLE: &str = "wb_adverts_nm_settings";
pub const SEARCH_REPORT_TABLE: &str = "wb_search_report_products";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Sales funnel product record as the report endpoint returns it.
pub fn funnel_product(nm_id: Option<i64>, opens: i64, carts: i64, orders: i64) -> Json {
    let mut product = json!({ "title": "Термокружка 450 мл", "vendorCode": "TK-450" });
    if let Some(id) = nm_id {
        product["nmId"] = json!(id);
    }
    json!({
        "product": product,
        "statistic": {
            "selected": {
                "openCount": opens,
                "cartCount": carts,
                "orderCount": orders,
                "orderSum": "12 450,50",
            }
        }
    })
}

/// Lets a test keep a handle on a connector the orchestrator owns.
pub struct Shared<C>(pub Arc<C>);

impl<C: Connector> Connector for Shared<C> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn max_window_days(&self) -> Option<u32> {
        self.0.max_window_days()
    }

    fn fetch<'a>(&'a self, window: FetchWindow, params: &'a FetchParams) -> PageStream<'a> {
        self.0.fetch(window, params)
    }
}

/// Serves the same pages for every window it is asked about.
pub struct ScriptedConnector {
    name: String,
    pages: Vec<Vec<Json>>,
    pub windows: Mutex<Vec<FetchWindow>>,
}

impl ScriptedConnector {
    pub fn new(name: &str, pages: Vec<Vec<Json>>) -> Self {
        Self {
            name: name.to_string(),
            pages,
            windows: Mutex::new(Vec::new()),
        }
    }
}

impl Connector for ScriptedConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch<'a>(&'a self, window: FetchWindow, _params: &'a FetchParams) -> PageStream<'a> {
        self.windows.lock().unwrap().push(window);
        let pages: Vec<Result<RawPage, FetchError>> = self
            .pages
            .iter()
            .map(|records| Ok(RawPage::new(window, records.clone())))
            .collect();
        stream::iter(pages).boxed()
    }
}

/// Chunked connector that records the identifiers of every request and
/// answers with one fullstats record per advert.
pub struct RecordingChunkedConnector {
    chunk_size: usize,
    pub requests: Mutex<Vec<Vec<i64>>>,
}

impl RecordingChunkedConnector {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl Connector for RecordingChunkedConnector {
    fn name(&self) -> &str {
        "recording_chunked"
    }

    fn fetch<'a>(&'a self, window: FetchWindow, params: &'a FetchParams) -> PageStream<'a> {
        let chunks = chunk(&params.identifiers, self.chunk_size);
        paginate_chunks(chunks, move |ids: Vec<Identifier>| {
            let ids: Vec<i64> = ids.iter().filter_map(Identifier::first).collect();
            self.requests.lock().unwrap().push(ids.clone());
            let records = ids
                .iter()
                .map(|id| {
                    json!({
                        "advertId": id,
                        "days": [{ "date": window.start().to_string(), "views": 100, "clicks": 4, "sum": 37.5 }]
                    })
                })
                .collect();
            stream::once(async move { Ok::<_, FetchError>(RawPage::new(window, records)) }).boxed()
        })
    }
}

/// Async report API whose reports become ready after a fixed number of
/// status checks. Reports for listed campaigns never become ready.
pub struct SlowReports {
    pub ready_after: usize,
    pub stuck_campaigns: Vec<String>,
    checks: AtomicUsize,
    requested: Mutex<Vec<Vec<String>>>,
}

impl SlowReports {
    pub fn new(ready_after: usize, stuck_campaigns: &[&str]) -> Self {
        Self {
            ready_after,
            stuck_campaigns: stuck_campaigns.iter().map(|c| c.to_string()).collect(),
            checks: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn campaigns(&self, report_id: &str) -> Vec<String> {
        let index: usize = report_id.trim_start_matches("report-").parse().unwrap_or(0);
        self.requested.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ReportApi for SlowReports {
    async fn request_report(&self, ids: &[String], _window: FetchWindow) -> Result<String, FetchError> {
        let mut requested = self.requested.lock().unwrap();
        requested.push(ids.to_vec());
        Ok(format!("report-{}", requested.len() - 1))
    }

    async fn report_status(&self, report_id: &str) -> Result<ReportStatus, FetchError> {
        let checks = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
        let stuck = self
            .campaigns(report_id)
            .iter()
            .any(|c| self.stuck_campaigns.contains(c));
        if stuck || checks < self.ready_after {
            Ok(ReportStatus::Pending("IN_PROGRESS".into()))
        } else {
            Ok(ReportStatus::Ready)
        }
    }

    async fn download_report(&self, report_id: &str) -> Result<Vec<u8>, FetchError> {
        let campaigns = self.campaigns(report_id);
        Ok(campaigns.join(",").into_bytes())
    }
}

/// Connector over `SlowReports`: one report per campaign chunk, one record
/// per campaign in the downloaded payload.
pub struct ReportConnector {
    pub api: SlowReports,
    pub poller: ReportPoller,
    pub campaigns: Vec<String>,
    pub chunk_size: usize,
}

impl Connector for ReportConnector {
    fn name(&self) -> &str {
        "reports"
    }

    fn fetch<'a>(&'a self, window: FetchWindow, _params: &'a FetchParams) -> PageStream<'a> {
        let chunks = chunk(&self.campaigns, self.chunk_size);
        paginate_chunks(chunks, move |ids: Vec<String>| {
            stream::once(async move {
                let payload = self.poller.run(&self.api, &ids, window).await?;
                let text = String::from_utf8_lossy(&payload).to_string();
                let records = text
                    .split(',')
                    .map(|id| json!({ "id": id.parse::<i64>().unwrap_or_default() }))
                    .collect();
                Ok::<_, FetchError>(RawPage::new(window, records))
            })
            .boxed()
        })
    }
}

pub fn poller(poll_interval: Duration, max_wait: Duration) -> ReportPoller {
    ReportPoller {
        poll_interval,
        max_wait,
        retry: RetryPolicy::none(),
        limiter: Arc::new(RateLimiter::unlimited("reports")),
    }
}

/// Memory warehouse that also remembers how many rows each upsert carried.
pub struct RecordingWarehouse {
    pub inner: MemoryWarehouse,
    pub upserted: Mutex<Vec<usize>>,
}

impl RecordingWarehouse {
    pub fn new() -> Self {
        Self {
            inner: MemoryWarehouse::new(),
            upserted: Mutex::new(Vec::new()),
        }
    }

    pub fn rows_upserted(&self) -> usize {
        self.upserted.lock().unwrap().iter().sum()
    }
}

#[async_trait]
impl Warehouse for RecordingWarehouse {
    fn name(&self) -> &str {
        "recording"
    }

    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<RowData>, WarehouseError> {
        self.inner.select(table, query).await
    }

    async fn upsert(
        &self,
        table: &str,
        rows: &[RowData],
        key_columns: &[&str],
    ) -> Result<(), WarehouseError> {
        self.upserted.lock().unwrap().push(rows.len());
        self.inner.upsert(table, rows, key_columns).await
    }
}

pub fn orchestrator(warehouse: Arc<dyn Warehouse>) -> Orchestrator {
    Orchestrator::new(
        warehouse.clone(),
        UpsertWriter::new(warehouse, RetryPolicy::none(), 500),
        LookupTables {
            adverts_table: ADVERTS_TABLE.to_string(),
            search_report_table: SEARCH_REPORT_TABLE.to_string(),
            advert_statuses: vec![9, 11],
        },
        1,
    )
}

/// Active adverts as the adverts source would have stored them.
pub fn advert_rows(ids: impl IntoIterator<Item = i64>) -> Vec<RowData> {
    ids.into_iter()
        .map(|id| {
            RowData::new(ADVERTS_TABLE, Vec::new())
                .with("advert_id", id)
                .with("nmid", id * 10)
                .with("status", 9i64)
        })
        .collect()
}
