use crate::{
    lookup::{LookupTables, resolve_identifiers},
    window::{RunDates, plan_window, sub_windows},
};
use chrono::{DateTime, Utc};
use engine_config::sources::{IdentifierLookup, SourceKind, WindowRule};
use engine_core::{
    connectors::{
        destination::Warehouse,
        source::{Connector, FetchParams},
    },
    error::FetchError,
};
use engine_processing::{
    consumer::writer::UpsertWriter,
    transform::{TransformContext, Transformer, normalize_page},
};
use futures::StreamExt;
use model::{
    core::window::FetchWindow,
    execution::{
        errors::ModelError,
        report::{ErrorKind, ErrorRecord, RunReport},
    },
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Instant};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Planning,
    Running,
    Reporting,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Planning => "planning",
            RunPhase::Running => "running",
            RunPhase::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Fetching,
    Transforming,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceState::Fetching => "fetching",
            SourceState::Transforming => "transforming",
            SourceState::Persisting => "persisting",
            SourceState::Done => "done",
            SourceState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One configured source: where its pages come from and how they become rows.
pub struct SourcePlan {
    pub kind: SourceKind,
    pub connector: Box<dyn Connector>,
    pub transformer: Box<dyn Transformer>,
    pub critical: bool,
    pub window_rule: WindowRule,
    pub overlap_days: u32,
    pub lookup: Option<IdentifierLookup>,
}

impl SourcePlan {
    pub fn new(
        kind: SourceKind,
        connector: Box<dyn Connector>,
        transformer: Box<dyn Transformer>,
    ) -> Self {
        Self {
            kind,
            connector,
            transformer,
            critical: false,
            window_rule: kind.window_rule(),
            overlap_days: 0,
            lookup: kind.lookup(),
        }
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn overlap_days(mut self, days: u32) -> Self {
        self.overlap_days = days;
        self
    }

    pub fn lookup(mut self, lookup: Option<IdentifierLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }
}

/// Aggregated outcome of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<RunReport>,
    /// Set when any critical source failed.
    pub failed: bool,
}

impl RunSummary {
    pub fn report(&self, source_name: &str) -> Option<&RunReport> {
        self.reports.iter().find(|r| r.source_name == source_name)
    }

    pub fn failed_sources(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| r.source_name.as_str())
            .collect()
    }
}

/// Runs sources one at a time in the given order.
///
/// A failing source is recorded in its report and the run moves on. Critical
/// failures flag the summary but never stop later sources.
pub struct Orchestrator {
    warehouse: Arc<dyn Warehouse>,
    writer: UpsertWriter,
    lookups: LookupTables,
    lookback_days: u32,
}

impl Orchestrator {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        writer: UpsertWriter,
        lookups: LookupTables,
        lookback_days: u32,
    ) -> Self {
        Self {
            warehouse,
            writer,
            lookups,
            lookback_days,
        }
    }

    pub async fn run(&self, sources: &[SourcePlan], dates: RunDates) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        phase(run_id, RunPhase::Planning);

        let planned: Vec<(&SourcePlan, Result<FetchWindow, ModelError>)> = sources
            .iter()
            .map(|source| {
                let window = plan_window(
                    dates,
                    source.window_rule,
                    self.lookback_days,
                    source.overlap_days,
                );
                match &window {
                    Ok(window) => {
                        info!(source = source.name(), %window, critical = source.critical, "Source planned")
                    }
                    Err(err) => error!(source = source.name(), %err, "Source window could not be planned"),
                }
                (source, window)
            })
            .collect();

        phase(run_id, RunPhase::Running);
        let mut reports = Vec::with_capacity(planned.len());
        for (index, (source, window)) in planned.into_iter().enumerate() {
            info!(
                source = source.name(),
                "Processing source {}/{}",
                index + 1,
                sources.len()
            );
            let report = match window {
                Ok(window) => self.run_source(source, window).await,
                Err(err) => unplanned(source, dates, &err),
            };
            reports.push(report);
        }

        phase(run_id, RunPhase::Reporting);
        let failed = reports.iter().any(|r| r.critical && r.is_failed());
        for report in &reports {
            log_report(report);
        }
        if failed {
            error!(%run_id, "Run failed: a critical source did not complete");
        }

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            reports,
            failed,
        };
        phase(run_id, RunPhase::Idle);
        summary
    }

    /// Fetches, normalizes and writes one source over `window`.
    pub async fn run_source(&self, source: &SourcePlan, window: FetchWindow) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::new(source.name(), window, source.critical);
        let mut tracker = StateTracker::new(source.name());

        'windows: for sub_window in sub_windows(window, source.connector.max_window_days()) {
            tracker.enter(SourceState::Fetching);

            let params = match source.lookup {
                Some(lookup) => {
                    match resolve_identifiers(self.warehouse.as_ref(), &self.lookups, lookup, sub_window)
                        .await
                    {
                        Ok(ids) if ids.is_empty() => {
                            info!(source = source.name(), window = %sub_window, "No identifiers to fetch");
                            continue;
                        }
                        Ok(ids) => FetchParams::with_identifiers(ids),
                        Err(err) => {
                            report.fail(ErrorRecord::new(
                                ErrorKind::Lookup,
                                format!("window {sub_window}"),
                                err.to_string(),
                            ));
                            break 'windows;
                        }
                    }
                }
                None => FetchParams::default(),
            };

            let ctx = TransformContext::new(sub_window);
            let mut pages = source.connector.fetch(sub_window, &params);
            let mut page_number = 0;

            while let Some(item) = pages.next().await {
                page_number += 1;
                let page = match item {
                    Ok(page) => page,
                    Err(err) => {
                        record_fetch_error(&mut report, &err, sub_window, page_number);
                        tracker.enter(SourceState::Fetching);
                        continue;
                    }
                };
                report.pages_fetched += 1;

                tracker.enter(SourceState::Transforming);
                let outcome = normalize_page(source.transformer.as_ref(), &page, &ctx);
                report.rows_skipped += outcome.skipped;

                tracker.enter(SourceState::Persisting);
                let table = source.transformer.table();
                let written = self
                    .writer
                    .write(table, outcome.rows, source.transformer.key_columns())
                    .await;
                report.rows_written += written.written_count;
                for failure in written.errors {
                    report.record(ErrorRecord::new(
                        ErrorKind::Write,
                        format!("page {page_number} batch {}", failure.batch),
                        format!("{} rows not written: {}", failure.rows, failure.error),
                    ));
                }

                tracker.enter(SourceState::Fetching);
            }
        }

        tracker.enter(if report.is_failed() {
            SourceState::Failed
        } else {
            SourceState::Done
        });
        report.duration = start.elapsed();
        report
    }
}

/// Decode errors spoil one page and are only counted. Anything else fails the
/// source, though the stream is still drained so sibling chunks complete.
fn record_fetch_error(report: &mut RunReport, err: &FetchError, window: FetchWindow, page: usize) {
    let scope = format!("window {window} page {page}");
    let record = ErrorRecord::new(err.kind(), scope, err.to_string());
    if err.is_page_local() {
        report.record(record);
    } else {
        report.fail(record);
    }
}

struct StateTracker<'a> {
    source: &'a str,
    state: Option<SourceState>,
}

impl<'a> StateTracker<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            state: None,
        }
    }

    fn enter(&mut self, next: SourceState) {
        if self.state == Some(next) {
            return;
        }
        info!(source = self.source, state = %next, "Source state changed");
        self.state = Some(next);
    }
}

fn phase(run_id: Uuid, phase: RunPhase) {
    info!(%run_id, %phase, "Run phase changed");
}

/// Report for a source whose window could not be computed; nothing is fetched.
fn unplanned(source: &SourcePlan, dates: RunDates, err: &ModelError) -> RunReport {
    let mut report = RunReport::new(
        source.name(),
        FetchWindow::single_day(dates.anchor()),
        source.critical,
    );
    report.fail(ErrorRecord::new(ErrorKind::Configuration, "window", err.to_string()));
    report
}

fn log_report(report: &RunReport) {
    if report.is_failed() {
        error!(
            source = %report.source_name,
            window = %report.window,
            pages = report.pages_fetched,
            rows_written = report.rows_written,
            rows_skipped = report.rows_skipped,
            errors = report.errors.len(),
            critical = report.critical,
            duration_ms = report.duration.as_millis() as u64,
            "Source failed"
        );
    } else {
        info!(
            source = %report.source_name,
            window = %report.window,
            pages = report.pages_fetched,
            rows_written = report.rows_written,
            rows_skipped = report.rows_skipped,
            errors = report.errors.len(),
            duration_ms = report.duration.as_millis() as u64,
            "Source done"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{
        connectors::memory::MemoryWarehouse, paginate::PageStream, retry::RetryPolicy,
    };
    use futures::stream;
    use model::{
        execution::report::SourceStatus, pagination::page::RawPage, records::row::RowData,
    };
    use serde_json::{Value as Json, json};
    use std::sync::Mutex;

    struct ScriptedConnector {
        pages: Vec<Result<Vec<Json>, FetchError>>,
        max_days: Option<u32>,
        windows: Mutex<Vec<FetchWindow>>,
    }

    impl ScriptedConnector {
        fn new(pages: Vec<Result<Vec<Json>, FetchError>>) -> Self {
            Self {
                pages,
                max_days: None,
                windows: Mutex::new(Vec::new()),
            }
        }
    }

    impl Connector for ScriptedConnector {
        fn name(&self) -> &str {
            "scripted"
        }

        fn max_window_days(&self) -> Option<u32> {
            self.max_days
        }

        fn fetch<'a>(&'a self, window: FetchWindow, _params: &'a FetchParams) -> PageStream<'a> {
            self.windows.lock().unwrap().push(window);
            let items: Vec<Result<RawPage, FetchError>> = self
                .pages
                .iter()
                .map(|page| match page {
                    Ok(records) => Ok(RawPage::new(window, records.clone())),
                    Err(FetchError::Decode { endpoint, message }) => {
                        Err(FetchError::decode(endpoint, message.clone()))
                    }
                    Err(other) => Err(FetchError::Configuration(other.to_string())),
                })
                .collect();
            stream::iter(items).boxed()
        }
    }

    struct Items;

    impl Transformer for Items {
        fn table(&self) -> &str {
            "items"
        }

        fn key_columns(&self) -> &'static [&'static str] {
            &["id"]
        }

        fn normalize(&self, record: &Json, _ctx: &TransformContext) -> Option<RowData> {
            let id = record.get("id")?.as_i64()?;
            Some(RowData::new("items", Vec::new()).with("id", id))
        }
    }

    fn orchestrator(warehouse: Arc<MemoryWarehouse>) -> Orchestrator {
        Orchestrator::new(
            warehouse.clone(),
            UpsertWriter::new(warehouse, RetryPolicy::none(), 2),
            LookupTables {
                adverts_table: "adverts".into(),
                search_report_table: "search".into(),
                advert_statuses: vec![9, 11],
            },
            1,
        )
    }

    fn day() -> FetchWindow {
        FetchWindow::single_day(chrono::NaiveDate::from_ymd_opt(2026, 1, 18).unwrap())
    }

    #[tokio::test]
    async fn decode_errors_are_counted_and_the_source_completes() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let connector = ScriptedConnector::new(vec![
            Ok(vec![json!({"id": 1}), json!({"id": 2})]),
            Err(FetchError::decode("items", "truncated body")),
            Ok(vec![json!({"id": 3}), json!({"name": "no id"})]),
        ]);
        let source = SourcePlan::new(SourceKind::SalesFunnel, Box::new(connector), Box::new(Items));

        let report = orchestrator(warehouse.clone()).run_source(&source, day()).await;

        assert_eq!(report.status, SourceStatus::Done);
        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.rows_written, 3);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(report.errors_of(ErrorKind::Decode), 1);
        assert_eq!(warehouse.row_count("items").await, 3);
    }

    #[tokio::test]
    async fn fatal_errors_fail_the_source_but_keep_written_pages() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let connector = ScriptedConnector::new(vec![
            Ok(vec![json!({"id": 1})]),
            Err(FetchError::Configuration("token rejected".into())),
        ]);
        let source = SourcePlan::new(SourceKind::SalesFunnel, Box::new(connector), Box::new(Items));

        let report = orchestrator(warehouse.clone()).run_source(&source, day()).await;

        assert!(report.is_failed());
        assert_eq!(report.errors_of(ErrorKind::Configuration), 1);
        assert_eq!(warehouse.row_count("items").await, 1);
    }

    #[tokio::test]
    async fn windows_are_split_by_the_connector_limit() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let mut connector = ScriptedConnector::new(vec![Ok(vec![json!({"id": 1})])]);
        connector.max_days = Some(1);
        let connector = Arc::new(connector);

        struct Shared(Arc<ScriptedConnector>);
        impl Connector for Shared {
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

        let source = SourcePlan::new(
            SourceKind::SalesFunnel,
            Box::new(Shared(connector.clone())),
            Box::new(Items),
        );
        let window = FetchWindow::trailing(day().end(), 0, 2).unwrap();
        let report = orchestrator(warehouse).run_source(&source, window).await;

        assert_eq!(report.pages_fetched, 3);
        let windows = connector.windows.lock().unwrap().clone();
        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(FetchWindow::is_single_day));
    }

    #[tokio::test]
    async fn chunked_source_without_identifiers_is_done_with_no_pages() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let connector = ScriptedConnector::new(vec![Ok(vec![json!({"id": 1})])]);
        let source = SourcePlan::new(
            SourceKind::AdvertsFullstats,
            Box::new(connector),
            Box::new(Items),
        );

        let report = orchestrator(warehouse).run_source(&source, day()).await;

        assert_eq!(report.status, SourceStatus::Done);
        assert_eq!(report.pages_fetched, 0);
    }

    #[tokio::test]
    async fn critical_failure_flags_the_run_and_later_sources_still_run() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let failing = ScriptedConnector::new(vec![Err(FetchError::Configuration("boom".into()))]);
        let healthy = ScriptedConnector::new(vec![Ok(vec![json!({"id": 1})])]);
        let sources = vec![
            SourcePlan::new(SourceKind::SalesFunnel, Box::new(failing), Box::new(Items))
                .critical(true),
            SourcePlan::new(SourceKind::OzonAnalytics, Box::new(healthy), Box::new(Items)),
        ];

        let summary = orchestrator(warehouse)
            .run(
                &sources,
                RunDates::Daily {
                    today: chrono::NaiveDate::from_ymd_opt(2026, 1, 19).unwrap(),
                },
            )
            .await;

        assert!(summary.failed);
        assert_eq!(summary.failed_sources(), vec!["sales_funnel"]);
        assert_eq!(
            summary.report("ozon_analytics").map(|r| r.rows_written),
            Some(1)
        );
    }

    #[tokio::test]
    async fn unplannable_window_fails_only_that_source() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let overlapping = ScriptedConnector::new(vec![Ok(vec![json!({"id": 1})])]);
        let end_day = ScriptedConnector::new(vec![Ok(vec![json!({"id": 2})])]);
        let sources = vec![
            SourcePlan::new(SourceKind::SalesFunnel, Box::new(overlapping), Box::new(Items))
                .critical(true)
                .overlap_days(200_000_000),
            SourcePlan::new(SourceKind::SearchReport, Box::new(end_day), Box::new(Items)),
        ];

        let summary = orchestrator(warehouse)
            .run(
                &sources,
                RunDates::Daily {
                    today: chrono::NaiveDate::from_ymd_opt(2026, 1, 19).unwrap(),
                },
            )
            .await;

        assert!(summary.failed);
        let funnel = summary.report("sales_funnel").unwrap();
        assert_eq!(funnel.errors_of(ErrorKind::Configuration), 1);
        assert_eq!(funnel.pages_fetched, 0);
        assert_eq!(
            summary.report("search_report").map(|r| r.rows_written),
            Some(1)
        );
    }
}
