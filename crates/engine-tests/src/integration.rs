#[cfg(test)]
mod tests {
    use crate::utils::{
        ADVERTS_TABLE, RecordingChunkedConnector, RecordingWarehouse, ReportConnector,
        ScriptedConnector, Shared, SlowReports, advert_rows, date, funnel_product, orchestrator, poller,
    };
    use engine_config::sources::SourceKind;
    use engine_core::{
        connectors::{
            memory::MemoryWarehouse,
            source::{Connector, FetchParams},
        },
        error::FetchError,
        paginate::{PageFetcher, PageStream, Pacing, paginate},
        rate_limit::RateLimiter,
        retry::RetryPolicy,
    };
    use engine_processing::transform::{
        TransformContext, Transformer, fullstats::AdvertsFullstats, sales_funnel::SalesFunnel,
    };
    use engine_runtime::{orchestrator::SourcePlan, window::RunDates};
    use futures::TryStreamExt;
    use model::{
        core::{value::Value, window::FetchWindow},
        execution::report::{ErrorKind, SourceStatus},
        pagination::{cursor::Cursor, page::RawPage},
        records::row::RowData,
    };
    use rust_decimal::Decimal;
    use serde_json::Value as Json;
    use std::{sync::Arc, time::Duration};
    use tokio::time::Instant;
    use tracing_test::traced_test;

    const FUNNEL_TABLE: &str = "wb_sales_funnel_products";

    struct Campaigns;

    impl Transformer for Campaigns {
        fn table(&self) -> &str {
            "ozon_campaign_product_stats"
        }

        fn key_columns(&self) -> &'static [&'static str] {
            &["campaign_id"]
        }

        fn normalize(&self, record: &Json, _ctx: &TransformContext) -> Option<RowData> {
            let id = record.get("id")?.as_i64()?;
            Some(RowData::new(self.table(), Vec::new()).with("campaign_id", id))
        }
    }

    fn funnel_source(pages: Vec<Vec<Json>>) -> SourcePlan {
        SourcePlan::new(
            SourceKind::SalesFunnel,
            Box::new(ScriptedConnector::new("sales_funnel", pages)),
            Box::new(SalesFunnel::new(FUNNEL_TABLE)),
        )
    }

    // Scenario: two pages of three records over [2026-01-01, 2026-01-02];
    // the second page holds one record without its product id.
    // Expected: exactly five rows reach the warehouse and one is skipped.
    #[traced_test]
    #[tokio::test]
    async fn skipped_record_is_counted_and_not_written() {
        let warehouse = Arc::new(RecordingWarehouse::new());
        let source = funnel_source(vec![
            vec![
                funnel_product(Some(1), 100, 20, 5),
                funnel_product(Some(2), 80, 8, 2),
                funnel_product(Some(3), 0, 0, 0),
            ],
            vec![
                funnel_product(Some(4), 10, 5, 1),
                funnel_product(None, 10, 5, 1),
                funnel_product(Some(5), 50, 10, 3),
            ],
        ]);
        let window = FetchWindow::new(date(2026, 1, 1), date(2026, 1, 2)).unwrap();

        let report = orchestrator(warehouse.clone())
            .run_source(&source, window)
            .await;

        assert_eq!(report.status, SourceStatus::Done);
        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.rows_written, 5);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(warehouse.rows_upserted(), 5);
        assert_eq!(warehouse.inner.row_count(FUNNEL_TABLE).await, 5);

        let rows = warehouse.inner.rows(FUNNEL_TABLE).await;
        let first = rows.iter().find(|r| r.get_value("nmid") == Value::Int(1)).unwrap();
        assert_eq!(first.get_value("periodstart"), Value::Date(date(2026, 1, 1)));
        assert_eq!(first.get_value("periodend"), Value::Date(date(2026, 1, 2)));
        assert_eq!(first.get_value("reportdate"), Value::Null);
        assert_eq!(first.get_value("cart_conversion"), Value::Decimal(Decimal::new(2000, 2)));
        assert_eq!(first.get_value("ordersum"), Value::Decimal(Decimal::new(1245050, 2)));

        let empty = rows.iter().find(|r| r.get_value("nmid") == Value::Int(3)).unwrap();
        assert_eq!(empty.get_value("cart_conversion"), Value::Decimal(Decimal::ZERO));

        assert!(logs_contain("Batch written"));
        assert!(logs_contain("Source state changed"));
    }

    // Scenario: the same source runs twice over the same window.
    // Expected: the second run updates rows in place, no duplicates.
    #[traced_test]
    #[tokio::test]
    async fn rerun_over_the_same_window_is_idempotent() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let orchestrator = orchestrator(warehouse.clone());
        let window = FetchWindow::single_day(date(2026, 1, 18));

        let first = funnel_source(vec![vec![
            funnel_product(Some(1), 100, 20, 5),
            funnel_product(Some(2), 80, 8, 2),
        ]]);
        orchestrator.run_source(&first, window).await;

        let second = funnel_source(vec![vec![
            funnel_product(Some(1), 120, 30, 6),
            funnel_product(Some(2), 80, 8, 2),
        ]]);
        let report = orchestrator.run_source(&second, window).await;

        assert_eq!(report.rows_written, 2);
        let rows = warehouse.rows(FUNNEL_TABLE).await;
        assert_eq!(rows.len(), 2);
        let updated = rows.iter().find(|r| r.get_value("nmid") == Value::Int(1)).unwrap();
        assert_eq!(updated.get_value("opencount"), Value::Int(120));
        assert_eq!(updated.get_value("reportdate"), Value::Date(date(2026, 1, 18)));
    }

    // Scenario: 103 active adverts, chunk size 50.
    // Expected: three requests of 50, 50 and 3 ids in ascending order, and
    // one fullstats row per advert.
    #[traced_test]
    #[tokio::test]
    async fn identifiers_are_resolved_and_chunked_in_order() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        warehouse.insert(ADVERTS_TABLE, advert_rows((1..=103).rev())).await;
        let connector = Arc::new(RecordingChunkedConnector::new(50));


        let source = SourcePlan::new(
            SourceKind::AdvertsFullstats,
            Box::new(Shared(connector.clone())),
            Box::new(AdvertsFullstats::new("wb_adv_fullstats_daily")),
        );
        let report = orchestrator(warehouse.clone())
            .run_source(&source, FetchWindow::single_day(date(2026, 1, 18)))
            .await;

        let requests = connector.requests.lock().unwrap().clone();
        let sizes: Vec<usize> = requests.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![50, 50, 3]);
        let flattened: Vec<i64> = requests.concat();
        assert_eq!(flattened, (1..=103).collect::<Vec<_>>());

        assert_eq!(report.pages_fetched, 3);
        assert_eq!(report.rows_written, 103);
        assert_eq!(warehouse.row_count("wb_adv_fullstats_daily").await, 103);
        assert!(logs_contain("Fetching chunk"));
    }

    // Scenario: overlap 2 days, lookback 1 day, run date 2026-01-19.
    // Expected: the source fetches [2026-01-16, 2026-01-18].
    #[traced_test]
    #[tokio::test]
    async fn daily_run_window_applies_lookback_and_overlap() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let connector = Arc::new(ScriptedConnector::new("sales_funnel", vec![vec![]]));


        let sources = vec![
            SourcePlan::new(
                SourceKind::SalesFunnel,
                Box::new(Shared(connector.clone())),
                Box::new(SalesFunnel::new(FUNNEL_TABLE)),
            )
            .overlap_days(2),
        ];

        let summary = orchestrator(warehouse)
            .run(&sources, RunDates::Daily { today: date(2026, 1, 19) })
            .await;

        let expected = FetchWindow::new(date(2026, 1, 16), date(2026, 1, 18)).unwrap();
        assert_eq!(summary.reports[0].window, expected);
        assert_eq!(connector.windows.lock().unwrap().as_slice(), &[expected]);
        assert!(!summary.failed);
        assert!(logs_contain("Run phase changed"));
    }

    // Scenario: the first source's report for campaign 3 never becomes ready,
    // the second source is healthy and marked critical.
    // Expected: the first source fails with a report timeout after writing its
    // other chunks, the second completes, and the run is not flagged failed.
    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn report_timeout_fails_only_its_source() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let reports = ReportConnector {
            api: SlowReports::new(2, &["3"]),
            poller: poller(Duration::from_secs(10), Duration::from_secs(60)),
            campaigns: ["1", "2", "3", "4"].map(String::from).to_vec(),
            chunk_size: 2,
        };
        let healthy = ScriptedConnector::new("sales_funnel", vec![vec![funnel_product(Some(7), 1, 1, 1)]]);

        let sources = vec![
            SourcePlan::new(SourceKind::OzonPerformance, Box::new(reports), Box::new(Campaigns)),
            SourcePlan::new(
                SourceKind::SalesFunnel,
                Box::new(healthy),
                Box::new(SalesFunnel::new(FUNNEL_TABLE)),
            )
            .critical(true),
        ];

        let summary = orchestrator(warehouse.clone())
            .run(&sources, RunDates::Daily { today: date(2026, 1, 19) })
            .await;

        let ozon = summary.report("ozon_performance").unwrap();
        assert_eq!(ozon.status, SourceStatus::Failed);
        assert_eq!(ozon.errors_of(ErrorKind::ReportTimeout), 1);
        assert_eq!(ozon.rows_written, 2);
        assert_eq!(warehouse.row_count("ozon_campaign_product_stats").await, 2);

        let funnel = summary.report("sales_funnel").unwrap();
        assert_eq!(funnel.status, SourceStatus::Done);
        assert_eq!(funnel.rows_written, 1);
        assert!(!summary.failed);
        assert!(logs_contain("Source failed"));
    }

    // Scenario: a critical source fails mid-run.
    // Expected: later sources still run and the run is flagged failed.
    #[traced_test]
    #[tokio::test]
    async fn critical_failure_flags_the_run() {
        let warehouse = Arc::new(MemoryWarehouse::new());

        struct Unauthorized;
        impl Connector for Unauthorized {
            fn name(&self) -> &str {
                "unauthorized"
            }
            fn fetch<'a>(
                &'a self,
                _window: FetchWindow,
                _params: &'a FetchParams,
            ) -> PageStream<'a> {
                use futures::StreamExt;
                futures::stream::once(async {
                    Err(FetchError::Http {
                        endpoint: "seller-analytics-api".into(),
                        status: 401,
                        body: "unauthorized".into(),
                    })
                })
                .boxed()
            }
        }

        let sources = vec![
            SourcePlan::new(SourceKind::SalesFunnel, Box::new(Unauthorized), Box::new(SalesFunnel::new(FUNNEL_TABLE)))
                .critical(true),
            SourcePlan::new(
                SourceKind::SearchReport,
                Box::new(ScriptedConnector::new("search_report", vec![vec![]])),
                Box::new(Campaigns),
            ),
        ];

        let summary = orchestrator(warehouse)
            .run(&sources, RunDates::Daily { today: date(2026, 1, 19) })
            .await;

        assert!(summary.failed);
        assert_eq!(summary.failed_sources(), vec!["sales_funnel"]);
        let funnel = summary.report("sales_funnel").unwrap();
        assert_eq!(funnel.errors_of(ErrorKind::Configuration), 1);
        assert_eq!(
            summary.report("search_report").map(|r| r.status),
            Some(SourceStatus::Done)
        );
        assert!(logs_contain("Run failed"));
    }

    // Scenario: a write batch is rejected by the warehouse.
    // Expected: the failure is visible in the report, the source still
    // completes and later pages are written.
    #[traced_test]
    #[tokio::test]
    async fn rejected_batch_is_reported_not_swallowed() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        warehouse.reject_writes(FUNNEL_TABLE).await;
        let source = funnel_source(vec![vec![funnel_product(Some(1), 1, 1, 1)]]);

        let report = orchestrator(warehouse.clone())
            .run_source(&source, FetchWindow::single_day(date(2026, 1, 18)))
            .await;

        assert_eq!(report.status, SourceStatus::Done);
        assert_eq!(report.rows_written, 0);
        assert_eq!(report.errors_of(ErrorKind::Write), 1);
        assert!(logs_contain("Batch write failed"));
    }

    /// Offset listing that serves `total` records, `limit` per page.
    struct Listing {
        total: usize,
        window: FetchWindow,
    }

    #[async_trait::async_trait]
    impl PageFetcher for Listing {
        async fn fetch_page(&self, cursor: &Cursor) -> Result<RawPage, FetchError> {
            let (offset, limit) = match cursor {
                Cursor::Offset { offset, limit } => (*offset, *limit),
                _ => (0, self.total),
            };
            let records = (offset..self.total.min(offset + limit))
                .map(|i| serde_json::json!({ "id": i }))
                .collect::<Vec<_>>();
            let next = cursor.after_page(records.len());
            Ok(RawPage::new(self.window, records).with_next(next))
        }
    }

    // Scenario: five records in pages of two at 60 requests per minute.
    // Expected: three requests, the second and third each wait a full second.
    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn rate_limiter_spaces_page_requests() {
        let window = FetchWindow::single_day(date(2026, 1, 18));
        let pacing = Pacing::new(
            Arc::new(RateLimiter::per_minute("listing", 60)),
            RetryPolicy::none(),
            10,
        );

        let start = Instant::now();
        let pages: Vec<RawPage> = paginate(Listing { total: 5, window }, Cursor::first_offset(2), pacing)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(pages.iter().map(RawPage::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

}
