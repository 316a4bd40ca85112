//! Builds connectors, transformers and the warehouse from settings.
//!
//! Everything here runs before the first network call, so a missing
//! credential for an enabled source aborts the run up front.

use crate::{
    error::RunError,
    lookup::LookupTables,
    orchestrator::{Orchestrator, SourcePlan},
};
use connectors::{
    http::client::HttpClient,
    ozon::{
        performance::{DEFAULT_PERFORMANCE_URL, OzonPerformanceClient},
        seller::{DEFAULT_SELLER_URL, OzonSellerClient},
    },
    rest::postgrest::PostgrestAdapter,
    sql::postgres::adapter::PgAdapter,
    wildberries::client::{WbClient, WbEndpoints},
};
use engine_config::{
    settings::{Settings, WarehouseBackend},
    sources::SourceKind,
};
use engine_core::{
    connectors::{
        destination::{PostgresWarehouse, RestWarehouse, Warehouse},
        memory::MemoryWarehouse,
        ozon::{OzonAnalyticsConnector, OzonPerformanceConnector},
        source::Connector,
        wildberries::{WbChunkedConnector, WbChunkedReport, WbReport, WbReportConnector},
    },
    paginate::Pacing,
    rate_limit::RateLimiter,
    report::ReportPoller,
};
use engine_processing::{
    consumer::writer::UpsertWriter,
    transform::{
        Transformer, adverts::AdvertsSettings, commission::TariffsCommission,
        fullstats::AdvertsFullstats, normquery::NormqueryStats, ozon_analytics::OzonAnalytics,
        ozon_performance::OzonPerformance, sales_funnel::SalesFunnel, search_report::SearchReport,
        search_texts::SearchTexts, spp::SppSnapshot,
    },
};
use std::sync::Arc;
use tracing::info;

/// One limiter per endpoint family, shared by every source that calls it.
struct Limiters {
    wb_report: Arc<RateLimiter>,
    fullstats: Arc<RateLimiter>,
    normquery: Arc<RateLimiter>,
    wb_common: Arc<RateLimiter>,
    ozon_analytics: Arc<RateLimiter>,
    ozon_performance: Arc<RateLimiter>,
}

impl Limiters {
    fn new(settings: &Settings) -> Self {
        let rpm = &settings.rate_limits;
        let limiter = |name: &str, per_minute: u32| Arc::new(RateLimiter::per_minute(name, per_minute));
        Self {
            wb_report: limiter("wb_report", rpm.wb_report),
            fullstats: limiter("fullstats", rpm.fullstats),
            normquery: limiter("normquery", rpm.normquery),
            wb_common: limiter("wb_common", rpm.wb_common),
            ozon_analytics: limiter("ozon_analytics", rpm.ozon_analytics),
            ozon_performance: limiter("ozon_performance", rpm.ozon_performance),
        }
    }
}

/// Upstream clients, created on first use.
struct Clients<'a> {
    settings: &'a Settings,
    http: HttpClient,
    wb: Option<Arc<WbClient>>,
    ozon_seller: Option<Arc<OzonSellerClient>>,
    ozon_performance: Option<Arc<OzonPerformanceClient>>,
}

impl<'a> Clients<'a> {
    fn new(settings: &'a Settings) -> Result<Self, RunError> {
        Ok(Self {
            settings,
            http: HttpClient::new(settings.http_timeout)?,
            wb: None,
            ozon_seller: None,
            ozon_performance: None,
        })
    }

    fn wb(&mut self, kind: SourceKind) -> Result<Arc<WbClient>, RunError> {
        if let Some(client) = &self.wb {
            return Ok(client.clone());
        }
        let client = WbClient::new(
            self.http.clone(),
            self.settings.credentials.wb_key.as_deref(),
            WbEndpoints::default(),
        )
        .map_err(|e| RunError::for_source(kind.name(), e))?;
        let client = Arc::new(client);
        self.wb = Some(client.clone());
        Ok(client)
    }

    fn ozon_seller(&mut self, kind: SourceKind) -> Result<Arc<OzonSellerClient>, RunError> {
        if let Some(client) = &self.ozon_seller {
            return Ok(client.clone());
        }
        let creds = &self.settings.credentials;
        let client = OzonSellerClient::new(
            self.http.clone(),
            creds.ozon_client_id.as_deref(),
            creds.ozon_api_key.as_deref(),
            DEFAULT_SELLER_URL,
        )
        .map_err(|e| RunError::for_source(kind.name(), e))?;
        let client = Arc::new(client);
        self.ozon_seller = Some(client.clone());
        Ok(client)
    }

    fn ozon_performance(&mut self, kind: SourceKind) -> Result<Arc<OzonPerformanceClient>, RunError> {
        if let Some(client) = &self.ozon_performance {
            return Ok(client.clone());
        }
        let creds = &self.settings.credentials;
        let client = OzonPerformanceClient::new(
            self.http.clone(),
            creds.ozon_perf_client_id.as_deref(),
            creds.ozon_perf_client_secret.as_deref(),
            DEFAULT_PERFORMANCE_URL,
        )
        .map_err(|e| RunError::for_source(kind.name(), e))?;
        let client = Arc::new(client);
        self.ozon_performance = Some(client.clone());
        Ok(client)
    }
}

/// Builds a plan for every enabled source, in run order.
pub fn build_sources(settings: &Settings) -> Result<Vec<SourcePlan>, RunError> {
    let limiters = Limiters::new(settings);
    let mut clients = Clients::new(settings)?;

    settings
        .enabled_sources()
        .into_iter()
        .map(|kind| -> Result<SourcePlan, RunError> {
            let connector = create_connector(kind, settings, &limiters, &mut clients)?;
            let transformer = create_transformer(kind, settings);
            Ok(SourcePlan::new(kind, connector, transformer)
                .critical(settings.is_critical(kind))
                .overlap_days(settings.overlap_days(kind)))
        })
        .collect()
}

fn create_connector(
    kind: SourceKind,
    settings: &Settings,
    limiters: &Limiters,
    clients: &mut Clients<'_>,
) -> Result<Box<dyn Connector>, RunError> {
    let pacing = |limiter: &Arc<RateLimiter>| {
        Pacing::new(limiter.clone(), settings.retry.clone(), settings.max_pages)
    };
    let chunks = &settings.chunk_sizes;

    let connector: Box<dyn Connector> = match kind {
        SourceKind::AdvertsSettings => Box::new(WbReportConnector::new(
            clients.wb(kind)?,
            WbReport::Adverts,
            pacing(&limiters.wb_common),
        )),
        SourceKind::TariffsCommission => Box::new(WbReportConnector::new(
            clients.wb(kind)?,
            WbReport::Commission,
            pacing(&limiters.wb_common),
        )),
        SourceKind::SalesFunnel => Box::new(WbReportConnector::new(
            clients.wb(kind)?,
            WbReport::SalesFunnel,
            pacing(&limiters.wb_report),
        )),
        SourceKind::AdvertsFullstats => Box::new(WbChunkedConnector::new(
            clients.wb(kind)?,
            WbChunkedReport::Fullstats,
            chunks.fullstats,
            pacing(&limiters.fullstats),
        )),
        SourceKind::Spp => Box::new(WbReportConnector::new(
            clients.wb(kind)?,
            WbReport::Orders,
            pacing(&limiters.wb_common),
        )),
        SourceKind::SearchReport => Box::new(WbReportConnector::new(
            clients.wb(kind)?,
            WbReport::SearchReport,
            pacing(&limiters.wb_report),
        )),
        SourceKind::SearchTexts => Box::new(WbChunkedConnector::new(
            clients.wb(kind)?,
            WbChunkedReport::SearchTexts,
            chunks.search_texts,
            pacing(&limiters.wb_report),
        )),
        SourceKind::NormqueryStats => Box::new(WbChunkedConnector::new(
            clients.wb(kind)?,
            WbChunkedReport::NormqueryStats,
            chunks.normquery,
            pacing(&limiters.normquery),
        )),
        SourceKind::OzonAnalytics => Box::new(OzonAnalyticsConnector::new(
            clients.ozon_seller(kind)?,
            pacing(&limiters.ozon_analytics),
        )),
        SourceKind::OzonPerformance => {
            let poller = ReportPoller {
                poll_interval: settings.report_poll_interval,
                max_wait: settings.report_max_wait,
                retry: settings.retry.clone(),
                limiter: limiters.ozon_performance.clone(),
            };
            Box::new(OzonPerformanceConnector::new(
                clients.ozon_performance(kind)?,
                poller,
                chunks.ozon_campaigns,
            ))
        }
    };
    Ok(connector)
}

pub fn create_transformer(kind: SourceKind, settings: &Settings) -> Box<dyn Transformer> {
    let table = settings.table(kind);
    match kind {
        SourceKind::AdvertsSettings => {
            Box::new(AdvertsSettings::new(table, settings.adverts_statuses.clone()))
        }
        SourceKind::TariffsCommission => Box::new(TariffsCommission::new(table)),
        SourceKind::SalesFunnel => Box::new(SalesFunnel::new(table)),
        SourceKind::AdvertsFullstats => Box::new(AdvertsFullstats::new(table)),
        SourceKind::Spp => Box::new(SppSnapshot::new(table)),
        SourceKind::SearchReport => Box::new(SearchReport::new(table)),
        SourceKind::SearchTexts => Box::new(SearchTexts::new(table)),
        SourceKind::NormqueryStats => Box::new(NormqueryStats::new(table)),
        SourceKind::OzonAnalytics => Box::new(OzonAnalytics::new(table)),
        SourceKind::OzonPerformance => Box::new(OzonPerformance::new(table)),
    }
}

/// The in-memory warehouse backs dry runs; nothing is written upstream.
pub async fn build_warehouse(settings: &Settings, dry_run: bool) -> Result<Arc<dyn Warehouse>, RunError> {
    if dry_run {
        info!("Dry run: rows are kept in memory");
        return Ok(Arc::new(MemoryWarehouse::new()));
    }

    let config = &settings.warehouse;
    match config.backend {
        WarehouseBackend::Rest => {
            let url = config
                .rest_url
                .as_deref()
                .ok_or_else(|| RunError::Warehouse("SUPABASE_URL is not set".to_string()))?;
            let http = HttpClient::new(settings.http_timeout)?;
            let adapter = PostgrestAdapter::new(http, url, config.rest_key.as_deref())?;
            info!(backend = %config.backend, "Warehouse ready");
            Ok(Arc::new(RestWarehouse::new(adapter)))
        }
        WarehouseBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| RunError::Warehouse("DATABASE_URL is not set".to_string()))?;
            let adapter = PgAdapter::connect(&postgres_url(url, config.database_tls)).await?;
            info!(backend = %config.backend, "Warehouse ready");
            Ok(Arc::new(PostgresWarehouse::new(adapter)))
        }
    }
}

/// Forces TLS unless the URL already picks an ssl mode.
fn postgres_url(url: &str, tls: bool) -> String {
    if !tls || url.contains("sslmode=") {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}sslmode=require")
}

pub fn build_orchestrator(settings: &Settings, warehouse: Arc<dyn Warehouse>) -> Orchestrator {
    let writer = UpsertWriter::new(warehouse.clone(), settings.retry.clone(), settings.batch_size);
    let lookups = LookupTables {
        adverts_table: settings.table(SourceKind::AdvertsSettings).to_string(),
        search_report_table: settings.table(SourceKind::SearchReport).to_string(),
        advert_statuses: settings.fullstats_statuses.clone(),
    };
    Orchestrator::new(warehouse, writer, lookups, settings.lookback_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_config::error::ConfigError;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_vars(&vars)
    }

    #[test]
    fn missing_credential_names_the_source() {
        let s = settings(&[("RUN_ADVERTS_SETTINGS", "false"), ("RUN_SALES_FUNNEL", "true")]).unwrap();
        match build_sources(&s) {
            Err(RunError::MissingCredential { source_name, message }) => {
                assert_eq!(source_name, "sales_funnel");
                assert!(message.contains("WB_KEY"));
            }
            Err(other) => panic!("unexpected {other:?}"),
            Ok(_) => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn every_source_builds_with_credentials() {
        let mut pairs = vec![
            ("WB_KEY", "token"),
            ("OZON_CLIENT_ID", "1"),
            ("OZON_API_KEY", "key"),
            ("OZON_PERF_CLIENT_ID", "perf"),
            ("OZON_PERF_CLIENT_SECRET", "secret"),
            ("CRITICAL_SOURCES", "spp"),
            ("SPP_TABLE", "spp_v2"),
        ];
        let flags: Vec<String> = SourceKind::ALL.iter().map(|k| k.flag_var()).collect();
        pairs.extend(flags.iter().map(|f| (f.as_str(), "true")));
        let s = settings(&pairs).unwrap();

        let sources = build_sources(&s).unwrap();
        let names: Vec<&str> = sources.iter().map(SourcePlan::name).collect();
        let expected: Vec<&str> = SourceKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names, expected);

        for source in &sources {
            assert_eq!(source.transformer.key_columns(), source.kind.key_columns());
            assert_eq!(source.critical, source.kind == SourceKind::Spp);
        }
        let spp = sources.iter().find(|s| s.kind == SourceKind::Spp).unwrap();
        assert_eq!(spp.transformer.table(), "spp_v2");
    }

    #[tokio::test]
    async fn rest_backend_requires_a_url() {
        let s = settings(&[]).unwrap();
        assert!(matches!(
            build_warehouse(&s, false).await,
            Err(RunError::Warehouse(_))
        ));
        assert!(build_warehouse(&s, true).await.is_ok());
    }

    #[test]
    fn tls_flag_adds_sslmode() {
        assert_eq!(
            postgres_url("postgres://u@h/db", true),
            "postgres://u@h/db?sslmode=require"
        );
        assert_eq!(
            postgres_url("postgres://u@h/db?application_name=x", true),
            "postgres://u@h/db?application_name=x&sslmode=require"
        );
        assert_eq!(
            postgres_url("postgres://u@h/db?sslmode=disable", true),
            "postgres://u@h/db?sslmode=disable"
        );
        assert_eq!(postgres_url("postgres://u@h/db", false), "postgres://u@h/db");
    }
}
