use crate::{
    env::EnvVars,
    error::ConfigError,
    sources::{SourceKind, WindowRule},
};
use engine_core::retry::RetryPolicy;
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    str::FromStr,
    time::Duration,
};

/// Upper bound for any day-count setting.
pub const MAX_DAYS: u32 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarehouseBackend {
    Rest,
    Postgres,
}

impl FromStr for WarehouseBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rest" | "supabase" | "postgrest" => Ok(WarehouseBackend::Rest),
            "postgres" | "postgresql" => Ok(WarehouseBackend::Postgres),
            other => Err(format!("expected 'rest' or 'postgres', got '{other}'")),
        }
    }
}

impl fmt::Display for WarehouseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarehouseBackend::Rest => write!(f, "rest"),
            WarehouseBackend::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Clone)]
pub struct WarehouseSettings {
    pub backend: WarehouseBackend,
    pub rest_url: Option<String>,
    pub rest_key: Option<String>,
    pub database_url: Option<String>,
    pub database_tls: bool,
}

/// Credentials are optional here. Whether one is required depends on the
/// sources that are enabled, which the factory checks.
#[derive(Clone, Default)]
pub struct Credentials {
    pub wb_key: Option<String>,
    pub ozon_client_id: Option<String>,
    pub ozon_api_key: Option<String>,
    pub ozon_perf_client_id: Option<String>,
    pub ozon_perf_client_secret: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("wb_key", &set(&self.wb_key))
            .field("ozon_client_id", &set(&self.ozon_client_id))
            .field("ozon_api_key", &set(&self.ozon_api_key))
            .field("ozon_perf_client_id", &set(&self.ozon_perf_client_id))
            .field("ozon_perf_client_secret", &set(&self.ozon_perf_client_secret))
            .finish()
    }
}

impl fmt::Debug for WarehouseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseSettings")
            .field("backend", &self.backend)
            .field("rest_url", &self.rest_url)
            .field("rest_key", &self.rest_key.as_ref().map(|_| "<set>"))
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("database_tls", &self.database_tls)
            .finish()
    }
}

/// Requests per minute per endpoint family. Zero disables pacing.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub wb_report: u32,
    pub fullstats: u32,
    pub normquery: u32,
    pub wb_common: u32,
    pub ozon_analytics: u32,
    pub ozon_performance: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkSizes {
    pub fullstats: usize,
    pub search_texts: usize,
    pub normquery: usize,
    pub ozon_campaigns: usize,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub warehouse: WarehouseSettings,
    pub credentials: Credentials,
    pub enabled: BTreeSet<SourceKind>,
    pub critical: BTreeSet<SourceKind>,
    pub tables: HashMap<SourceKind, String>,
    pub lookback_days: u32,
    pub overlap_days: u32,
    pub spp_overlap_days: u32,
    pub batch_size: usize,
    pub max_pages: usize,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
    pub rate_limits: RateLimits,
    pub chunk_sizes: ChunkSizes,
    pub report_poll_interval: Duration,
    pub report_max_wait: Duration,
    pub adverts_statuses: Vec<i64>,
    pub fullstats_statuses: Vec<i64>,
    pub log_level: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(&EnvVars::from_process())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load(&EnvVars::from_map(vars))
    }

    fn load(env: &EnvVars) -> Result<Self, ConfigError> {
        let warehouse = WarehouseSettings {
            backend: env.parse_or("WAREHOUSE_BACKEND", WarehouseBackend::Rest)?,
            rest_url: rest_url(env)?,
            rest_key: env
                .get_owned("SUPABASE_SERVICE_ROLE_KEY")
                .or_else(|| env.get_owned("SUPABASE_ANON_KEY")),
            database_url: env.get_owned("DATABASE_URL"),
            database_tls: env.flag_or("DATABASE_TLS", false)?,
        };

        let credentials = Credentials {
            wb_key: env.get_owned("WB_KEY"),
            ozon_client_id: env.get_owned("OZON_CLIENT_ID"),
            ozon_api_key: env.get_owned("OZON_API_KEY"),
            ozon_perf_client_id: env.get_owned("OZON_PERF_CLIENT_ID"),
            ozon_perf_client_secret: env.get_owned("OZON_PERF_CLIENT_SECRET"),
        };

        let mut enabled = BTreeSet::new();
        let mut tables = HashMap::new();
        for kind in SourceKind::ALL {
            if env.flag_or(&kind.flag_var(), kind.enabled_by_default())? {
                enabled.insert(kind);
            }
            if let Some(table) = env.get_owned(&kind.table_var()) {
                tables.insert(kind, table);
            }
        }
        let critical = env
            .list_or::<SourceKind>("CRITICAL_SOURCES", &[])?
            .into_iter()
            .collect();

        let retry = RetryPolicy::new(
            env.parse_or("RETRY_MAX_ATTEMPTS", 3usize)?,
            Duration::from_millis(env.parse_or("RETRY_BASE_DELAY_MS", 2000u64)?),
            Duration::from_millis(env.parse_or("RETRY_MAX_DELAY_MS", 60_000u64)?),
        );

        let rate_limits = RateLimits {
            wb_report: env.parse_or("WB_REPORT_RPM", 3)?,
            fullstats: env.parse_or("FULLSTATS_RPM", 4)?,
            normquery: env.parse_or("NORMQUERY_RPM", 240)?,
            wb_common: env.parse_or("WB_COMMON_RPM", 60)?,
            ozon_analytics: env.parse_or("OZON_ANALYTICS_RPM", 60)?,
            ozon_performance: env.parse_or("OZON_PERFORMANCE_RPM", 30)?,
        };

        let chunk_sizes = ChunkSizes {
            fullstats: positive(env, "FULLSTATS_CHUNK_SIZE", 50)?,
            search_texts: positive(env, "SEARCH_TEXTS_CHUNK_SIZE", 50)?,
            normquery: positive(env, "NORMQUERY_CHUNK_SIZE", 100)?,
            ozon_campaigns: positive(env, "OZON_CAMPAIGN_CHUNK_SIZE", 10)?,
        };

        Ok(Settings {
            warehouse,
            credentials,
            enabled,
            critical,
            tables,
            lookback_days: days(env, "LOOKBACK_DAYS", 1, 0)?,
            overlap_days: days(env, "OVERLAP_DAYS", 2, 0)?,
            spp_overlap_days: days(env, "SPP_OVERLAP_DAYS", 1, 1)?,
            batch_size: positive(env, "BATCH_SIZE", 500)?,
            max_pages: positive(env, "MAX_PAGES", 200)?,
            retry,
            http_timeout: Duration::from_secs(positive(env, "HTTP_TIMEOUT_SECS", 60)? as u64),
            rate_limits,
            chunk_sizes,
            report_poll_interval: Duration::from_secs(env.parse_or("REPORT_POLL_INTERVAL_SECS", 10)?),
            report_max_wait: Duration::from_secs(env.parse_or("REPORT_MAX_WAIT_SECS", 300)?),
            adverts_statuses: env.list_or("ADVERTS_STATUSES", &[7, 9, 11])?,
            fullstats_statuses: env.list_or("FULLSTATS_STATUSES", &[9, 11])?,
            log_level: env.get_owned("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        self.enabled.contains(&kind)
    }

    pub fn is_critical(&self, kind: SourceKind) -> bool {
        self.critical.contains(&kind)
    }

    pub fn table(&self, kind: SourceKind) -> &str {
        self.tables
            .get(&kind)
            .map(String::as_str)
            .unwrap_or(kind.default_table())
    }

    /// Enabled sources in run order.
    pub fn enabled_sources(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    /// Restricts the run to `only`, regardless of the enable flags.
    pub fn restrict_to(&mut self, only: &[SourceKind]) {
        self.enabled = only.iter().copied().collect();
    }

    /// Days before the window end that a source re-fetches.
    pub fn overlap_days(&self, kind: SourceKind) -> u32 {
        match kind.window_rule() {
            WindowRule::Overlap => self.overlap_days,
            WindowRule::SnapshotOverlap => self.spp_overlap_days.saturating_sub(1),
            WindowRule::EndDay | WindowRule::Reference => 0,
        }
    }
}

fn rest_url(env: &EnvVars) -> Result<Option<String>, ConfigError> {
    let Some(url) = env.get("SUPABASE_URL") else {
        return Ok(None);
    };
    let local = ["http://localhost", "http://127.0.0.1"]
        .iter()
        .any(|prefix| url.starts_with(prefix));
    if !url.starts_with("https://") && !local {
        return Err(ConfigError::invalid(
            "SUPABASE_URL",
            url,
            "must start with https://",
        ));
    }
    Ok(Some(url.trim_end_matches('/').to_string()))
}

fn positive(env: &EnvVars, key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = env.parse_or(key, default)?;
    if value == 0 {
        return Err(ConfigError::invalid(key, "0", "must be greater than zero"));
    }
    Ok(value)
}

fn days(env: &EnvVars, key: &str, default: u32, min: u32) -> Result<u32, ConfigError> {
    let value: u32 = env.parse_or(key, default)?;
    if !(min..=MAX_DAYS).contains(&value) {
        return Err(ConfigError::invalid(
            key,
            &value.to_string(),
            format!("out of range, expected {min}..={MAX_DAYS}"),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_vars(&vars)
    }

    #[test]
    fn defaults_match_the_documented_table() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.warehouse.backend, WarehouseBackend::Rest);
        assert_eq!(
            s.enabled_sources(),
            vec![SourceKind::AdvertsSettings, SourceKind::SalesFunnel]
        );
        assert_eq!(s.lookback_days, 1);
        assert_eq!(s.overlap_days, 2);
        assert_eq!(s.batch_size, 500);
        assert_eq!(s.max_pages, 200);
        assert_eq!(s.retry.max_attempts, 3);
        assert_eq!(s.retry.base_delay, Duration::from_secs(2));
        assert_eq!(s.rate_limits.wb_report, 3);
        assert_eq!(s.chunk_sizes.normquery, 100);
        assert_eq!(s.report_max_wait, Duration::from_secs(300));
        assert_eq!(s.adverts_statuses, vec![7, 9, 11]);
        assert_eq!(s.fullstats_statuses, vec![9, 11]);
        assert!(s.critical.is_empty());
    }

    #[test]
    fn flags_tables_and_critical_sources() {
        let s = settings(&[
            ("RUN_SALES_FUNNEL", "false"),
            ("RUN_OZON_ANALYTICS", "1"),
            ("SPP_TABLE", "spp_custom"),
            ("CRITICAL_SOURCES", "ozon_analytics, adverts_settings"),
        ])
        .unwrap();

        assert_eq!(
            s.enabled_sources(),
            vec![SourceKind::AdvertsSettings, SourceKind::OzonAnalytics]
        );
        assert_eq!(s.table(SourceKind::Spp), "spp_custom");
        assert_eq!(s.table(SourceKind::SalesFunnel), "wb_sales_funnel_products");
        assert!(s.is_critical(SourceKind::OzonAnalytics));
        assert!(!s.is_critical(SourceKind::SalesFunnel));
    }

    #[test]
    fn overlap_per_window_rule() {
        let s = settings(&[("OVERLAP_DAYS", "3"), ("SPP_OVERLAP_DAYS", "2")]).unwrap();
        assert_eq!(s.overlap_days(SourceKind::SalesFunnel), 3);
        assert_eq!(s.overlap_days(SourceKind::Spp), 1);
        assert_eq!(s.overlap_days(SourceKind::SearchReport), 0);
        assert_eq!(s.overlap_days(SourceKind::AdvertsSettings), 0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            settings(&[("WAREHOUSE_BACKEND", "sqlite")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            settings(&[("BATCH_SIZE", "0")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            settings(&[("SUPABASE_URL", "http://db.example.com")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            settings(&[("CRITICAL_SOURCES", "sales_funnel,unknown")]),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn day_counts_are_bounded() {
        for (key, raw) in [
            ("OVERLAP_DAYS", "200000000"),
            ("LOOKBACK_DAYS", "3651"),
            ("SPP_OVERLAP_DAYS", "0"),
            ("SPP_OVERLAP_DAYS", "4294967297"),
            ("OVERLAP_DAYS", "-1"),
        ] {
            match settings(&[(key, raw)]) {
                Err(ConfigError::Invalid { key: rejected, .. }) => assert_eq!(rejected, key),
                other => panic!("{key}={raw} was accepted: {other:?}"),
            }
        }

        let s = settings(&[("LOOKBACK_DAYS", "0"), ("OVERLAP_DAYS", "3650")]).unwrap();
        assert_eq!(s.lookback_days, 0);
        assert_eq!(s.overlap_days, MAX_DAYS);
    }

    #[test]
    fn service_role_key_is_preferred() {
        let s = settings(&[
            ("SUPABASE_URL", "http://localhost:54321/"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
        ])
        .unwrap();
        assert_eq!(s.warehouse.rest_url.as_deref(), Some("http://localhost:54321"));
        assert_eq!(s.warehouse.rest_key.as_deref(), Some("service"));
    }

    #[test]
    fn credentials_are_not_printed() {
        let s = settings(&[("WB_KEY", "secret-token")]).unwrap();
        let printed = format!("{:?}", s.credentials);
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("<set>"));
    }
}
