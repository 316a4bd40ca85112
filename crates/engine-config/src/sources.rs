//! Catalogue of the sources a run can execute, in run order.

use crate::error::ConfigError;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    AdvertsSettings,
    TariffsCommission,
    SalesFunnel,
    AdvertsFullstats,
    Spp,
    SearchReport,
    SearchTexts,
    NormqueryStats,
    OzonAnalytics,
    OzonPerformance,
}

/// How the window of a source relates to the run date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRule {
    /// Reference data; the window only labels the run.
    Reference,
    /// `OVERLAP_DAYS` before the window end.
    Overlap,
    /// `SPP_OVERLAP_DAYS - 1` before the window end.
    SnapshotOverlap,
    /// Window end only.
    EndDay,
}

/// Identifiers a chunked source needs resolved before it can fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierLookup {
    /// Advert ids in the full-stats statuses.
    AdvertIds,
    /// `(advert_id, nmid)` pairs in the full-stats statuses.
    AdvertProducts,
    /// Products seen in the search report for the window start.
    SearchReportProducts,
}

impl SourceKind {
    pub const ALL: [SourceKind; 10] = [
        SourceKind::AdvertsSettings,
        SourceKind::TariffsCommission,
        SourceKind::SalesFunnel,
        SourceKind::AdvertsFullstats,
        SourceKind::Spp,
        SourceKind::SearchReport,
        SourceKind::SearchTexts,
        SourceKind::NormqueryStats,
        SourceKind::OzonAnalytics,
        SourceKind::OzonPerformance,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            SourceKind::AdvertsSettings => "adverts_settings",
            SourceKind::TariffsCommission => "tariffs_commission",
            SourceKind::SalesFunnel => "sales_funnel",
            SourceKind::AdvertsFullstats => "adverts_fullstats",
            SourceKind::Spp => "spp",
            SourceKind::SearchReport => "search_report",
            SourceKind::SearchTexts => "search_texts",
            SourceKind::NormqueryStats => "normquery_stats",
            SourceKind::OzonAnalytics => "ozon_analytics",
            SourceKind::OzonPerformance => "ozon_performance",
        }
    }

    pub const fn default_table(&self) -> &'static str {
        match self {
            SourceKind::AdvertsSettings => "wb_adverts_nm_settings",
            SourceKind::TariffsCommission => "wb_tariffs_commission",
            SourceKind::SalesFunnel => "wb_sales_funnel_products",
            SourceKind::AdvertsFullstats => "wb_adv_fullstats_daily",
            SourceKind::Spp => "wb_spp_daily",
            SourceKind::SearchReport => "wb_search_report_products",
            SourceKind::SearchTexts => "wb_product_search_texts",
            SourceKind::NormqueryStats => "wb_normquery_stats",
            SourceKind::OzonAnalytics => "ozon_analytics_data",
            SourceKind::OzonPerformance => "ozon_campaign_product_stats",
        }
    }

    pub const fn key_columns(&self) -> &'static [&'static str] {
        match self {
            SourceKind::AdvertsSettings => &["advert_id", "nmid"],
            SourceKind::TariffsCommission => &["subject_id"],
            SourceKind::SalesFunnel => &["nmid", "periodstart", "periodend"],
            SourceKind::AdvertsFullstats => &["advert_id", "date"],
            SourceKind::Spp => &["date", "nmid"],
            SourceKind::SearchReport => &["nm_id", "period_start", "period_end"],
            SourceKind::SearchTexts => &["nm_id", "text", "period_start", "period_end"],
            SourceKind::NormqueryStats => {
                &["advert_id", "nm_id", "date_from", "date_to", "norm_query"]
            }
            SourceKind::OzonAnalytics => &["date", "sku"],
            SourceKind::OzonPerformance => &["campaign_id", "date", "sku"],
        }
    }

    pub const fn enabled_by_default(&self) -> bool {
        matches!(self, SourceKind::AdvertsSettings | SourceKind::SalesFunnel)
    }

    pub const fn window_rule(&self) -> WindowRule {
        match self {
            SourceKind::AdvertsSettings | SourceKind::TariffsCommission => WindowRule::Reference,
            SourceKind::SalesFunnel | SourceKind::OzonAnalytics | SourceKind::OzonPerformance => {
                WindowRule::Overlap
            }
            SourceKind::Spp => WindowRule::SnapshotOverlap,
            SourceKind::AdvertsFullstats
            | SourceKind::SearchReport
            | SourceKind::SearchTexts
            | SourceKind::NormqueryStats => WindowRule::EndDay,
        }
    }

    pub const fn lookup(&self) -> Option<IdentifierLookup> {
        match self {
            SourceKind::AdvertsFullstats => Some(IdentifierLookup::AdvertIds),
            SourceKind::NormqueryStats => Some(IdentifierLookup::AdvertProducts),
            SourceKind::SearchTexts => Some(IdentifierLookup::SearchReportProducts),
            _ => None,
        }
    }

    /// `RUN_SALES_FUNNEL` style enable flag.
    pub fn flag_var(&self) -> String {
        format!("RUN_{}", self.name().to_ascii_uppercase())
    }

    /// `SALES_FUNNEL_TABLE` style table override.
    pub fn table_var(&self) -> String {
        format!("{}_TABLE", self.name().to_ascii_uppercase())
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ConfigError::UnknownSource(s.trim().to_string()))
    }
}
