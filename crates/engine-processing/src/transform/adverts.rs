use super::{TransformContext, Transformer, coerce, row};
use model::records::row::RowData;
use serde_json::{Value as Json, json};

pub const KEY: &[&str] = &["advert_id", "nmid"];

/// One row per (campaign, product) from the advert listing, for campaigns
/// in the configured statuses.
pub struct AdvertsSettings {
    table: String,
    statuses: Vec<i64>,
}

impl AdvertsSettings {
    pub fn new(table: impl Into<String>, statuses: Vec<i64>) -> Self {
        Self {
            table: table.into(),
            statuses,
        }
    }
}

impl Transformer for AdvertsSettings {
    fn table(&self) -> &str {
        &self.table
    }

    fn key_columns(&self) -> &'static [&'static str] {
        KEY
    }

    fn expand(&self, advert: &Json) -> Vec<Json> {
        let status = coerce::int_key(advert, &["status"]);
        if !status.is_some_and(|s| self.statuses.contains(&s)) {
            return Vec::new();
        }

        coerce::lookup(advert, &["nm_settings"])
            .and_then(Json::as_array)
            .map(|settings| {
                settings
                    .iter()
                    .map(|nm| json!({ "advert": advert, "nm": nm }))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn normalize(&self, record: &Json, _ctx: &TransformContext) -> Option<RowData> {
        let advert = record.get("advert")?;
        let nm = record.get("nm")?;

        Some(
            row(&self.table)
                .with("advert_id", coerce::int_key(advert, &["id"])?)
                .with("nmid", coerce::int_key(nm, &["nm_id"])?)
                .with("advert_name", coerce::text(advert, &["settings", "name"]))
                .with("status", coerce::int_key(advert, &["status"]))
                .with(
                    "payment_type",
                    coerce::text(advert, &["settings", "payment_type"]),
                )
                .with("bid_type", coerce::text(advert, &["bid_type"]))
                .with("subject_id", coerce::int_key(nm, &["subject", "id"]))
                .with("subject_name", coerce::text(nm, &["subject", "name"]))
                .with(
                    "bid_search_kopecks",
                    coerce::count(nm, &["bids_kopecks", "search"]),
                )
                .with(
                    "bid_recommendations_kopecks",
                    coerce::count(nm, &["bids_kopecks", "recommendations"]),
                )
                .with(
                    "place_search",
                    coerce::flag(advert, &["settings", "placements", "search"]),
                )
                .with(
                    "place_recommendations",
                    coerce::flag(advert, &["settings", "placements", "recommendations"]),
                )
                .with("ts_created", coerce::timestamp(advert, &["timestamps", "created"]))
                .with("ts_updated", coerce::timestamp(advert, &["timestamps", "updated"]))
                .with("ts_started", coerce::timestamp(advert, &["timestamps", "started"]))
                .with("ts_deleted", coerce::timestamp(advert, &["timestamps", "deleted"])),
        )
    }
}
