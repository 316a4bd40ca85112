use super::{TransformContext, Transformer, coerce, row};
use model::records::row::RowData;
use rust_decimal::Decimal;
use serde_json::{Value as Json, json};

pub const KEY: &[&str] = &["advert_id", "date"];

/// Daily campaign statistics, one row per `days[]` entry of each campaign.
pub struct AdvertsFullstats {
    table: String,
}

impl AdvertsFullstats {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl Transformer for AdvertsFullstats {
    fn table(&self) -> &str {
        &self.table
    }

    fn key_columns(&self) -> &'static [&'static str] {
        KEY
    }

    fn expand(&self, advert: &Json) -> Vec<Json> {
        let advert_id = ["advertId", "advert_id", "id"]
            .iter()
            .find_map(|field| coerce::lookup(advert, &[*field]))
            .cloned()
            .unwrap_or(Json::Null);

        coerce::lookup(advert, &["days"])
            .and_then(Json::as_array)
            .map(|days| {
                days.iter()
                    .map(|day| json!({ "advert_id": advert_id, "day": day }))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn normalize(&self, record: &Json, _ctx: &TransformContext) -> Option<RowData> {
        let advert_id = coerce::int_key(record, &["advert_id"])?;
        let day = record.get("day")?;
        let date = coerce::date(day, &["date"])?;

        let views = coerce::count(day, &["views"]);
        let clicks = coerce::count(day, &["clicks"]);
        let orders = coerce::count(day, &["orders"]);
        let spend = coerce::amount(day, &["sum"]);

        let ctr = coerce::optional_amount(day, &["ctr"])
            .unwrap_or_else(|| coerce::percent(clicks, views));
        let cpc = coerce::optional_amount(day, &["cpc"])
            .unwrap_or_else(|| coerce::ratio(spend, Decimal::from(clicks)));
        let cr = coerce::optional_amount(day, &["cr"])
            .unwrap_or_else(|| coerce::percent(orders, clicks));

        Some(
            row(&self.table)
                .with("advert_id", advert_id)
                .with("date", date)
                .with("views", views)
                .with("clicks", clicks)
                .with("atbs", coerce::count(day, &["atbs"]))
                .with("orders", orders)
                .with("canceled", coerce::count(day, &["canceled"]))
                .with("shks", coerce::count(day, &["shks"]))
                .with("sum", spend)
                .with("sum_price", coerce::amount(day, &["sum_price"]))
                .with("ctr", ctr)
                .with("cpc", cpc)
                .with("cr", cr),
        )
    }
}
