use super::{TransformContext, Transformer, coerce, row};
use model::records::row::RowData;
use serde_json::{Value as Json, json};

pub const KEY: &[&str] = &["advert_id", "nm_id", "date_from", "date_to", "norm_query"];

/// Statistics per normalized search query for each (campaign, product) pair.
pub struct NormqueryStats {
    table: String,
}

impl NormqueryStats {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl Transformer for NormqueryStats {
    fn table(&self) -> &str {
        &self.table
    }

    fn key_columns(&self) -> &'static [&'static str] {
        KEY
    }

    fn expand(&self, entry: &Json) -> Vec<Json> {
        let advert_id = coerce::lookup(entry, &["advert_id"]).cloned();
        let nm_id = coerce::lookup(entry, &["nm_id"]).cloned();

        coerce::lookup(entry, &["stats"])
            .and_then(Json::as_array)
            .map(|stats| {
                stats
                    .iter()
                    .map(|stat| json!({ "advert_id": advert_id, "nm_id": nm_id, "stat": stat }))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn normalize(&self, record: &Json, ctx: &TransformContext) -> Option<RowData> {
        let stat = record.get("stat")?;
        let decimal = |field: &'static str| coerce::amount(stat, &[field]);

        Some(
            row(&self.table)
                .with("advert_id", coerce::int_key(record, &["advert_id"])?)
                .with("nm_id", coerce::int_key(record, &["nm_id"])?)
                .with("date_from", ctx.window.start())
                .with("date_to", ctx.window.end())
                .with("norm_query", coerce::text(stat, &["norm_query"])?)
                .with("views", coerce::count(stat, &["views"]))
                .with("clicks", coerce::count(stat, &["clicks"]))
                .with("atbs", coerce::count(stat, &["atbs"]))
                .with("orders", coerce::count(stat, &["orders"]))
                .with("ctr", decimal("ctr"))
                .with("cpc", decimal("cpc"))
                .with("cpm", decimal("cpm"))
                .with("avg_pos", decimal("avg_pos"))
                .with("spend", decimal("spend")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::normalize_page;
    use chrono::NaiveDate;
    use model::{
        core::{value::Value, window::FetchWindow},
        pagination::page::RawPage,
    };
    use rust_decimal::Decimal;

    #[test]
    fn nested_stats_inherit_the_pair() {
        let window = FetchWindow::new(
            NaiveDate::from_ymd_opt(2026, 1, 16).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 18).unwrap(),
        )
        .unwrap();
        let entry = json!({
            "advert_id": 5, "nm_id": 50,
            "stats": [
                { "norm_query": "чайник", "views": 100, "clicks": 4, "avg_pos": 3.456, "spend": 120.5 },
                { "norm_query": "", "views": 1 }
            ]
        });
        let page = RawPage::new(window, vec![entry]);

        let outcome = normalize_page(
            &NormqueryStats::new("wb_normquery_stats"),
            &page,
            &TransformContext::new(window),
        );
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.skipped, 1);
        let row = &outcome.rows[0];
        assert_eq!(row.get_value("advert_id"), Value::Int(5));
        assert_eq!(row.get_value("date_to"), Value::Date(window.end()));
        assert_eq!(row.get_value("avg_pos"), Value::Decimal(Decimal::new(346, 2)));
    }
}
