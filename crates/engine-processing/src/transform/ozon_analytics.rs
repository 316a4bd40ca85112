use super::{TransformContext, Transformer, coerce, row};
use connectors::ozon::seller::ANALYTICS_METRICS;
use model::records::row::RowData;
use serde_json::Value as Json;

pub const KEY: &[&str] = &["date", "sku"];

/// Per-day, per-SKU seller analytics. `dimensions` are `[day, sku]` and
/// `metrics[i]` belongs to `ANALYTICS_METRICS[i]`.
pub struct OzonAnalytics {
    table: String,
}

impl OzonAnalytics {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

fn is_amount(metric: &str) -> bool {
    matches!(metric, "revenue" | "position_category")
}

impl Transformer for OzonAnalytics {
    fn table(&self) -> &str {
        &self.table
    }

    fn key_columns(&self) -> &'static [&'static str] {
        KEY
    }

    fn normalize(&self, record: &Json, _ctx: &TransformContext) -> Option<RowData> {
        let dimensions = coerce::lookup(record, &["dimensions"])?.as_array()?;
        let day = dimensions.first()?;
        let sku = dimensions.get(1)?;
        let values = coerce::lookup(record, &["metrics"])
            .and_then(Json::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut row = row(&self.table)
            .with("date", coerce::date(day, &["id"])?)
            .with("sku", coerce::int_key(sku, &["id"])?)
            .with("product_name", coerce::text(sku, &["name"]));

        for (index, metric) in ANALYTICS_METRICS.iter().enumerate() {
            let value = values.get(index);
            if is_amount(metric) {
                let amount = value
                    .and_then(coerce::decimal_of)
                    .map(coerce::round2)
                    .unwrap_or_default();
                row.set(metric, amount);
            } else {
                row.set(metric, coerce::count_of(value));
            }
        }

        Some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::core::{value::Value, window::FetchWindow};
    use rust_decimal::Decimal;
    use serde_json::json;

    #[test]
    fn metrics_map_by_position() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 8).unwrap();
        let ctx = TransformContext::new(FetchWindow::single_day(day));
        let record = json!({
            "dimensions": [ { "id": "2026-01-08", "name": "" }, { "id": "1418756574", "name": "Товар" } ],
            "metrics": [1500.505, 5, 40]
        });

        let row = OzonAnalytics::new("ozon_analytics_data")
            .normalize(&record, &ctx)
            .unwrap();
        assert_eq!(row.get_value("date"), Value::Date(day));
        assert_eq!(row.get_value("sku"), Value::Int(1418756574));
        assert_eq!(row.get_value("revenue"), Value::Decimal(Decimal::new(150051, 2)));
        assert_eq!(row.get_value("ordered_units"), Value::Int(5));
        assert_eq!(row.get_value("hits_view_search"), Value::Int(40));
        assert_eq!(row.get_value("delivered_units"), Value::Int(0));
        assert_eq!(
            row.get_value("position_category"),
            Value::Decimal(Decimal::ZERO)
        );
    }

    #[test]
    fn missing_sku_dimension_has_no_key() {
        let ctx = TransformContext::new(FetchWindow::single_day(
            NaiveDate::from_ymd_opt(2026, 1, 8).unwrap(),
        ));
        let record = json!({ "dimensions": [ { "id": "2026-01-08" } ], "metrics": [] });
        assert!(OzonAnalytics::new("t").normalize(&record, &ctx).is_none());
    }
}
