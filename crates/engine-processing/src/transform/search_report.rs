use super::{TransformContext, Transformer, coerce, row};
use model::records::row::RowData;
use rust_decimal::Decimal;
use serde_json::Value as Json;

pub const KEY: &[&str] = &["nm_id", "period_start", "period_end"];

/// Search visibility per product for one period. Upstream groups products
/// by subject; each group's `items[]` become rows.
pub struct SearchReport {
    table: String,
}

impl SearchReport {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

/// Metrics arrive either bare or as `{ "current": .., "dynamics": .. }`.
pub(crate) fn current<'a>(record: &'a Json, field: &str) -> Option<&'a Json> {
    coerce::lookup(record, &[field, "current"]).or_else(|| {
        coerce::lookup(record, &[field]).filter(|v| !v.is_object())
    })
}

pub(crate) fn current_count(record: &Json, field: &str) -> i64 {
    coerce::count_of(current(record, field))
}

pub(crate) fn current_decimal(record: &Json, field: &str) -> Decimal {
    current(record, field)
        .and_then(coerce::decimal_of)
        .map(coerce::round2)
        .unwrap_or(Decimal::ZERO)
}

impl Transformer for SearchReport {
    fn table(&self) -> &str {
        &self.table
    }

    fn key_columns(&self) -> &'static [&'static str] {
        KEY
    }

    fn expand(&self, group: &Json) -> Vec<Json> {
        match coerce::lookup(group, &["items"]).and_then(Json::as_array) {
            Some(items) => items.clone(),
            None => Vec::new(),
        }
    }

    fn normalize(&self, item: &Json, ctx: &TransformContext) -> Option<RowData> {
        Some(
            row(&self.table)
                .with("nm_id", coerce::int_key(item, &["nmId"])?)
                .with("period_start", ctx.window.start())
                .with("period_end", ctx.window.end())
                .with("name", coerce::text(item, &["name"]))
                .with("vendor_code", coerce::text(item, &["vendorCode"]))
                .with("brand_name", coerce::text(item, &["brandName"]))
                .with("subject_name", coerce::text(item, &["subjectName"]))
                .with("avg_position", current_decimal(item, "avgPosition"))
                .with("visibility", current_decimal(item, "visibility"))
                .with("open_card", current_count(item, "openCard"))
                .with("add_to_cart", current_count(item, "addToCart"))
                .with("orders", current_count(item, "orders"))
                .with("open_to_cart", current_decimal(item, "openToCart"))
                .with("cart_to_order", current_decimal(item, "cartToOrder")),
        )
    }
}
