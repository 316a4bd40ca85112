use super::{
    TransformContext, Transformer, coerce, row,
    search_report::{current_count, current_decimal},
};
use model::records::row::RowData;
use serde_json::Value as Json;

pub const KEY: &[&str] = &["nm_id", "text", "period_start", "period_end"];

/// Top search phrases leading to each product for one period.
pub struct SearchTexts {
    table: String,
}

impl SearchTexts {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl Transformer for SearchTexts {
    fn table(&self) -> &str {
        &self.table
    }

    fn key_columns(&self) -> &'static [&'static str] {
        KEY
    }

    fn normalize(&self, item: &Json, ctx: &TransformContext) -> Option<RowData> {
        Some(
            row(&self.table)
                .with("nm_id", coerce::int_key(item, &["nmId"])?)
                .with("text", coerce::text(item, &["text"])?)
                .with("period_start", ctx.window.start())
                .with("period_end", ctx.window.end())
                .with("frequency", current_count(item, "frequency"))
                .with("week_frequency", current_count(item, "weekFrequency"))
                .with("avg_position", current_decimal(item, "avgPosition"))
                .with("median_position", current_decimal(item, "medianPosition"))
                .with("open_card", current_count(item, "openCard"))
                .with("add_to_cart", current_count(item, "addToCart"))
                .with("orders", current_count(item, "orders")),
        )
    }
}
