use super::{TransformContext, Transformer, coerce, row};
use model::records::row::RowData;
use serde_json::Value as Json;

pub const KEY: &[&str] = &["date", "nmid"];

/// Daily snapshot of the marketplace discount per product, taken from the
/// day's orders. Canceled orders do not count.
pub struct SppSnapshot {
    table: String,
}

impl SppSnapshot {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl Transformer for SppSnapshot {
    fn table(&self) -> &str {
        &self.table
    }

    fn key_columns(&self) -> &'static [&'static str] {
        KEY
    }

    fn expand(&self, order: &Json) -> Vec<Json> {
        if coerce::flag(order, &["isCancel"]) {
            return Vec::new();
        }
        vec![order.clone()]
    }

    fn normalize(&self, order: &Json, ctx: &TransformContext) -> Option<RowData> {
        Some(
            row(&self.table)
                .with("date", ctx.window.start())
                .with("nmid", coerce::int_key(order, &["nmId"])?)
                .with("spp", coerce::optional_amount(order, &["spp"]))
                .with("finished_price", coerce::amount(order, &["finishedPrice"])),
        )
    }
}
