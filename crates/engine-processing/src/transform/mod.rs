pub mod adverts;
pub mod coerce;
pub mod commission;
pub mod fullstats;
pub mod normquery;
pub mod ozon_analytics;
pub mod ozon_performance;
pub mod sales_funnel;
pub mod search_report;
pub mod search_texts;
pub mod spp;

use crate::error::TransformError;
use chrono::{DateTime, Utc};
use model::{
    core::window::FetchWindow,
    pagination::page::RawPage,
    records::row::RowData,
};
use serde_json::Value as Json;
use tracing::debug;

/// What a transformer may know beyond the raw record itself.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext {
    pub window: FetchWindow,
    pub fetched_at: DateTime<Utc>,
}

impl TransformContext {
    pub fn new(window: FetchWindow) -> Self {
        Self {
            window,
            fetched_at: Utc::now(),
        }
    }
}

/// Maps one upstream record shape onto rows of one warehouse table.
pub trait Transformer: Send + Sync {
    fn table(&self) -> &str;

    fn key_columns(&self) -> &'static [&'static str];

    /// Splits a raw record into the records `normalize` handles, dropping
    /// those the table never stores. Most shapes map one to one.
    fn expand(&self, record: &Json) -> Vec<Json> {
        vec![record.clone()]
    }

    /// `None` when the record cannot produce its key.
    fn normalize(&self, record: &Json, ctx: &TransformContext) -> Option<RowData>;
}

#[derive(Debug, Default)]
pub struct PageOutcome {
    pub rows: Vec<RowData>,
    pub skipped: usize,
}

/// Normalizes every record of a page. Rows missing any key column are
/// dropped and counted, so nothing with a null key reaches the writer.
pub fn normalize_page(
    transformer: &dyn Transformer,
    page: &RawPage,
    ctx: &TransformContext,
) -> PageOutcome {
    let mut outcome = PageOutcome::default();

    for record in page.records.iter().flat_map(|r| transformer.expand(r)) {
        match keyed_row(transformer, &record, ctx) {
            Ok(row) => outcome.rows.push(row),
            Err(err) => {
                debug!(table = transformer.table(), error = %err, "Record skipped");
                outcome.skipped += 1;
            }
        }
    }

    outcome
}

fn keyed_row(
    transformer: &dyn Transformer,
    record: &Json,
    ctx: &TransformContext,
) -> Result<RowData, TransformError> {
    let missing_key = || TransformError::MissingKey {
        table: transformer.table().to_string(),
        columns: transformer.key_columns().join(","),
    };

    let row = transformer.normalize(record, ctx).ok_or_else(missing_key)?;
    if !row.has_key(transformer.key_columns()) {
        return Err(missing_key());
    }
    Ok(row.with("fetched_at", ctx.fetched_at))
}

/// Starts a row for `table`.
pub(crate) fn row(table: &str) -> RowData {
    RowData::new(table, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::core::value::Value;
    use serde_json::json;

    struct ById;

    impl Transformer for ById {
        fn table(&self) -> &str {
            "items"
        }

        fn key_columns(&self) -> &'static [&'static str] {
            &["id"]
        }

        fn normalize(&self, record: &Json, _ctx: &TransformContext) -> Option<RowData> {
            Some(row("items").with("id", coerce::int_key(record, &["id"])))
        }
    }

    #[test]
    fn rows_without_key_are_counted_not_returned() {
        let window = FetchWindow::single_day(NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
        let page = RawPage::new(
            window,
            vec![json!({ "id": 1 }), json!({ "name": "x" }), json!({ "id": 3 })],
        );

        let outcome = normalize_page(&ById, &page, &TransformContext::new(window));
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.skipped, 1);
        assert!(matches!(
            outcome.rows[0].get_value("fetched_at"),
            Value::Timestamp(_)
        ));
    }
}
