use engine_config::sources::IdentifierLookup;
use engine_core::{connectors::destination::Warehouse, error::WarehouseError};
use model::{
    core::{identifiers::Identifier, value::Value, window::FetchWindow},
    records::query::{Filter, SelectQuery},
};
use std::collections::BTreeSet;
use tracing::debug;

const ADVERT_ID: &[&str] = &["advert_id"];
const ADVERT_PRODUCT: &[&str] = &["advert_id", "nmid"];
const PRODUCT_ID: &[&str] = &["nm_id"];

/// Tables and filters the identifier lookups read from.
#[derive(Debug, Clone)]
pub struct LookupTables {
    pub adverts_table: String,
    pub search_report_table: String,
    pub advert_statuses: Vec<i64>,
}

impl LookupTables {
    fn query(&self, lookup: IdentifierLookup, window: FetchWindow) -> (&str, SelectQuery, &'static [&'static str]) {
        let statuses = || {
            Filter::In(
                "status".to_string(),
                self.advert_statuses.iter().copied().map(Value::Int).collect(),
            )
        };

        match lookup {
            IdentifierLookup::AdvertIds => (
                self.adverts_table.as_str(),
                SelectQuery::columns(&["advert_id"])
                    .filter(statuses())
                    .order_by("advert_id"),
                ADVERT_ID,
            ),
            IdentifierLookup::AdvertProducts => (
                self.adverts_table.as_str(),
                SelectQuery::columns(&["advert_id", "nmid"])
                    .filter(statuses())
                    .order_by("advert_id")
                    .order_by("nmid"),
                ADVERT_PRODUCT,
            ),
            IdentifierLookup::SearchReportProducts => (
                self.search_report_table.as_str(),
                SelectQuery::columns(&["nm_id"])
                    .filter(Filter::Eq(
                        "period_start".to_string(),
                        Value::Date(window.start()),
                    ))
                    .order_by("nm_id"),
                PRODUCT_ID,
            ),
        }
    }
}

/// Reads the identifiers a chunked source fetches for `window`.
///
/// Output is sorted and deduplicated. Rows lacking any of the id columns
/// are ignored.
pub async fn resolve_identifiers(
    warehouse: &dyn Warehouse,
    tables: &LookupTables,
    lookup: IdentifierLookup,
    window: FetchWindow,
) -> Result<Vec<Identifier>, WarehouseError> {
    let (table, query, columns) = tables.query(lookup, window);
    let rows = warehouse.select(table, &query).await?;

    let identifiers: BTreeSet<Identifier> = rows
        .iter()
        .filter_map(|row| {
            columns
                .iter()
                .map(|column| row.get_value(column).as_i64())
                .collect::<Option<Vec<i64>>>()
        })
        .map(Identifier::from_parts)
        .collect();

    debug!(table, ?lookup, found = identifiers.len(), "Identifiers resolved");
    Ok(identifiers.into_iter().collect())
}
