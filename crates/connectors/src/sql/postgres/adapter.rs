use crate::sql::{
    error::{ConnectorError, DbError},
    postgres::{
        params::PgParamStore,
        query::{rows_per_statement, select_statement, upsert_statement},
        utils::{connect_client, to_row_data},
    },
};
use model::records::{
    query::SelectQuery,
    row::{RowData, union_columns},
};
use std::sync::Arc;
use tokio_postgres::Client;
use tracing::debug;

/// Postgres warehouse adapter: keyed upserts and filtered selects.
#[derive(Clone)]
pub struct PgAdapter {
    client: Arc<Client>,
}

impl PgAdapter {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let client = Arc::new(connect_client(url).await?);
        Ok(PgAdapter { client })
    }

    /// Upserts `rows`, split into as few statements as the bind parameter
    /// limit allows. Returns the affected row count.
    pub async fn upsert(
        &self,
        table: &str,
        rows: &[RowData],
        key_columns: &[&str],
    ) -> Result<u64, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let columns = union_columns(rows);
        let mut affected = 0;
        for part in rows.chunks(rows_per_statement(columns.len())) {
            let sql = upsert_statement(table, &columns, key_columns, part.len())?;
            let values = part
                .iter()
                .flat_map(|row| row.values_for(&columns))
                .collect::<Vec<_>>();

            let statement = self.client.prepare(&sql).await?;
            let bindings = PgParamStore::for_types(values, statement.params())?;
            affected += self.client.execute(&statement, &bindings.as_refs()).await?;
        }

        debug!(table, rows = rows.len(), affected, "Upsert executed");
        Ok(affected)
    }

    pub async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<RowData>, DbError> {
        let (sql, values) = select_statement(table, query);
        let statement = self.client.prepare(&sql).await?;
        let bindings = PgParamStore::for_types(values, statement.params())?;
        let rows = self.client.query(&statement, &bindings.as_refs()).await?;
        Ok(rows.iter().map(|row| to_row_data(row, table)).collect())
    }
}
