use crate::error::WarehouseError;
use async_trait::async_trait;
use connectors::{rest::postgrest::PostgrestAdapter, sql::postgres::adapter::PgAdapter};
use model::records::{query::SelectQuery, row::RowData};
use tracing::debug;

/// Table-oriented store that ingested rows land in.
///
/// `upsert` inserts rows whose key is absent and updates the non-key
/// columns of rows whose key exists, so writing the same rows twice leaves
/// the table unchanged. `select` serves identifier lookups.
#[async_trait]
pub trait Warehouse: Send + Sync {
    fn name(&self) -> &str;

    async fn select(
        &self,
        table: &str,
        query: &SelectQuery,
    ) -> Result<Vec<RowData>, WarehouseError>;

    async fn upsert(
        &self,
        table: &str,
        rows: &[RowData],
        key_columns: &[&str],
    ) -> Result<(), WarehouseError>;
}

/// Warehouse reached through its PostgREST HTTP interface.
pub struct RestWarehouse {
    adapter: PostgrestAdapter,
}

impl RestWarehouse {
    pub fn new(adapter: PostgrestAdapter) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl Warehouse for RestWarehouse {
    fn name(&self) -> &str {
        "rest"
    }

    async fn select(
        &self,
        table: &str,
        query: &SelectQuery,
    ) -> Result<Vec<RowData>, WarehouseError> {
        Ok(self.adapter.select(table, query).await?)
    }

    async fn upsert(
        &self,
        table: &str,
        rows: &[RowData],
        key_columns: &[&str],
    ) -> Result<(), WarehouseError> {
        self.adapter.upsert(table, rows, key_columns).await?;
        Ok(())
    }
}

/// Warehouse reached over a direct Postgres connection.
pub struct PostgresWarehouse {
    adapter: PgAdapter,
}

impl PostgresWarehouse {
    pub fn new(adapter: PgAdapter) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl Warehouse for PostgresWarehouse {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn select(
        &self,
        table: &str,
        query: &SelectQuery,
    ) -> Result<Vec<RowData>, WarehouseError> {
        Ok(self.adapter.select(table, query).await?)
    }

    async fn upsert(
        &self,
        table: &str,
        rows: &[RowData],
        key_columns: &[&str],
    ) -> Result<(), WarehouseError> {
        let affected = self.adapter.upsert(table, rows, key_columns).await?;
        debug!(table, affected, "Rows upserted");
        Ok(())
    }
}
