use crate::{connectors::destination::Warehouse, error::WarehouseError};
use async_trait::async_trait;
use model::{
    core::value::Value,
    records::{query::SelectQuery, row::RowData},
};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
};
use tokio::sync::Mutex;

/// In-process warehouse used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: Mutex<BTreeMap<String, Vec<RowData>>>,
    rejected: Mutex<HashSet<String>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `table` with rows as they are, without key handling.
    pub async fn insert(&self, table: &str, rows: Vec<RowData>) {
        self.tables
            .lock()
            .await
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Makes every later upsert into `table` fail.
    pub async fn reject_writes(&self, table: &str) {
        self.rejected.lock().await.insert(table.to_string());
    }

    pub async fn rows(&self, table: &str) -> Vec<RowData> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn row_count(&self, table: &str) -> usize {
        self.tables.lock().await.get(table).map_or(0, Vec::len)
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    fn name(&self) -> &str {
        "memory"
    }

    async fn select(
        &self,
        table: &str,
        query: &SelectQuery,
    ) -> Result<Vec<RowData>, WarehouseError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<RowData> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        query
                            .filters
                            .iter()
                            .all(|f| f.matches(&row.get_value(f.column())))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by(|a, b| {
            query
                .order_by
                .iter()
                .map(|col| compare_values(&a.get_value(col), &b.get_value(col)))
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        if query.columns.is_empty() {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                let fields = query
                    .columns
                    .iter()
                    .filter_map(|col| row.get(col).cloned())
                    .collect();
                RowData::new(&row.entity, fields)
            })
            .collect())
    }

    async fn upsert(
        &self,
        table: &str,
        rows: &[RowData],
        key_columns: &[&str],
    ) -> Result<(), WarehouseError> {
        if self.rejected.lock().await.contains(table) {
            return Err(WarehouseError::InvalidRows {
                table: table.to_string(),
                message: "writes rejected".to_string(),
            });
        }

        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let key = row
                .key_values(key_columns)
                .ok_or_else(|| WarehouseError::InvalidRows {
                    table: table.to_string(),
                    message: format!("row is missing key columns {key_columns:?}"),
                })?;
            keyed.push((key, row));
        }

        let mut tables = self.tables.lock().await;
        let stored = tables.entry(table.to_string()).or_default();
        for (key, row) in keyed {
            match stored
                .iter_mut()
                .find(|existing| existing.key_values(key_columns).as_ref() == Some(&key))
            {
                Some(existing) => {
                    for field in &row.field_values {
                        existing.set(&field.name, field.value.clone());
                    }
                }
                None => stored.push(row.clone()),
            }
        }
        Ok(())
    }
}

/// Total order used for `order_by`: nulls last, mismatched types by rendering.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => match (a.as_decimal(), b.as_decimal()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}
