use crate::{error::ConsumerError, retry::classify_warehouse_error};
use engine_core::{
    connectors::destination::Warehouse,
    retry::{RetryError, RetryPolicy},
};
use model::{core::value::Value, records::row::RowData};
use std::{collections::HashMap, sync::Arc, time::Instant};
use tracing::{info, warn};

/// A batch that still failed after retries.
#[derive(Debug)]
pub struct BatchFailure {
    pub batch: usize,
    pub rows: usize,
    pub error: ConsumerError,
}

#[derive(Debug, Default)]
pub struct WriteResult {
    pub written_count: usize,
    pub errors: Vec<BatchFailure>,
}

impl WriteResult {
    pub fn failed_rows(&self) -> usize {
        self.errors.iter().map(|f| f.rows).sum()
    }

    pub fn merge(&mut self, other: WriteResult) {
        self.written_count += other.written_count;
        self.errors.extend(other.errors);
    }
}

/// Writes normalized rows in fixed-size batches with keyed upserts.
///
/// A failing batch is retried under the policy; if it still fails it is
/// recorded in the result and the next batch is written.
pub struct UpsertWriter {
    warehouse: Arc<dyn Warehouse>,
    retry: RetryPolicy,
    batch_size: usize,
}

impl UpsertWriter {
    pub fn new(warehouse: Arc<dyn Warehouse>, retry: RetryPolicy, batch_size: usize) -> Self {
        Self {
            warehouse,
            retry,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn write(
        &self,
        table: &str,
        rows: Vec<RowData>,
        key_columns: &[&str],
    ) -> WriteResult {
        let rows = dedup_by_key(rows, key_columns);
        let mut result = WriteResult::default();

        for (index, batch) in rows.chunks(self.batch_size).enumerate() {
            let number = index + 1;
            let start = Instant::now();
            let warehouse = self.warehouse.as_ref();

            let outcome = self
                .retry
                .run(
                    || async move { warehouse.upsert(table, batch, key_columns).await },
                    classify_warehouse_error,
                )
                .await;

            match outcome {
                Ok(()) => {
                    info!(
                        table,
                        batch = number,
                        rows = batch.len(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Batch written"
                    );
                    result.written_count += batch.len();
                }
                Err(err) => {
                    let error = match err {
                        RetryError::Fatal(source) => ConsumerError::WriteBatch {
                            table: table.to_string(),
                            batch: number,
                            source,
                        },
                        RetryError::AttemptsExceeded { attempts, last } => {
                            ConsumerError::RetriesExhausted {
                                table: table.to_string(),
                                attempts,
                                source: last,
                            }
                        }
                    };
                    warn!(table, batch = number, rows = batch.len(), error = %error, "Batch write failed");
                    result.errors.push(BatchFailure {
                        batch: number,
                        rows: batch.len(),
                        error,
                    });
                }
            }
        }

        result
    }
}

/// Keeps one row per key: the last occurrence, at the position of the first.
/// Rows without a complete key are passed through untouched.
pub fn dedup_by_key(rows: Vec<RowData>, key_columns: &[&str]) -> Vec<RowData> {
    let mut positions: HashMap<Vec<Value>, usize> = HashMap::with_capacity(rows.len());
    let mut unique: Vec<RowData> = Vec::with_capacity(rows.len());

    for row in rows {
        match row.key_values(key_columns) {
            Some(key) => match positions.get(&key) {
                Some(&position) => unique[position] = row,
                None => {
                    positions.insert(key, unique.len());
                    unique.push(row);
                }
            },
            None => unique.push(row),
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::connectors::memory::MemoryWarehouse;
    use std::time::Duration;

    fn row(id: i64, day: i64, views: i64) -> RowData {
        RowData::new("stats", vec![])
            .with("id", id)
            .with("day", day)
            .with("views", views)
    }

    const KEY: &[&str] = &["id", "day"];

    #[test]
    fn duplicates_collapse_to_last_value() {
        let rows = vec![row(1, 1, 10), row(2, 1, 20), row(1, 1, 30)];
        let unique = dedup_by_key(rows, KEY);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].get_value("views"), Value::Int(30));
        assert_eq!(unique[1].get_value("id"), Value::Int(2));
    }

    #[tokio::test]
    async fn writes_in_batches_and_is_idempotent() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let writer = UpsertWriter::new(warehouse.clone(), RetryPolicy::none(), 2);
        let rows: Vec<_> = (1..=5).map(|i| row(i, 1, i * 10)).collect();

        let first = writer.write("stats", rows.clone(), KEY).await;
        let second = writer.write("stats", rows, KEY).await;

        assert_eq!(first.written_count, 5);
        assert_eq!(second.written_count, 5);
        assert!(first.errors.is_empty());
        assert_eq!(warehouse.row_count("stats").await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_batches_are_reported_not_swallowed() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        warehouse.reject_writes("stats").await;
        let retry = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50));
        let writer = UpsertWriter::new(warehouse.clone(), retry, 2);
        let rows: Vec<_> = (1..=3).map(|i| row(i, 1, 1)).collect();

        let result = writer.write("stats", rows, KEY).await;

        assert_eq!(result.written_count, 0);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.failed_rows(), 3);
        assert!(matches!(
            result.errors[0].error,
            ConsumerError::WriteBatch { batch: 1, .. }
        ));
    }
}
