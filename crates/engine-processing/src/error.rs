use engine_core::error::WarehouseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("record for '{table}' lacks key columns ({columns})")]
    MissingKey { table: String, columns: String },
}

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("Failed to write batch {batch} to '{table}': {source}")]
    WriteBatch {
        table: String,
        batch: usize,
        #[source]
        source: WarehouseError,
    },

    #[error("Retry attempts exhausted after {attempts} tries writing to '{table}': {source}")]
    RetriesExhausted {
        table: String,
        attempts: usize,
        #[source]
        source: WarehouseError,
    },
}
