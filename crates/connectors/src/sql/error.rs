use thiserror::Error;

/// Errors from the Postgres query layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Any driver error.
    #[error("Postgres error: {0}")]
    PgError(#[from] tokio_postgres::Error),

    /// Writing rows failed at the application level.
    #[error("Write error: {0}")]
    Write(String),

    /// An error occurred while building a SQL statement.
    #[error("Query build error: {0}")]
    QueryBuildError(String),
}

/// Errors happening during connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Postgres connection failed: {0}")]
    Connection(#[from] tokio_postgres::Error),

    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] native_tls::Error),
}
