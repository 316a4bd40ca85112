use connectors::{
    error::AdapterError,
    sql::error::{ConnectorError, DbError},
};
use engine_core::{error::WarehouseError, retry::RetryDisposition};
use tokio_postgres::{Error as PgError, error::SqlState};

pub fn classify_warehouse_error(err: &WarehouseError) -> RetryDisposition {
    match err {
        WarehouseError::Adapter(adapter_err) => classify_adapter_error(adapter_err),
        WarehouseError::Db(db_err) => classify_db_error(db_err),
        WarehouseError::Connection(conn_err) => classify_connector_error(conn_err),
        WarehouseError::InvalidRows { .. } => RetryDisposition::Stop,
    }
}

pub fn classify_adapter_error(err: &AdapterError) -> RetryDisposition {
    match err {
        AdapterError::Database(db_err) => classify_db_error(db_err),
        AdapterError::Connector(conn_err) => classify_connector_error(conn_err),
        other if other.is_transient() => RetryDisposition::Retry,
        _ => RetryDisposition::Stop,
    }
}

pub fn classify_db_error(err: &DbError) -> RetryDisposition {
    match err {
        DbError::PgError(pg_err) => classify_pg_error(pg_err),
        DbError::Write(_) => RetryDisposition::Stop,
        DbError::QueryBuildError(_) => RetryDisposition::Stop,
    }
}

fn classify_connector_error(err: &ConnectorError) -> RetryDisposition {
    match err {
        ConnectorError::Connection(pg_err) => classify_pg_error(pg_err),
        ConnectorError::InvalidUrl(_) => RetryDisposition::Stop,
        ConnectorError::TlsConfig(_) => RetryDisposition::Retry,
    }
}

fn classify_pg_error(err: &PgError) -> RetryDisposition {
    if err.is_closed() {
        return RetryDisposition::Retry;
    }

    if let Some(code) = err.code()
        && is_retryable_pg_code(code)
    {
        return RetryDisposition::Retry;
    }

    RetryDisposition::Stop
}

fn is_retryable_pg_code(code: &SqlState) -> bool {
    matches!(
        *code,
        SqlState::T_R_SERIALIZATION_FAILURE
            | SqlState::T_R_DEADLOCK_DETECTED
            | SqlState::LOCK_NOT_AVAILABLE
            | SqlState::TOO_MANY_CONNECTIONS
            | SqlState::ADMIN_SHUTDOWN
            | SqlState::CRASH_SHUTDOWN
            | SqlState::CANNOT_CONNECT_NOW
            | SqlState::CONNECTION_FAILURE
            | SqlState::CONNECTION_DOES_NOT_EXIST
            | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
            | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION
            | SqlState::CONNECTION_EXCEPTION
            | SqlState::QUERY_CANCELED
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_failures_follow_http_status() {
        let throttled = WarehouseError::Adapter(AdapterError::Http {
            endpoint: "upsert".into(),
            status: 503,
            body: String::new(),
        });
        let conflict = WarehouseError::Adapter(AdapterError::Http {
            endpoint: "upsert".into(),
            status: 409,
            body: "duplicate key".into(),
        });
        assert_eq!(classify_warehouse_error(&throttled), RetryDisposition::Retry);
        assert_eq!(classify_warehouse_error(&conflict), RetryDisposition::Stop);
    }

    #[test]
    fn invalid_rows_are_not_retried() {
        let err = WarehouseError::InvalidRows {
            table: "t".into(),
            message: "no key".into(),
        };
        assert_eq!(classify_warehouse_error(&err), RetryDisposition::Stop);
        assert_eq!(
            classify_db_error(&DbError::QueryBuildError("bad".into())),
            RetryDisposition::Stop
        );
    }
}
