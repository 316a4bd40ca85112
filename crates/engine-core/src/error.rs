use crate::retry::{RetryDisposition, RetryError};
use connectors::{
    error::AdapterError,
    sql::error::{ConnectorError, DbError},
};
use model::execution::report::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Failure while pulling pages from an upstream API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("HTTP {status} from {endpoint}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("network error calling {endpoint}: {message}")]
    Network { endpoint: String, message: String },

    #[error("malformed response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("report {report_id} not ready after {}s", waited.as_secs())]
    ReportTimeout { report_id: String, waited: Duration },

    #[error("report {report_id} failed upstream with state {state}")]
    ReportFailed { report_id: String, state: String },

    #[error("gave up after {attempts} attempts: {last}")]
    TransientFailure {
        attempts: usize,
        last: Box<FetchError>,
    },
}

impl FetchError {
    pub fn decode(endpoint: &str, message: impl Into<String>) -> Self {
        FetchError::Decode {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Configuration(_) => ErrorKind::Configuration,
            FetchError::Http { status, .. } if matches!(status, 401 | 403) => {
                ErrorKind::Configuration
            }
            FetchError::Http { status, .. } if is_transient_status(*status) => {
                ErrorKind::Transient
            }
            FetchError::Http { .. } | FetchError::ReportFailed { .. } => ErrorKind::Rejected,
            FetchError::Network { .. } | FetchError::TransientFailure { .. } => {
                ErrorKind::Transient
            }
            FetchError::Decode { .. } => ErrorKind::Decode,
            FetchError::ReportTimeout { .. } => ErrorKind::ReportTimeout,
        }
    }

    /// Decode failures spoil one page; the stream may go on to the next.
    pub fn is_page_local(&self) -> bool {
        matches!(self, FetchError::Decode { .. })
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Retry network failures, HTTP 429 and 5xx. Everything else stops.
pub fn classify_fetch_error(err: &FetchError) -> RetryDisposition {
    match err {
        FetchError::Network { .. } => RetryDisposition::Retry,
        FetchError::Http { status, .. } if is_transient_status(*status) => {
            RetryDisposition::Retry
        }
        _ => RetryDisposition::Stop,
    }
}

impl From<AdapterError> for FetchError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Http {
                endpoint,
                status,
                body,
            } => FetchError::Http {
                endpoint,
                status,
                body,
            },
            AdapterError::Network {
                endpoint, message, ..
            } => FetchError::Network { endpoint, message },
            AdapterError::Decode { endpoint, message } => FetchError::Decode { endpoint, message },
            AdapterError::MissingCredential(name) => {
                FetchError::Configuration(format!("missing credential {name}"))
            }
            other => FetchError::Configuration(other.to_string()),
        }
    }
}

impl From<RetryError<FetchError>> for FetchError {
    fn from(err: RetryError<FetchError>) -> Self {
        match err {
            RetryError::Fatal(err) => err,
            RetryError::AttemptsExceeded { attempts, last } => FetchError::TransientFailure {
                attempts,
                last: Box::new(last),
            },
        }
    }
}

/// Failure of a warehouse read or write.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("warehouse request failed: {0}")]
    Adapter(#[from] AdapterError),

    #[error("warehouse database error: {0}")]
    Db(#[from] DbError),

    #[error("warehouse connection error: {0}")]
    Connection(#[from] ConnectorError),

    #[error("invalid rows for {table}: {message}")]
    InvalidRows { table: String, message: String },
}
