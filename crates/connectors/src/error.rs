use crate::sql::error::{ConnectorError, DbError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// The upstream answered with a non-success status.
    #[error("HTTP {status} from {endpoint}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response (timeout, reset, DNS).
    #[error("Network error calling {endpoint}: {message}")]
    Network {
        endpoint: String,
        message: String,
        timeout: bool,
    },

    /// The response arrived but did not have the expected shape.
    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// A required credential is absent.
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Invalid adapter configuration, e.g. a malformed base URL.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Database-related error.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Failed to open a database connection.
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),
}

impl AdapterError {
    pub fn decode(endpoint: &str, message: impl Into<String>) -> Self {
        AdapterError::Decode {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    /// True for failures that may succeed when repeated: network errors,
    /// HTTP 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            AdapterError::Network { .. } => true,
            AdapterError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
