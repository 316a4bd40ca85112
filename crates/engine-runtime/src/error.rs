use connectors::{error::AdapterError, sql::error::ConnectorError};
use engine_config::error::ConfigError;
use thiserror::Error;

/// Errors that stop a run before any source is fetched.
///
/// Failures inside a source never surface here; they are recorded in that
/// source's report.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{source_name}: {message}")]
    MissingCredential {
        source_name: String,
        message: String,
    },

    #[error("adapter setup failed: {0}")]
    Adapter(#[from] AdapterError),

    #[error("warehouse connection failed: {0}")]
    Connection(#[from] ConnectorError),

    #[error("warehouse is not configured: {0}")]
    Warehouse(String),
}

impl RunError {
    /// Missing credentials are reported against the source that needs them.
    pub fn for_source(source_name: &str, err: AdapterError) -> Self {
        match err {
            AdapterError::MissingCredential(name) => RunError::MissingCredential {
                source_name: source_name.to_string(),
                message: format!("missing credential {name}"),
            },
            other => RunError::Adapter(other),
        }
    }
}
