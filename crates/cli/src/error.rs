use engine_config::error::ConfigError;
use engine_runtime::error::RunError;
use model::execution::errors::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to load the env file: {0}")]
    EnvFile(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start the run: {0}")]
    Runner(#[from] RunError),

    #[error("Invalid window: {0}")]
    Window(#[from] ModelError),

    #[error("Failed to write the report: {0}")]
    ReportWrite(#[from] std::io::Error),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Critical sources failed: {}", .0.join(", "))]
    CriticalSourcesFailed(Vec<String>),
}
