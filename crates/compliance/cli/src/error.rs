//! CLI error types

use compliance_engine::{CatalogError, EngineError};
use thiserror::Error;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog could not be loaded
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Engine rejected a request
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A workflow run did not succeed
    #[error("Workflow failed: {0}")]
    RunFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything else, with context
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
