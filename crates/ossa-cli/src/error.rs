//! CLI error types

use ossa_conformance::ConformanceError;
use thiserror::Error;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    /// Engine error (profile resolution, strict validation)
    #[error("{0}")]
    Conformance(#[from] ConformanceError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Manifest could not be read or parsed
    #[error("Cannot load manifest {path}: {message}")]
    ManifestLoad { path: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
