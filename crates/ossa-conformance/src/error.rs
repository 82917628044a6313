use crate::validation::StructuralError;
use thiserror::Error;

/// Errors from the conformance engine.
#[derive(Error, Debug)]
pub enum ConformanceError {
    #[error("conformance profile not found: {0}")]
    ProfileNotFound(String),

    #[error("circular profile inheritance: {}", chain.join(" -> "))]
    CircularInheritance { chain: Vec<String> },

    #[error("invalid profile {id}: {reason}")]
    InvalidProfile { id: String, reason: String },

    #[error("failed to parse profile definition {source_name}: {message}")]
    ProfileParse {
        source_name: String,
        message: String,
    },

    #[error("structural validation failed with {} error(s)", errors.len())]
    StructuralValidationFailed { errors: Vec<StructuralError> },

    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConformanceError {
    /// Whether the error comes from profile resolution rather than the manifest.
    pub fn is_profile_error(&self) -> bool {
        matches!(
            self,
            ConformanceError::ProfileNotFound(_)
                | ConformanceError::CircularInheritance { .. }
                | ConformanceError::InvalidProfile { .. }
                | ConformanceError::ProfileParse { .. }
        )
    }
}

/// Result type for conformance operations.
pub type Result<T> = std::result::Result<T, ConformanceError>;
