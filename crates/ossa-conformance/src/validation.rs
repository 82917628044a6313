//! Structural validation seam.
//!
//! The engine never re-implements schema checks; it consumes a
//! [`StructuralValidator`] that reports `{valid, errors}`. Two validators ship
//! here: [`NoopValidator`] for callers that validate elsewhere, and
//! [`ManifestShapeValidator`] which checks the envelope every OSSA manifest
//! shares.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a structural validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether validation passed
    pub valid: bool,

    /// Validation errors (if any)
    pub errors: Vec<StructuralError>,
}

impl ValidationResult {
    /// Create a passing validation result
    pub fn pass() -> Self {
        Self {
            valid: true,
            errors: vec![],
        }
    }

    /// Create a failing validation result
    pub fn fail(errors: Vec<StructuralError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Add an error
    pub fn with_error(mut self, error: StructuralError) -> Self {
        self.errors.push(error);
        self.valid = false;
        self
    }

    /// Merge another validation result
    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.errors.extend(other.errors);
        self.valid = self.valid && other.valid;
        self
    }
}

/// One structural problem, addressed by document path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralError {
    pub path: String,
    pub message: String,
}

impl StructuralError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StructuralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Schema-level validator run before conformance scoring.
pub trait StructuralValidator: Send + Sync {
    fn validate(&self, manifest: &Value) -> ValidationResult;
}

/// Accepts every document.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl StructuralValidator for NoopValidator {
    fn validate(&self, _manifest: &Value) -> ValidationResult {
        ValidationResult::pass()
    }
}

pub const API_VERSION_PREFIX: &str = "ossa/";
pub const MANIFEST_KINDS: &[&str] = &["Agent", "Task", "Workflow"];

/// Checks the `apiVersion` / `kind` / `metadata` / `spec` envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestShapeValidator;

impl ManifestShapeValidator {
    fn validate_api_version(manifest: &Value) -> ValidationResult {
        match manifest.get("apiVersion") {
            Some(Value::String(version)) if version.starts_with(API_VERSION_PREFIX) => {
                ValidationResult::pass()
            }
            Some(Value::String(version)) => ValidationResult::pass().with_error(
                StructuralError::new(
                    "apiVersion",
                    format!("invalid apiVersion format: {}", version),
                ),
            ),
            Some(_) => ValidationResult::pass()
                .with_error(StructuralError::new("apiVersion", "must be a string")),
            None => ValidationResult::pass()
                .with_error(StructuralError::new("apiVersion", "is required")),
        }
    }

    fn validate_kind(manifest: &Value) -> ValidationResult {
        match manifest.get("kind") {
            Some(Value::String(kind)) if MANIFEST_KINDS.contains(&kind.as_str()) => {
                ValidationResult::pass()
            }
            Some(Value::String(kind)) => ValidationResult::pass().with_error(StructuralError::new(
                "kind",
                format!("unknown kind {}, expected one of {}", kind, MANIFEST_KINDS.join(", ")),
            )),
            Some(_) => ValidationResult::pass()
                .with_error(StructuralError::new("kind", "must be a string")),
            None => {
                ValidationResult::pass().with_error(StructuralError::new("kind", "is required"))
            }
        }
    }

    fn validate_metadata(manifest: &Value) -> ValidationResult {
        let metadata = match manifest.get("metadata") {
            Some(Value::Object(metadata)) => metadata,
            Some(_) => {
                return ValidationResult::pass()
                    .with_error(StructuralError::new("metadata", "must be an object"))
            }
            None => {
                return ValidationResult::pass()
                    .with_error(StructuralError::new("metadata", "is required"))
            }
        };

        match metadata.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => ValidationResult::pass(),
            Some(Value::String(_)) => ValidationResult::pass()
                .with_error(StructuralError::new("metadata.name", "must not be empty")),
            Some(_) => ValidationResult::pass()
                .with_error(StructuralError::new("metadata.name", "must be a string")),
            None => ValidationResult::pass()
                .with_error(StructuralError::new("metadata.name", "is required")),
        }
    }

    fn validate_spec(manifest: &Value) -> ValidationResult {
        match manifest.get("spec") {
            None | Some(Value::Object(_)) => ValidationResult::pass(),
            Some(_) => ValidationResult::pass()
                .with_error(StructuralError::new("spec", "must be an object")),
        }
    }
}

impl StructuralValidator for ManifestShapeValidator {
    fn validate(&self, manifest: &Value) -> ValidationResult {
        if !manifest.is_object() {
            return ValidationResult::fail(vec![StructuralError::new(
                "root",
                "manifest must be an object",
            )]);
        }

        ValidationResult::pass()
            .merge(Self::validate_api_version(manifest))
            .merge(Self::validate_kind(manifest))
            .merge(Self::validate_metadata(manifest))
            .merge(Self::validate_spec(manifest))
    }
}
