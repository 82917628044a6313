//! Constraint evaluation against resolved manifest values.
//!
//! Every constraint kind except `required` reads as "if present, must ...":
//! an absent value is skipped. `required` is the only kind that turns absence
//! into a violation, independent of whether the path is scored as required
//! or optional.
//!
//! `enum` membership compares numbers by value, so `1` and `1.0` are the same
//! member; every other value compares by JSON equality.

use crate::path::get_by_path;
use crate::profile::{ConformanceProfile, Constraint, ValueType};
use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Which rule a violation broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    Pattern,
    Enum,
    Type,
    Min,
    Max,
    Required,
    /// Synthetic: the manifest could not be evaluated at all.
    Evaluation,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintKind::Pattern => "pattern",
            ConstraintKind::Enum => "enum",
            ConstraintKind::Type => "type",
            ConstraintKind::Min => "min",
            ConstraintKind::Max => "max",
            ConstraintKind::Required => "required",
            ConstraintKind::Evaluation => "evaluation",
        };
        f.write_str(name)
    }
}

/// A constraint the manifest failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub path: String,
    pub kind: ConstraintKind,
    pub expected: String,
    /// Rendered actual value, or `"absent"`.
    pub actual: String,
}

impl ConstraintViolation {
    pub fn new(
        path: impl Into<String>,
        kind: ConstraintKind,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: expected {}, got {}",
            self.kind, self.path, self.expected, self.actual
        )
    }
}

/// Compiled patterns, keyed by source text. Shared across runs.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: DashMap<String, Arc<Regex>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(&self, pattern: &str) -> Result<Arc<Regex>, regex::Error> {
        if let Some(regex) = self.compiled.get(pattern) {
            return Ok(Arc::clone(regex.value()));
        }
        let regex = Arc::new(Regex::new(pattern)?);
        self.compiled.insert(pattern.to_string(), Arc::clone(&regex));
        Ok(regex)
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

fn same_member(member: &Value, value: &Value) -> bool {
    match (member.as_f64(), value.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => member == value,
    }
}

/// String form used for pattern matching and violation reports.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Evaluate every declared constraint of `profile`, in path order.
pub fn validate_constraints(
    manifest: &Value,
    profile: &ConformanceProfile,
    patterns: &PatternCache,
) -> Vec<ConstraintViolation> {
    profile
        .constraints
        .iter()
        .filter_map(|(path, constraint)| {
            check_constraint(path, constraint, get_by_path(manifest, path), patterns)
        })
        .collect()
}

/// Evaluate one constraint against an already-resolved value.
pub fn check_constraint(
    path: &str,
    constraint: &Constraint,
    value: Option<&Value>,
    patterns: &PatternCache,
) -> Option<ConstraintViolation> {
    let violation = |kind, actual: String| {
        Some(ConstraintViolation::new(path, kind, constraint.describe(), actual))
    };

    let value = match (constraint, value) {
        (Constraint::Required, None) => {
            return violation(ConstraintKind::Required, "absent".to_string())
        }
        (Constraint::Required, Some(_)) | (_, None) => return None,
        (_, Some(value)) => value,
    };

    match constraint {
        Constraint::Pattern(pattern) => match patterns.compile(pattern) {
            Ok(regex) => {
                let rendered = render_value(value);
                if regex.is_match(&rendered) {
                    None
                } else {
                    violation(ConstraintKind::Pattern, rendered)
                }
            }
            Err(e) => Some(ConstraintViolation::new(
                path,
                ConstraintKind::Pattern,
                format!("valid pattern /{}/ ({})", pattern, e),
                render_value(value),
            )),
        },
        Constraint::Enum(allowed) => {
            if allowed.iter().any(|member| same_member(member, value)) {
                None
            } else {
                violation(ConstraintKind::Enum, render_value(value))
            }
        }
        Constraint::Type(expected) => {
            if expected.matches(value) {
                None
            } else {
                violation(ConstraintKind::Type, ValueType::of(value).to_string())
            }
        }
        Constraint::Range { min, max } => {
            let fallback_kind = if min.is_some() {
                ConstraintKind::Min
            } else {
                ConstraintKind::Max
            };
            let number = match value.as_f64() {
                Some(number) => number,
                None => return violation(fallback_kind, render_value(value)),
            };
            if min.is_some_and(|min| number < min) {
                violation(ConstraintKind::Min, render_value(value))
            } else if max.is_some_and(|max| number > max) {
                violation(ConstraintKind::Max, render_value(value))
            } else {
                None
            }
        }
        Constraint::Required => None,
    }
}
