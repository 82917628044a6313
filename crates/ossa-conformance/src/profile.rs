//! Conformance profile definitions and inheritance resolution.
//!
//! A [`ProfileDefinition`] is the raw document as authored: every weight and
//! threshold is optional and `extends` names at most one parent. Resolution
//! folds a definition chain (root first) into an immutable
//! [`ConformanceProfile`] where every value is filled in.

use crate::error::{ConformanceError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_REQUIRED_WEIGHT: f64 = 0.7;
pub const DEFAULT_OPTIONAL_WEIGHT: f64 = 0.3;
pub const DEFAULT_PASS_THRESHOLD: f64 = 0.7;
pub const DEFAULT_WARN_THRESHOLD: f64 = 0.85;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Feature list plus the share of the score it controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// Score cutoffs as declared in a definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringThresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_threshold: Option<f64>,
}

/// Raw profile document, before inheritance is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default)]
    pub required: FeatureSet,
    #[serde(default)]
    pub optional: FeatureSet,
    #[serde(default)]
    pub constraints: BTreeMap<String, Constraint>,
    #[serde(default)]
    pub scoring: ScoringThresholds,
}

impl ProfileDefinition {
    /// Parse a definition from JSON text.
    pub fn from_json(source_name: &str, text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ConformanceError::ProfileParse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }

    /// Parse a definition from YAML text.
    pub fn from_yaml(source_name: &str, text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| ConformanceError::ProfileParse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }
}

/// Primitive JSON type names accepted by a `type` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl ValueType {
    /// Type name of a JSON value as reported in violations.
    pub fn of(value: &Value) -> ValueType {
        match value {
            Value::String(_) => ValueType::String,
            Value::Number(_) => ValueType::Number,
            Value::Bool(_) => ValueType::Boolean,
            Value::Object(_) => ValueType::Object,
            Value::Array(_) => ValueType::Array,
            Value::Null => ValueType::Null,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ValueType::Integer => value.is_i64() || value.is_u64(),
            expected => *expected == ValueType::of(value),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Integer => "integer",
            ValueType::Boolean => "boolean",
            ValueType::Object => "object",
            ValueType::Array => "array",
            ValueType::Null => "null",
        };
        f.write_str(name)
    }
}

/// A rule a resolved feature value must satisfy.
///
/// Serialized as the authored object form, e.g. `{"pattern": "^ossa/"}` or
/// `{"min": 0, "max": 2}`. `min` and `max` may share one constraint; any other
/// combination of keys is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConstraint", into = "RawConstraint")]
pub enum Constraint {
    Pattern(String),
    Enum(Vec<Value>),
    Type(ValueType),
    Range { min: Option<f64>, max: Option<f64> },
    Required,
}

impl Constraint {
    /// Human-readable statement of what the constraint expects.
    pub fn describe(&self) -> String {
        match self {
            Constraint::Pattern(pattern) => format!("value matching /{}/", pattern),
            Constraint::Enum(allowed) => {
                let rendered: Vec<String> = allowed.iter().map(Value::to_string).collect();
                format!("one of [{}]", rendered.join(", "))
            }
            Constraint::Type(value_type) => format!("value of type {}", value_type),
            Constraint::Range {
                min: Some(min),
                max: Some(max),
            } => format!("number between {} and {}", min, max),
            Constraint::Range { min: Some(min), .. } => format!("number >= {}", min),
            Constraint::Range { max: Some(max), .. } => format!("number <= {}", max),
            Constraint::Range { .. } => "number".to_string(),
            Constraint::Required => "a non-null value".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    allowed: Option<Vec<Value>>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    required: Option<bool>,
}

impl TryFrom<RawConstraint> for Constraint {
    type Error = String;

    fn try_from(raw: RawConstraint) -> std::result::Result<Self, Self::Error> {
        let mut kinds = Vec::new();
        if let Some(pattern) = raw.pattern {
            kinds.push(Constraint::Pattern(pattern));
        }
        if let Some(allowed) = raw.allowed {
            kinds.push(Constraint::Enum(allowed));
        }
        if let Some(value_type) = raw.value_type {
            kinds.push(Constraint::Type(value_type));
        }
        if raw.min.is_some() || raw.max.is_some() {
            kinds.push(Constraint::Range {
                min: raw.min,
                max: raw.max,
            });
        }
        if raw.required == Some(true) {
            kinds.push(Constraint::Required);
        }

        match kinds.len() {
            1 => Ok(kinds.remove(0)),
            0 => Err("constraint declares no rule".to_string()),
            n => Err(format!("constraint declares {} rules, expected one", n)),
        }
    }
}

impl From<Constraint> for RawConstraint {
    fn from(constraint: Constraint) -> Self {
        let mut raw = RawConstraint::default();
        match constraint {
            Constraint::Pattern(pattern) => raw.pattern = Some(pattern),
            Constraint::Enum(allowed) => raw.allowed = Some(allowed),
            Constraint::Type(value_type) => raw.value_type = Some(value_type),
            Constraint::Range { min, max } => {
                raw.min = min;
                raw.max = max;
            }
            Constraint::Required => raw.required = Some(true),
        }
        raw
    }
}

/// Fully materialized profile: inheritance applied, every value set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformanceProfile {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub extends: Option<String>,
    /// This profile's id followed by each ancestor up to the root.
    pub lineage: Vec<String>,
    pub required_features: Vec<String>,
    pub required_weight: f64,
    pub optional_features: Vec<String>,
    pub optional_weight: f64,
    pub constraints: BTreeMap<String, Constraint>,
    pub pass_threshold: f64,
    pub warn_threshold: f64,
}

impl ConformanceProfile {
    /// Merge a definition chain given root first, child last.
    ///
    /// Callers guarantee the chain is non-empty and acyclic.
    pub fn resolve(chain: &[&ProfileDefinition]) -> Result<Self> {
        let leaf = match chain.last() {
            Some(leaf) => *leaf,
            None => {
                return Err(ConformanceError::InvalidProfile {
                    id: String::new(),
                    reason: "empty inheritance chain".to_string(),
                })
            }
        };

        let mut required: Vec<String> = Vec::new();
        let mut optional: Vec<String> = Vec::new();
        let mut constraints = BTreeMap::new();
        let mut required_weight = None;
        let mut optional_weight = None;
        let mut pass_threshold = None;
        let mut warn_threshold = None;
        let mut version = None;

        for definition in chain {
            for path in &definition.required.features {
                optional.retain(|p| p != path);
                push_unique(&mut required, path);
            }
            for path in &definition.optional.features {
                required.retain(|p| p != path);
                push_unique(&mut optional, path);
            }
            for (path, constraint) in &definition.constraints {
                constraints.insert(path.clone(), constraint.clone());
            }

            required_weight = definition.required.weight.or(required_weight);
            optional_weight = definition.optional.weight.or(optional_weight);
            pass_threshold = definition.scoring.pass_threshold.or(pass_threshold);
            warn_threshold = definition.scoring.warn_threshold.or(warn_threshold);
            version = definition.version.clone().or(version);
        }

        let profile = ConformanceProfile {
            id: leaf.id.clone(),
            name: leaf.name.clone().unwrap_or_else(|| leaf.id.clone()),
            version: version.unwrap_or_else(|| "0.0.0".to_string()),
            description: leaf.description.clone().unwrap_or_default(),
            extends: leaf.extends.clone(),
            lineage: chain.iter().rev().map(|d| d.id.clone()).collect(),
            required_features: required,
            required_weight: required_weight.unwrap_or(DEFAULT_REQUIRED_WEIGHT),
            optional_features: optional,
            optional_weight: optional_weight.unwrap_or(DEFAULT_OPTIONAL_WEIGHT),
            constraints,
            pass_threshold: pass_threshold.unwrap_or(DEFAULT_PASS_THRESHOLD),
            warn_threshold: warn_threshold.unwrap_or(DEFAULT_WARN_THRESHOLD),
        };
        profile.check()?;
        Ok(profile)
    }

    fn check(&self) -> Result<()> {
        let bounded = [
            ("required weight", self.required_weight),
            ("optional weight", self.optional_weight),
            ("pass threshold", self.pass_threshold),
            ("warn threshold", self.warn_threshold),
        ];
        for (label, value) in bounded {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConformanceError::InvalidProfile {
                    id: self.id.clone(),
                    reason: format!("{} {} is outside [0, 1]", label, value),
                });
            }
        }

        if self.pass_threshold > self.warn_threshold {
            return Err(ConformanceError::InvalidProfile {
                id: self.id.clone(),
                reason: format!(
                    "pass threshold {} exceeds warn threshold {}",
                    self.pass_threshold, self.warn_threshold
                ),
            });
        }

        let weight_sum = self.required_weight + self.optional_weight;
        if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            tracing::warn!(
                profile = %self.id,
                weight_sum,
                "required and optional weights do not sum to 1.0"
            );
        }

        Ok(())
    }

    /// Required followed by optional paths, the set detection runs over.
    pub fn all_features(&self) -> Vec<String> {
        self.required_features
            .iter()
            .chain(self.optional_features.iter())
            .cloned()
            .collect()
    }

    /// Whether `id` is this profile or one of its ancestors.
    pub fn inherits_from(&self, id: &str) -> bool {
        self.lineage.iter().any(|ancestor| ancestor == id)
    }
}

fn push_unique(list: &mut Vec<String>, path: &str) {
    if !list.iter().any(|p| p == path) {
        list.push(path.to_string());
    }
}
