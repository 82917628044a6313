//! Feature detection: which profile paths a manifest actually populates.

use crate::path::{get_by_path, has_prefix};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Coarse grouping of feature paths for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureCategory {
    Core,
    Capabilities,
    Configuration,
    Operational,
    Extensions,
}

impl fmt::Display for FeatureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureCategory::Core => write!(f, "core"),
            FeatureCategory::Capabilities => write!(f, "capabilities"),
            FeatureCategory::Configuration => write!(f, "configuration"),
            FeatureCategory::Operational => write!(f, "operational"),
            FeatureCategory::Extensions => write!(f, "extensions"),
        }
    }
}

/// Ordered prefix table; first match wins.
const CATEGORY_RULES: &[(&str, FeatureCategory)] = &[
    ("spec.capabilities", FeatureCategory::Capabilities),
    ("spec.tools", FeatureCategory::Capabilities),
    ("spec.skills", FeatureCategory::Capabilities),
    ("spec.llm", FeatureCategory::Configuration),
    ("spec.autonomy", FeatureCategory::Configuration),
    ("spec.constraints", FeatureCategory::Configuration),
    ("spec.configuration", FeatureCategory::Configuration),
    ("spec.runtime", FeatureCategory::Configuration),
    ("spec.observability", FeatureCategory::Operational),
    ("spec.monitoring", FeatureCategory::Operational),
    ("spec.security", FeatureCategory::Operational),
    ("spec.resilience", FeatureCategory::Operational),
    ("spec.health", FeatureCategory::Operational),
    ("spec.scaling", FeatureCategory::Operational),
    ("extensions", FeatureCategory::Extensions),
];

/// Category for a feature path, `Core` when no rule matches.
pub fn categorize(path: &str) -> FeatureCategory {
    CATEGORY_RULES
        .iter()
        .find(|(prefix, _)| has_prefix(path, prefix))
        .map(|(_, category)| *category)
        .unwrap_or(FeatureCategory::Core)
}

/// Outcome of probing one feature path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDetectionResult {
    pub path: String,
    pub present: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub category: FeatureCategory,
}

/// Present/total tally for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub present: usize,
    pub total: usize,
}

/// Look up each path in `paths`, preserving input order.
pub fn detect_features<S: AsRef<str>>(
    manifest: &Value,
    paths: &[S],
) -> Vec<FeatureDetectionResult> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let value = get_by_path(manifest, path).cloned();
            let result = FeatureDetectionResult {
                path: path.to_string(),
                present: value.is_some(),
                value,
                category: categorize(path),
            };
            tracing::trace!(path, present = result.present, "feature checked");
            result
        })
        .collect()
}

pub fn count_present(results: &[FeatureDetectionResult]) -> usize {
    results.iter().filter(|r| r.present).count()
}

pub fn get_missing(results: &[FeatureDetectionResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| !r.present)
        .map(|r| r.path.clone())
        .collect()
}

pub fn get_present(results: &[FeatureDetectionResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| r.present)
        .map(|r| r.path.clone())
        .collect()
}

/// Present/total counts keyed by category.
pub fn group_by_category(
    results: &[FeatureDetectionResult],
) -> BTreeMap<FeatureCategory, CategoryCount> {
    let mut groups: BTreeMap<FeatureCategory, CategoryCount> = BTreeMap::new();
    for result in results {
        let count = groups.entry(result.category).or_default();
        count.total += 1;
        if result.present {
            count.present += 1;
        }
    }
    groups
}
