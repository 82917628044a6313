//! Conformance results and reports

use crate::constraints::{ConstraintKind, ConstraintViolation};
use crate::detector::{CategoryCount, FeatureCategory};
use crate::path::get_by_path;
use crate::scoring::ScoreBreakdown;
use crate::validation::StructuralError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of testing one manifest against one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformanceResult {
    pub profile_id: String,
    pub score: f64,
    pub passed: bool,
    pub warned: bool,
    pub violations: Vec<ConstraintViolation>,
    pub missing_required: Vec<String>,
    pub missing_optional: Vec<String>,
    pub present_features: Vec<String>,
    pub categories: BTreeMap<FeatureCategory, CategoryCount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structural_errors: Vec<StructuralError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
    pub recommendations: Vec<String>,
}

impl ConformanceResult {
    /// A zero-score, failed result with nothing detected.
    pub fn empty(profile_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            score: 0.0,
            passed: false,
            warned: false,
            violations: Vec::new(),
            missing_required: Vec::new(),
            missing_optional: Vec::new(),
            present_features: Vec::new(),
            categories: BTreeMap::new(),
            structural_errors: Vec::new(),
            breakdown: None,
            recommendations: Vec::new(),
        }
    }

    /// Failed entry standing in for a manifest that could not be evaluated.
    pub fn evaluation_failure(profile_id: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut result = Self::empty(profile_id);
        result.violations.push(ConstraintViolation::new(
            "root",
            ConstraintKind::Evaluation,
            "an evaluable manifest",
            message.clone(),
        ));
        result
            .recommendations
            .push(format!("Fix the manifest so it can be evaluated: {}", message));
        result
    }

    /// Whether this entry was synthesized from an evaluation error.
    pub fn is_evaluation_failure(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.kind == ConstraintKind::Evaluation)
    }
}

/// Aggregate over a list of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warned: usize,
    pub average_score: f64,
}

impl SummaryStatistics {
    pub fn from_results(results: &[ConformanceResult]) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let warned = results.iter().filter(|r| r.warned).count();
        let average_score = if total == 0 {
            0.0
        } else {
            results.iter().map(|r| r.score).sum::<f64>() / total as f64
        };

        Self {
            total,
            passed,
            failed: total - passed,
            warned,
            average_score,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Who a result is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ManifestIdentity {
    /// Pull identity fields from a manifest, tolerating any shape.
    pub fn from_manifest(manifest: &Value) -> Self {
        let text = |path: &str| {
            get_by_path(manifest, path)
                .and_then(Value::as_str)
                .map(String::from)
        };
        Self {
            source: None,
            api_version: text("apiVersion"),
            kind: text("kind"),
            name: text("metadata.name"),
            version: text("metadata.version"),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Short label: `name@version`, falling back to the source or `<unnamed>`.
    pub fn label(&self) -> String {
        match (&self.name, &self.version, &self.source) {
            (Some(name), Some(version), _) => format!("{}@{}", name, version),
            (Some(name), None, _) => name.clone(),
            (None, _, Some(source)) => source.clone(),
            (None, _, None) => "<unnamed>".to_string(),
        }
    }
}

/// One manifest's identity and its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub manifest: ManifestIdentity,
    pub result: ConformanceResult,
}

/// Timestamped results for one or more manifests against one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformanceReport {
    pub profile_id: String,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<ReportEntry>,
    pub summary: SummaryStatistics,
}

impl ConformanceReport {
    pub fn new(profile_id: impl Into<String>, entries: Vec<ReportEntry>) -> Self {
        let results: Vec<ConformanceResult> = entries.iter().map(|e| e.result.clone()).collect();
        Self {
            profile_id: profile_id.into(),
            generated_at: Utc::now(),
            summary: SummaryStatistics::from_results(&results),
            entries,
        }
    }

    pub fn is_conformant(&self) -> bool {
        !self.entries.is_empty() && self.summary.all_passed()
    }

    /// Generate a text report
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str("OSSA Conformance Report\n");
        output.push_str("=======================\n");
        output.push_str(&format!("Profile:   {}\n", self.profile_id));
        output.push_str(&format!(
            "Generated: {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        for entry in &self.entries {
            let result = &entry.result;
            let status = match (result.passed, result.warned) {
                (true, false) => "PASS",
                (true, true) => "PASS (warn)",
                (false, _) => "FAIL",
            };

            output.push('\n');
            output.push_str(&format!(
                "{} {:<40} score {:.2}\n",
                status,
                entry.manifest.label(),
                result.score
            ));

            for path in &result.missing_required {
                output.push_str(&format!("    missing required: {}\n", path));
            }
            for path in &result.missing_optional {
                output.push_str(&format!("    missing optional: {}\n", path));
            }
            for violation in &result.violations {
                output.push_str(&format!("    violation: {}\n", violation));
            }
            for error in &result.structural_errors {
                output.push_str(&format!("    structural: {}\n", error));
            }
            for recommendation in &result.recommendations {
                output.push_str(&format!("    -> {}\n", recommendation));
            }
        }

        output.push('\n');
        output.push_str(&format!(
            "Total: {}  Passed: {}  Failed: {}  Warned: {}  Average score: {:.2}\n",
            self.summary.total,
            self.summary.passed,
            self.summary.failed,
            self.summary.warned,
            self.summary.average_score
        ));
        output.push_str(if self.is_conformant() {
            "Result: CONFORMANT\n"
        } else {
            "Result: NON-CONFORMANT\n"
        });

        output
    }

    /// Generate JSON report
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
