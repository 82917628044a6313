//! Weighted scoring, pass/warn verdicts and remediation guidance.

use crate::constraints::ConstraintViolation;
use crate::detector::{count_present, FeatureDetectionResult};
use crate::path::has_prefix;
use crate::profile::ConformanceProfile;
use crate::report::ConformanceResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const OPTIONAL_FEATURES_ADVICE: &str =
    "Consider adding optional features to improve robustness.";

/// Score split into its two weighted terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub required_present: usize,
    pub required_total: usize,
    pub optional_present: usize,
    pub optional_total: usize,
    pub required_term: f64,
    pub optional_term: f64,
}

impl ScoreBreakdown {
    pub fn score(&self) -> f64 {
        (self.required_term + self.optional_term).clamp(0.0, 1.0)
    }
}

/// Fraction of a feature list present; an empty list counts as satisfied.
fn coverage(present: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        present as f64 / total as f64
    }
}

/// Weight both detection halves by the profile's required/optional split.
pub fn calculate_score(
    required: &[FeatureDetectionResult],
    optional: &[FeatureDetectionResult],
    profile: &ConformanceProfile,
) -> ScoreBreakdown {
    let required_present = count_present(required);
    let optional_present = count_present(optional);

    ScoreBreakdown {
        required_present,
        required_total: required.len(),
        optional_present,
        optional_total: optional.len(),
        required_term: coverage(required_present, required.len()) * profile.required_weight,
        optional_term: coverage(optional_present, optional.len()) * profile.optional_weight,
    }
}

/// Pass/warn verdict. Constraint violations always fail the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub warned: bool,
}

pub fn determine_verdict(
    score: f64,
    violations: &[ConstraintViolation],
    profile: &ConformanceProfile,
) -> Verdict {
    let passed = score >= profile.pass_threshold && violations.is_empty();
    Verdict {
        passed,
        warned: passed && score < profile.warn_threshold,
    }
}

/// Profile-specific advice: fires when any missing path falls under `prefix`.
struct GuidanceRule {
    prefix: &'static str,
    message: &'static str,
}

const ENTERPRISE_GUIDANCE: &[GuidanceRule] = &[
    GuidanceRule {
        prefix: "spec.security",
        message: "Enterprise agents must declare a security posture (authentication, secrets handling, audit) under `spec.security`.",
    },
    GuidanceRule {
        prefix: "spec.resilience",
        message: "Define retry, timeout and circuit-breaker policies under `spec.resilience` so production failures degrade predictably.",
    },
    GuidanceRule {
        prefix: "spec.observability",
        message: "Enable tracing and metrics under `spec.observability`; enterprise operators need them to audit agent behaviour.",
    },
    GuidanceRule {
        prefix: "spec.llm",
        message: "Pin the model provider and model under `spec.llm` so enterprise deployments are reproducible.",
    },
];

const GITLAB_KAGENT_GUIDANCE: &[GuidanceRule] = &[
    GuidanceRule {
        prefix: "extensions.kagent",
        message: "Add `extensions.kagent.kubernetes` (namespace, service account) so kagent can schedule the agent on the cluster.",
    },
    GuidanceRule {
        prefix: "extensions.gitlab",
        message: "Link the agent to its GitLab project under `extensions.gitlab` to enable CI-driven deployment.",
    },
    GuidanceRule {
        prefix: "spec.observability",
        message: "Export traces from kagent-hosted agents via `spec.observability` so GitLab environments surface runtime health.",
    },
];

/// Extra guidance keyed by profile id; consulted for the profile and each ancestor.
const PROFILE_GUIDANCE: &[(&str, &[GuidanceRule])] = &[
    ("enterprise", ENTERPRISE_GUIDANCE),
    ("gitlab-kagent", GITLAB_KAGENT_GUIDANCE),
];

fn guidance_for(id: &str) -> &'static [GuidanceRule] {
    PROFILE_GUIDANCE
        .iter()
        .find(|(profile_id, _)| *profile_id == id)
        .map(|(_, rules)| *rules)
        .unwrap_or(&[])
}

/// Ordered, de-duplicated advice for a scored result.
///
/// Advisory only: never feeds back into score or verdict.
pub fn generate_recommendations(
    result: &ConformanceResult,
    profile: &ConformanceProfile,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    for path in &result.missing_required {
        recommendations.push(format!("Add required feature `{}`.", path));
    }

    for violation in &result.violations {
        recommendations.push(format!(
            "Fix `{}`: expected {}, found {}.",
            violation.path, violation.expected, violation.actual
        ));
    }

    if result.score >= profile.pass_threshold && result.score < profile.warn_threshold {
        recommendations.push(OPTIONAL_FEATURES_ADVICE.to_string());
    }

    let missing: Vec<&String> = result
        .missing_required
        .iter()
        .chain(result.missing_optional.iter())
        .collect();
    for id in &profile.lineage {
        for rule in guidance_for(id) {
            if missing.iter().any(|path| has_prefix(path, rule.prefix)) {
                recommendations.push(rule.message.to_string());
            }
        }
    }

    let mut seen = HashSet::new();
    recommendations.retain(|r| seen.insert(r.clone()));
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintKind;
    use crate::detector::detect_features;
    use crate::profile::ProfileDefinition;
    use serde_json::json;

    fn profile(value: serde_json::Value) -> ConformanceProfile {
        let definition: ProfileDefinition = serde_json::from_value(value).unwrap();
        ConformanceProfile::resolve(&[&definition]).unwrap()
    }

    fn result_with(
        score: f64,
        missing_required: Vec<&str>,
        missing_optional: Vec<&str>,
    ) -> ConformanceResult {
        ConformanceResult {
            score,
            missing_required: missing_required.into_iter().map(String::from).collect(),
            missing_optional: missing_optional.into_iter().map(String::from).collect(),
            ..ConformanceResult::empty("test")
        }
    }

    #[test]
    fn empty_feature_lists_contribute_full_weight() {
        let profile = profile(json!({
            "id": "empty",
            "required": {"features": [], "weight": 0.6},
            "optional": {"features": [], "weight": 0.4}
        }));
        let breakdown = calculate_score(&[], &[], &profile);
        assert_eq!(breakdown.required_term, 0.6);
        assert_eq!(breakdown.optional_term, 0.4);
        assert!(!breakdown.score().is_nan());
    }

    #[test]
    fn score_weights_each_half() {
        let profile = profile(json!({
            "id": "half",
            "required": {"features": ["a", "b"], "weight": 0.8},
            "optional": {"features": ["c", "d"], "weight": 0.2}
        }));
        let manifest = json!({"a": 1, "c": 1, "d": 1});
        let required = detect_features(&manifest, &profile.required_features);
        let optional = detect_features(&manifest, &profile.optional_features);
        let breakdown = calculate_score(&required, &optional, &profile);

        assert_eq!(breakdown.required_present, 1);
        assert_eq!(breakdown.optional_present, 2);
        assert!((breakdown.score() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn violations_dominate_score() {
        let profile = profile(json!({"id": "gate"}));
        let violation =
            ConstraintViolation::new("apiVersion", ConstraintKind::Pattern, "x", "y");
        let verdict = determine_verdict(1.0, &[violation], &profile);
        assert!(!verdict.passed);
        assert!(!verdict.warned);
    }

    #[test]
    fn warned_only_when_passed() {
        let profile = profile(json!({
            "id": "warn",
            "scoring": {"pass_threshold": 0.5, "warn_threshold": 0.8}
        }));
        assert_eq!(
            determine_verdict(0.6, &[], &profile),
            Verdict { passed: true, warned: true }
        );
        assert_eq!(
            determine_verdict(0.4, &[], &profile),
            Verdict { passed: false, warned: false }
        );
        assert_eq!(
            determine_verdict(0.8, &[], &profile),
            Verdict { passed: true, warned: false }
        );
    }

    #[test]
    fn recommendations_start_with_missing_required() {
        let profile = profile(json!({"id": "plain"}));
        let result = result_with(0.75, vec!["spec.role", "kind"], vec![]);
        let recommendations = generate_recommendations(&result, &profile);

        assert_eq!(recommendations[0], "Add required feature `spec.role`.");
        assert_eq!(recommendations[1], "Add required feature `kind`.");
        assert_eq!(recommendations[2], OPTIONAL_FEATURES_ADVICE);
    }

    #[test]
    fn optional_advice_only_between_thresholds() {
        let profile = profile(json!({"id": "plain"}));
        let failing = generate_recommendations(&result_with(0.5, vec![], vec![]), &profile);
        let strong = generate_recommendations(&result_with(0.95, vec![], vec![]), &profile);
        assert!(failing.is_empty());
        assert!(strong.is_empty());
    }

    #[test]
    fn guidance_follows_lineage() {
        let mut profile = profile(json!({"id": "regulated"}));
        profile.lineage = vec!["regulated".into(), "enterprise".into(), "baseline".into()];
        let result = result_with(0.9, vec![], vec!["spec.security.audit", "spec.resilience"]);
        let recommendations = generate_recommendations(&result, &profile);

        assert_eq!(recommendations.len(), 2);
        assert!(recommendations[0].contains("spec.security"));
        assert!(recommendations[1].contains("spec.resilience"));
    }

    #[test]
    fn unrelated_profiles_get_no_guidance() {
        let profile = profile(json!({"id": "baseline"}));
        let result = result_with(0.9, vec![], vec!["spec.security"]);
        assert!(generate_recommendations(&result, &profile).is_empty());
    }
}
