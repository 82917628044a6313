//! Conformance orchestration: one entry point over store, detector and scorer.

use crate::constraints::{validate_constraints, PatternCache};
use crate::detector::{detect_features, get_missing, get_present, group_by_category};
use crate::error::{ConformanceError, Result};
use crate::report::{
    ConformanceReport, ConformanceResult, ManifestIdentity, ReportEntry, SummaryStatistics,
};
use crate::scoring::{calculate_score, determine_verdict, generate_recommendations};
use crate::store::ProfileStore;
use crate::validation::{ManifestShapeValidator, StructuralValidator};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default worker count for concurrent batches.
pub const DEFAULT_BATCH_WORKERS: usize = 4;

/// Runs manifests against conformance profiles.
///
/// Cheap to clone; clones share the profile store and pattern cache.
#[derive(Clone)]
pub struct ConformanceEngine {
    store: Arc<ProfileStore>,
    validator: Arc<dyn StructuralValidator>,
    patterns: Arc<PatternCache>,
}

impl ConformanceEngine {
    pub fn new(store: Arc<ProfileStore>, validator: Arc<dyn StructuralValidator>) -> Self {
        Self {
            store,
            validator,
            patterns: Arc::new(PatternCache::new()),
        }
    }

    /// Engine over the builtin profiles with envelope validation.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(
            Arc::new(ProfileStore::builtin()?),
            Arc::new(ManifestShapeValidator),
        ))
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Test one manifest against `profile_id`.
    ///
    /// With `strict`, any structural error aborts before scoring. Without it,
    /// structural errors are carried on the result and do not affect the verdict.
    pub fn run_conformance_test(
        &self,
        manifest: &Value,
        profile_id: &str,
        strict: bool,
    ) -> Result<ConformanceResult> {
        let profile = self.store.get_profile(profile_id)?;

        if !manifest.is_object() {
            return Err(ConformanceError::MalformedManifest(format!(
                "expected an object at the document root, found {}",
                crate::profile::ValueType::of(manifest)
            )));
        }

        let structural = self.validator.validate(manifest);
        if strict && (!structural.valid || !structural.errors.is_empty()) {
            tracing::info!(
                profile = %profile.id,
                errors = structural.errors.len(),
                "structural validation failed in strict mode"
            );
            return Err(ConformanceError::StructuralValidationFailed {
                errors: structural.errors,
            });
        }

        let required = detect_features(manifest, &profile.required_features);
        let optional = detect_features(manifest, &profile.optional_features);
        let violations = validate_constraints(manifest, &profile, &self.patterns);
        let breakdown = calculate_score(&required, &optional, &profile);
        let score = breakdown.score();
        let verdict = determine_verdict(score, &violations, &profile);

        let all: Vec<_> = required.iter().chain(optional.iter()).cloned().collect();
        let mut result = ConformanceResult {
            profile_id: profile.id.clone(),
            score,
            passed: verdict.passed,
            warned: verdict.warned,
            violations,
            missing_required: get_missing(&required),
            missing_optional: get_missing(&optional),
            present_features: get_present(&all),
            categories: group_by_category(&all),
            structural_errors: structural.errors,
            breakdown: Some(breakdown),
            recommendations: Vec::new(),
        };
        result.recommendations = generate_recommendations(&result, &profile);

        tracing::info!(
            profile = %profile.id,
            score = result.score,
            passed = result.passed,
            warned = result.warned,
            violations = result.violations.len(),
            "conformance test complete"
        );

        Ok(result)
    }

    /// Single-manifest report with identity and timestamp.
    pub fn generate_report(&self, manifest: &Value, profile_id: &str) -> Result<ConformanceReport> {
        let result = self.run_conformance_test(manifest, profile_id, false)?;
        Ok(ConformanceReport::new(
            profile_id,
            vec![ReportEntry {
                manifest: ManifestIdentity::from_manifest(manifest),
                result,
            }],
        ))
    }

    /// Non-strict run that never fails: errors become failed entries.
    fn test_or_failure(&self, manifest: &Value, profile_id: &str) -> ConformanceResult {
        match self.run_conformance_test(manifest, profile_id, false) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(profile = %profile_id, error = %e, "batch entry failed");
                ConformanceResult::evaluation_failure(profile_id, e.to_string())
            }
        }
    }

    /// Test every manifest in order; one bad manifest never aborts the batch.
    pub fn batch_test(&self, manifests: &[Value], profile_id: &str) -> Vec<ConformanceResult> {
        tracing::info!(profile = %profile_id, count = manifests.len(), "starting batch");
        manifests
            .iter()
            .map(|manifest| self.test_or_failure(manifest, profile_id))
            .collect()
    }

    /// [`batch_test`](Self::batch_test) on a bounded pool of blocking workers.
    ///
    /// Results come back in input order. A worker that panics yields a
    /// failed entry for its manifest. `max_workers` is clamped to
    /// `1..=Semaphore::MAX_PERMITS`.
    pub async fn batch_test_concurrent(
        &self,
        manifests: Vec<Value>,
        profile_id: &str,
        max_workers: usize,
    ) -> Vec<ConformanceResult> {
        let total = manifests.len();
        tracing::info!(
            profile = %profile_id,
            count = total,
            workers = max_workers,
            "starting concurrent batch"
        );

        let permits = Arc::new(Semaphore::new(max_workers.clamp(1, Semaphore::MAX_PERMITS)));
        let mut tasks = JoinSet::new();
        for (index, manifest) in manifests.into_iter().enumerate() {
            let engine = self.clone();
            let profile_id = profile_id.to_string();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => tokio::task::spawn_blocking(move || {
                        engine.test_or_failure(&manifest, &profile_id)
                    })
                    .await
                    .ok(),
                    Err(_) => None,
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<ConformanceResult>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, Some(result))) = joined {
                slots[index] = Some(result);
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    ConformanceResult::evaluation_failure(profile_id, "evaluation worker aborted")
                })
            })
            .collect()
    }

    /// Batch results wrapped with identities and a summary.
    pub fn generate_batch_report(
        &self,
        manifests: &[Value],
        profile_id: &str,
    ) -> ConformanceReport {
        let entries = manifests
            .iter()
            .zip(self.batch_test(manifests, profile_id))
            .map(|(manifest, result)| ReportEntry {
                manifest: ManifestIdentity::from_manifest(manifest),
                result,
            })
            .collect();
        ConformanceReport::new(profile_id, entries)
    }

    pub fn get_summary_statistics(results: &[ConformanceResult]) -> SummaryStatistics {
        SummaryStatistics::from_results(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintKind;
    use crate::store::StaticProfiles;
    use crate::validation::{NoopValidator, ValidationResult};
    use serde_json::json;

    fn engine() -> ConformanceEngine {
        ConformanceEngine::builtin().unwrap()
    }

    fn complete_baseline() -> Value {
        json!({
            "apiVersion": "ossa/v0.3.3",
            "kind": "Agent",
            "metadata": {
                "name": "triage-agent",
                "version": "1.0.0",
                "description": "Routes issues",
                "labels": {"team": "support"}
            },
            "spec": {
                "role": "Triage incoming issues",
                "llm": {"provider": "anthropic", "model": "claude"},
                "tools": [{"type": "mcp", "name": "search"}],
                "autonomy": {"level": "supervised"}
            }
        })
    }

    #[test]
    fn complete_manifest_passes_baseline_cleanly() {
        let result = engine()
            .run_conformance_test(&complete_baseline(), "baseline", true)
            .unwrap();
        assert!((result.score - 1.0).abs() < 1e-12);
        assert!(result.passed);
        assert!(!result.warned);
        assert!(result.recommendations.is_empty());
        assert_eq!(result.present_features.len(), 10);
    }

    #[test]
    fn unknown_profile_propagates() {
        let err = engine()
            .run_conformance_test(&complete_baseline(), "platinum", false)
            .unwrap_err();
        assert!(matches!(err, ConformanceError::ProfileNotFound(_)));
    }

    #[test]
    fn strict_mode_fails_fast_on_structure() {
        let mut manifest = complete_baseline();
        manifest["kind"] = json!("Robot");

        let err = engine()
            .run_conformance_test(&manifest, "baseline", true)
            .unwrap_err();
        match err {
            ConformanceError::StructuralValidationFailed { errors } => {
                assert_eq!(errors[0].path, "kind");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lenient_mode_carries_structural_errors() {
        let mut manifest = complete_baseline();
        manifest["kind"] = json!("Robot");

        let result = engine()
            .run_conformance_test(&manifest, "baseline", false)
            .unwrap();
        assert_eq!(result.structural_errors.len(), 1);
        // The kind enum constraint still gates the verdict.
        assert!(!result.passed);
        assert_eq!(result.violations[0].kind, ConstraintKind::Enum);
    }

    #[test]
    fn non_object_manifest_is_malformed() {
        let err = engine()
            .run_conformance_test(&json!(["not", "a", "manifest"]), "baseline", false)
            .unwrap_err();
        assert!(matches!(err, ConformanceError::MalformedManifest(_)));
    }

    #[test]
    fn batch_converts_errors_to_failed_entries() {
        let manifests = vec![complete_baseline(), json!(17), complete_baseline()];
        let results = engine().batch_test(&manifests, "baseline");

        assert_eq!(results.len(), 3);
        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert!(results[1].is_evaluation_failure());
        assert!(results[2].passed);
    }

    #[test]
    fn batch_with_unknown_profile_still_returns_entries() {
        let results = engine().batch_test(&[complete_baseline()], "platinum");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_evaluation_failure());
    }

    #[test]
    fn batch_report_summarizes() {
        let manifests = vec![complete_baseline(), json!({"kind": "Agent"})];
        let report = engine().generate_batch_report(&manifests, "baseline");
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.entries[0].manifest.name.as_deref(), Some("triage-agent"));
        assert!(!report.is_conformant());
    }

    #[test]
    fn custom_store_and_validator_are_used() {
        let definitions = StaticProfiles::new(vec![serde_json::from_value(json!({
            "id": "tiny",
            "required": {"features": ["name"], "weight": 1.0},
            "optional": {"features": [], "weight": 0.0},
            "scoring": {"pass_threshold": 1.0, "warn_threshold": 1.0}
        }))
        .unwrap()]);
        let engine = ConformanceEngine::new(
            Arc::new(ProfileStore::new(definitions)),
            Arc::new(NoopValidator),
        );

        let result = engine
            .run_conformance_test(&json!({"name": "x"}), "tiny", true)
            .unwrap();
        assert!(result.passed);
        assert_eq!(result.score, 1.0);
    }

    #[tokio::test]
    async fn concurrent_batch_preserves_order() {
        let manifests = vec![
            json!("broken"),
            complete_baseline(),
            json!({"kind": "Agent"}),
            complete_baseline(),
        ];
        let engine = engine();
        let sequential = engine.batch_test(&manifests, "baseline");
        let concurrent = engine
            .batch_test_concurrent(manifests, "baseline", 2)
            .await;

        assert_eq!(concurrent.len(), 4);
        for (a, b) in sequential.iter().zip(concurrent.iter()) {
            assert_eq!(a.passed, b.passed);
            assert_eq!(a.score, b.score);
            assert_eq!(a.violations, b.violations);
        }
    }

    struct InvalidWithoutDetails;

    impl StructuralValidator for InvalidWithoutDetails {
        fn validate(&self, _manifest: &Value) -> ValidationResult {
            ValidationResult {
                valid: false,
                errors: vec![],
            }
        }
    }

    #[test]
    fn strict_mode_honours_invalid_flag_without_errors() {
        let engine = ConformanceEngine::new(
            Arc::new(ProfileStore::builtin().unwrap()),
            Arc::new(InvalidWithoutDetails),
        );

        let err = engine
            .run_conformance_test(&complete_baseline(), "baseline", true)
            .unwrap_err();
        assert!(matches!(
            err,
            ConformanceError::StructuralValidationFailed { .. }
        ));
        assert!(engine
            .run_conformance_test(&complete_baseline(), "baseline", false)
            .is_ok());
    }

    #[tokio::test]
    async fn concurrent_batch_clamps_oversized_worker_count() {
        let results = engine()
            .batch_test_concurrent(vec![json!({"kind": "Agent"})], "baseline", usize::MAX)
            .await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_evaluation_failure());
    }

    #[tokio::test]
    async fn concurrent_batch_of_nothing_is_empty() {
        let results = engine().batch_test_concurrent(vec![], "baseline", 0).await;
        assert!(results.is_empty());
    }
}
