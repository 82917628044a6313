//! Property tests: detection never panics, scores stay bounded, verdicts stay consistent.

use ossa_conformance::{
    calculate_score, detect_features, get_by_path, ConformanceEngine, ConformanceProfile,
    ProfileDefinition,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

/// Arbitrary JSON documents a few levels deep.
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z]{0,6}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z0-9]{1,4}", inner, 0..5).prop_map(|entries| {
                Value::Object(entries.into_iter().collect::<Map<String, Value>>())
            }),
        ]
    })
}

/// Dot paths built from short segments, occasionally numeric or empty.
fn arb_path() -> impl Strategy<Value = String> {
    prop::collection::vec(prop_oneof!["[a-z0-9]{1,4}", "[0-3]", Just(String::new())], 1..5)
        .prop_map(|segments| segments.join("."))
}

fn profile_with(required: Vec<String>, optional: Vec<String>, split: f64) -> ConformanceProfile {
    let definition: ProfileDefinition = serde_json::from_value(json!({
        "id": "generated",
        "required": {"features": required, "weight": split},
        "optional": {"features": optional, "weight": 1.0 - split}
    }))
    .unwrap();
    ConformanceProfile::resolve(&[&definition]).unwrap()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn detection_is_total(
        document in arb_json(),
        paths in prop::collection::vec(arb_path(), 0..8),
    ) {
        let results = detect_features(&document, &paths);
        prop_assert_eq!(results.len(), paths.len());
        for (result, path) in results.iter().zip(paths.iter()) {
            prop_assert_eq!(&result.path, path);
            prop_assert_eq!(result.present, result.value.is_some());
            if let Some(value) = &result.value {
                prop_assert!(!value.is_null());
            }
        }
    }

    #[test]
    fn present_paths_resolve_to_detected_value(document in arb_json(), path in arb_path()) {
        let results = detect_features(&document, &[path.as_str()]);
        prop_assert_eq!(results[0].value.as_ref(), get_by_path(&document, &path));
    }

    #[test]
    fn score_is_bounded(
        document in arb_json(),
        required in prop::collection::vec(arb_path(), 0..6),
        optional in prop::collection::vec(arb_path(), 0..6),
        split in 0.0f64..=1.0,
    ) {
        let profile = profile_with(required, optional, split);
        let required = detect_features(&document, &profile.required_features);
        let optional = detect_features(&document, &profile.optional_features);
        let score = calculate_score(&required, &optional, &profile).score();
        prop_assert!(!score.is_nan());
        prop_assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn engine_verdict_is_consistent(document in arb_json()) {
        let engine = ConformanceEngine::builtin().unwrap();
        let store = engine.store();
        let profile = store.get_profile("baseline").unwrap();
        match engine.run_conformance_test(&document, "baseline", false) {
            Ok(result) => {
                prop_assert_eq!(
                    result.passed,
                    result.score >= profile.pass_threshold && result.violations.is_empty()
                );
                prop_assert!(!result.warned || result.passed);
            }
            Err(_) => prop_assert!(!document.is_object()),
        }
    }
}
