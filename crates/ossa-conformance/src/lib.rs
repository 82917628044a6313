//! # ossa-conformance
//!
//! Profile-driven conformance testing for OSSA agent manifests.
//!
//! A conformance profile names the feature paths a manifest must (required)
//! and should (optional) populate, the weight each group carries, value
//! constraints, and the score thresholds for passing and warning. Profiles
//! may extend one parent; the chain is merged root-first into an immutable,
//! cached [`ConformanceProfile`].
//!
//! ## Pipeline
//!
//! - **Profile Store** ([`ProfileStore`]) resolves `extends` chains and caches
//!   the result until [`ProfileStore::clear_cache`].
//! - **Feature Detector** ([`detect_features`]) walks dot-separated paths over
//!   any JSON document and never fails: anything it cannot reach is absent.
//! - **Score Calculator** ([`calculate_score`], [`validate_constraints`],
//!   [`generate_recommendations`]) weights presence, gates on constraint
//!   violations, and explains what to fix.
//! - **Orchestrator** ([`ConformanceEngine`]) ties these together with a
//!   [`StructuralValidator`] and runs single manifests or batches.
//!
//! ## Scoring
//!
//! ```text
//! score = (required_present / required_total) * required_weight
//!       + (optional_present / optional_total) * optional_weight
//! ```
//!
//! An empty feature group contributes its full weight. A manifest passes when
//! `score >= pass_threshold` and no constraint is violated; it is warned when
//! it passes with `score < warn_threshold`.
//!
//! ## Example
//!
//! ```rust
//! use ossa_conformance::ConformanceEngine;
//! use serde_json::json;
//!
//! let engine = ConformanceEngine::builtin().unwrap();
//! let manifest = json!({
//!     "apiVersion": "ossa/v0.3.3",
//!     "kind": "Agent",
//!     "metadata": {"name": "triage", "version": "1.0.0"},
//!     "spec": {"role": "Route incoming issues"}
//! });
//!
//! let result = engine.run_conformance_test(&manifest, "baseline", false).unwrap();
//! assert!(result.passed);
//! ```

pub mod constraints;
pub mod detector;
pub mod engine;
pub mod error;
pub mod path;
pub mod profile;
pub mod report;
pub mod scoring;
pub mod store;
pub mod validation;

pub use constraints::{validate_constraints, ConstraintKind, ConstraintViolation, PatternCache};
pub use detector::{
    categorize, count_present, detect_features, get_missing, get_present, group_by_category,
    CategoryCount, FeatureCategory, FeatureDetectionResult,
};
pub use engine::{ConformanceEngine, DEFAULT_BATCH_WORKERS};
pub use error::{ConformanceError, Result};
pub use path::get_by_path;
pub use profile::{
    ConformanceProfile, Constraint, FeatureSet, ProfileDefinition, ScoringThresholds, ValueType,
};
pub use report::{
    ConformanceReport, ConformanceResult, ManifestIdentity, ReportEntry, SummaryStatistics,
};
pub use scoring::{
    calculate_score, determine_verdict, generate_recommendations, ScoreBreakdown, Verdict,
};
pub use store::{
    global_store, BuiltinProfiles, DirectoryProfiles, LayeredProfiles, ProfileSource,
    ProfileStore, ProfileSummary, StaticProfiles,
};
pub use validation::{
    ManifestShapeValidator, NoopValidator, StructuralError, StructuralValidator, ValidationResult,
};
