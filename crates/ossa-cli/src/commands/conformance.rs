//! Conformance commands

use super::Outcome;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::manifest;
use crate::output::{
    self, print_info, print_json, print_success, print_table, print_warning, status_label,
    status_text, OutputFormat,
};
use clap::Subcommand;
use colored::*;
use ossa_conformance::{
    categorize, ConformanceEngine, ConformanceError, ConformanceProfile, ConformanceReport,
    ConformanceResult, ManifestIdentity, ProfileSummary, ReportEntry, StructuralError,
};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tabled::Tabled;

/// Conformance subcommands
#[derive(Subcommand)]
pub enum ConformanceCommands {
    /// Test one manifest against a profile
    Run {
        /// Path to manifest file (YAML or JSON)
        manifest: PathBuf,

        /// Profile ID (defaults to the configured profile)
        #[arg(short, long)]
        profile: Option<String>,

        /// Fail before scoring when the manifest is structurally invalid
        #[arg(long)]
        strict: bool,

        /// Output format
        #[arg(short, long)]
        output: Option<OutputFormat>,
    },

    /// Test several manifests against a profile
    Batch {
        /// Paths to manifest files
        #[arg(required = true)]
        manifests: Vec<PathBuf>,

        /// Profile ID (defaults to the configured profile)
        #[arg(short, long)]
        profile: Option<String>,

        /// Concurrent evaluation workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Output format
        #[arg(short, long)]
        output: Option<OutputFormat>,
    },

    /// List available profiles
    List {
        /// Output format
        #[arg(short, long)]
        output: Option<OutputFormat>,
    },

    /// Show a resolved profile
    Profile {
        /// Profile ID
        id: String,

        /// Output format
        #[arg(short, long)]
        output: Option<OutputFormat>,
    },
}

/// Everything a conformance command needs
pub struct Context {
    pub engine: ConformanceEngine,
    pub config: CliConfig,
    pub verbose: bool,
}

/// Table row for profile listing
#[derive(Debug, Serialize, Tabled)]
struct ProfileRow {
    /// Profile ID
    id: String,
    /// Display name
    name: String,
    /// Parent profile
    extends: String,
    /// Description
    description: String,
}

impl From<ProfileSummary> for ProfileRow {
    fn from(summary: ProfileSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            extends: summary.extends.unwrap_or_else(|| "-".to_string()),
            description: summary.description,
        }
    }
}

/// Table row for one feature's detection status
#[derive(Debug, Tabled)]
struct FeatureRow {
    feature: String,
    group: &'static str,
    status: String,
}

/// Table row for a feature in a profile listing
#[derive(Debug, Tabled)]
struct ProfileFeatureRow {
    feature: String,
    group: &'static str,
    category: String,
}

/// Table row for a constraint violation
#[derive(Debug, Tabled)]
struct ViolationRow {
    path: String,
    kind: String,
    expected: String,
    actual: String,
}

/// Table row for a per-category tally
#[derive(Debug, Tabled)]
struct CategoryRow {
    category: String,
    present: usize,
    total: usize,
}

/// Table row for a profile constraint
#[derive(Debug, Tabled)]
struct ConstraintRow {
    path: String,
    constraint: String,
}

/// Table row for one manifest in a batch
#[derive(Debug, Tabled)]
struct BatchRow {
    manifest: String,
    status: String,
    score: String,
    missing: usize,
    violations: usize,
}

/// Execute a conformance command
pub async fn execute(command: ConformanceCommands, ctx: &Context) -> CliResult<Outcome> {
    match command {
        ConformanceCommands::Run {
            manifest,
            profile,
            strict,
            output,
        } => {
            let profile_id = ctx.config.profile(profile);
            let document = manifest::load(&manifest)?;
            let profile = ctx.engine.store().get_profile(&profile_id)?;
            let format = ctx.config.output(output);
            let result = match ctx.engine.run_conformance_test(&document, &profile_id, strict) {
                Err(ConformanceError::StructuralValidationFailed { errors }) => {
                    report_structural_errors(&errors, format)?;
                    return Err(ConformanceError::StructuralValidationFailed { errors }.into());
                }
                other => other?,
            };

            let entry = ReportEntry {
                manifest: ManifestIdentity::from_manifest(&document)
                    .with_source(manifest.display().to_string()),
                result,
            };
            match format {
                OutputFormat::Json => print_json(&entry)?,
                OutputFormat::Table => render_result(&entry, &profile, ctx.verbose),
            }
            Ok(outcome(entry.result.passed))
        }

        ConformanceCommands::Batch {
            manifests,
            profile,
            workers,
            output,
        } => {
            let profile_id = ctx.config.profile(profile);
            // Unknown profiles are a usage error, not a batch of failures.
            ctx.engine.store().get_profile(&profile_id)?;

            let workers = ctx.config.workers(workers);
            let report = run_batch(ctx, &manifests, &profile_id, workers).await;
            match ctx.config.output(output) {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Table => render_batch(&report, ctx.verbose),
            }
            Ok(outcome(report.is_conformant()))
        }

        ConformanceCommands::List { output } => {
            let rows: Vec<ProfileRow> = ctx
                .engine
                .store()
                .list_profiles()
                .into_iter()
                .map(ProfileRow::from)
                .collect();
            output::print_output(rows, ctx.config.output(output))?;
            Ok(Outcome::Success)
        }

        ConformanceCommands::Profile { id, output } => {
            let profile = ctx.engine.store().get_profile(&id)?;
            match ctx.config.output(output) {
                OutputFormat::Json => print_json(profile.as_ref())?,
                OutputFormat::Table => render_profile(&profile),
            }
            Ok(Outcome::Success)
        }
    }
}

fn outcome(passed: bool) -> Outcome {
    if passed {
        Outcome::Success
    } else {
        Outcome::NonConformant
    }
}

/// Surface strict-mode structural errors before the command fails.
fn report_structural_errors(errors: &[StructuralError], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "structural_errors": errors })),
        OutputFormat::Table => {
            for error in errors {
                print_warning(&error.to_string());
            }
            Ok(())
        }
    }
}

/// Load every manifest, evaluate the loadable ones concurrently, and keep
/// input order. Unloadable files become failed entries.
async fn run_batch(
    ctx: &Context,
    paths: &[PathBuf],
    profile_id: &str,
    workers: usize,
) -> ConformanceReport {
    let mut identities = Vec::with_capacity(paths.len());
    let mut loaded: Vec<Value> = Vec::new();
    let mut slots: Vec<Result<usize, CliError>> = Vec::with_capacity(paths.len());

    for path in paths {
        let source = path.display().to_string();
        match manifest::load(path) {
            Ok(document) => {
                identities.push(ManifestIdentity::from_manifest(&document).with_source(source));
                slots.push(Ok(loaded.len()));
                loaded.push(document);
            }
            Err(e) => {
                tracing::warn!(path = %source, error = %e, "skipping unloadable manifest");
                identities.push(ManifestIdentity::default().with_source(source));
                slots.push(Err(e));
            }
        }
    }

    let mut results: Vec<Option<ConformanceResult>> = ctx
        .engine
        .batch_test_concurrent(loaded, profile_id, workers)
        .await
        .into_iter()
        .map(Some)
        .collect();

    let entries = identities
        .into_iter()
        .zip(slots)
        .map(|(manifest, slot)| {
            let result = match slot {
                Ok(index) => results
                    .get_mut(index)
                    .and_then(Option::take)
                    .unwrap_or_else(|| {
                        ConformanceResult::evaluation_failure(profile_id, "missing batch result")
                    }),
                Err(e) => ConformanceResult::evaluation_failure(profile_id, e.to_string()),
            };
            ReportEntry { manifest, result }
        })
        .collect();

    ConformanceReport::new(profile_id, entries)
}

fn render_result(entry: &ReportEntry, profile: &ConformanceProfile, verbose: bool) {
    let result = &entry.result;
    println!(
        "{} {} against {} (score {:.2})",
        status_label(result.passed, result.warned),
        entry.manifest.label().bold(),
        result.profile_id,
        result.score
    );
    if let Some(breakdown) = &result.breakdown {
        println!(
            "  required {}/{}  optional {}/{}",
            breakdown.required_present,
            breakdown.required_total,
            breakdown.optional_present,
            breakdown.optional_total
        );
    }
    println!();

    let rows: Vec<FeatureRow> = feature_rows(result, profile)
        .into_iter()
        .filter(|row| verbose || row.status != "present")
        .collect();
    if rows.is_empty() {
        print_success("All profile features present");
    } else {
        print_table(rows);
    }

    if !result.violations.is_empty() {
        println!("\n{}", "Constraint violations".bold());
        print_table(
            result
                .violations
                .iter()
                .map(|v| ViolationRow {
                    path: v.path.clone(),
                    kind: v.kind.to_string(),
                    expected: v.expected.clone(),
                    actual: v.actual.clone(),
                })
                .collect::<Vec<_>>(),
        );
    }

    if !result.structural_errors.is_empty() {
        println!("\n{}", "Structural errors".bold());
        for error in &result.structural_errors {
            print_warning(&error.to_string());
        }
    }

    if verbose {
        println!("\n{}", "Categories".bold());
        print_table(
            result
                .categories
                .iter()
                .map(|(category, count)| CategoryRow {
                    category: category.to_string(),
                    present: count.present,
                    total: count.total,
                })
                .collect::<Vec<_>>(),
        );
    }

    if !result.recommendations.is_empty() {
        println!("\n{}", "Recommendations".bold());
        for recommendation in &result.recommendations {
            print_info(recommendation);
        }
    }
}

fn feature_rows(result: &ConformanceResult, profile: &ConformanceProfile) -> Vec<FeatureRow> {
    let status = |path: &String, missing: &[String]| {
        if missing.contains(path) {
            "missing".to_string()
        } else {
            "present".to_string()
        }
    };
    let required = profile.required_features.iter().map(|path| FeatureRow {
        feature: path.clone(),
        group: "required",
        status: status(path, &result.missing_required),
    });
    let optional = profile.optional_features.iter().map(|path| FeatureRow {
        feature: path.clone(),
        group: "optional",
        status: status(path, &result.missing_optional),
    });
    required.chain(optional).collect()
}

fn render_batch(report: &ConformanceReport, verbose: bool) {
    let rows: Vec<BatchRow> = report
        .entries
        .iter()
        .map(|entry| {
            let source = entry.manifest.source.clone();
            BatchRow {
                manifest: source.unwrap_or_else(|| entry.manifest.label()),
                status: status_text(entry.result.passed, entry.result.warned).to_string(),
                score: format!("{:.2}", entry.result.score),
                missing: entry.result.missing_required.len(),
                violations: entry.result.violations.len(),
            }
        })
        .collect();
    print_table(rows);

    if verbose {
        for entry in report.entries.iter().filter(|e| !e.result.passed) {
            println!("\n{}", entry.manifest.label().bold());
            for violation in &entry.result.violations {
                print_warning(&violation.to_string());
            }
            for recommendation in &entry.result.recommendations {
                print_info(recommendation);
            }
        }
    }

    let summary = &report.summary;
    println!(
        "\nTotal: {}  Passed: {}  Failed: {}  Warned: {}  Average score: {:.2}",
        summary.total, summary.passed, summary.failed, summary.warned, summary.average_score
    );
    if report.is_conformant() {
        print_success("All manifests conform");
    } else {
        output::print_error(&format!(
            "{} of {} manifests failed {}",
            summary.failed, summary.total, report.profile_id
        ));
    }
}

fn render_profile(profile: &ConformanceProfile) {
    println!("{} {}", profile.id.bold(), format!("v{}", profile.version).dimmed());
    println!("  Name:        {}", profile.name);
    if !profile.description.is_empty() {
        println!("  Description: {}", profile.description);
    }
    println!("  Lineage:     {}", profile.lineage.join(" -> "));
    println!(
        "  Weights:     required {:.2}  optional {:.2}",
        profile.required_weight, profile.optional_weight
    );
    println!(
        "  Thresholds:  pass {:.2}  warn {:.2}",
        profile.pass_threshold, profile.warn_threshold
    );
    println!();

    let features: Vec<ProfileFeatureRow> = profile
        .required_features
        .iter()
        .map(|path| (path, "required"))
        .chain(profile.optional_features.iter().map(|path| (path, "optional")))
        .map(|(path, group)| ProfileFeatureRow {
            feature: path.clone(),
            group,
            category: categorize(path).to_string(),
        })
        .collect();
    print_table(features);

    if !profile.constraints.is_empty() {
        println!("\n{}", "Constraints".bold());
        print_table(
            profile
                .constraints
                .iter()
                .map(|(path, constraint)| ConstraintRow {
                    path: path.clone(),
                    constraint: constraint.describe(),
                })
                .collect::<Vec<_>>(),
        );
    }
}
