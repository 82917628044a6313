use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const PASSING: &str = r#"
apiVersion: ossa/v0.3.3
kind: Agent
metadata:
  name: ${AGENT_NAME:-release-notes}
  version: 2.1.0
spec:
  role: Draft release notes from merged changes
"#;

const MISSING_ROLE: &str = r#"
apiVersion: ossa/v0.3.3
kind: Agent
metadata:
  name: release-notes
  version: 2.1.0
spec: {}
"#;

const BAD_API_VERSION: &str = r#"{
  "apiVersion": "v1",
  "kind": "Agent",
  "metadata": {"name": "legacy", "version": "0.1.0"},
  "spec": {"role": "Legacy agent"}
}"#;

fn workspace() -> TempDir {
    TempDir::new().unwrap()
}

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// `ossa` isolated from any user configuration.
fn ossa(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ossa").unwrap();
    cmd.env_remove("OSSA_PROFILES_DIR")
        .env_remove("RUST_LOG")
        .env("OSSA_CONFIG", dir.path().join("absent-config.toml"));
    cmd
}

fn stdout_json(cmd: &mut Command) -> Value {
    let out = cmd.output().unwrap();
    serde_json::from_slice(&out.stdout).unwrap()
}

#[test]
fn help_mentions_conformance_subcommands() {
    let dir = workspace();
    let out = ossa(&dir)
        .args(["conformance", "--help"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let s = String::from_utf8(out).unwrap();
    for needle in ["run", "batch", "list", "profile"] {
        assert!(s.contains(needle), "help missing `{needle}`");
    }
}

#[test]
fn list_shows_builtin_profiles() {
    let dir = workspace();
    let listed = stdout_json(ossa(&dir).args(["conformance", "list", "--output", "json"]));
    let ids: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["baseline", "enterprise", "gitlab-kagent"]);
}

#[test]
fn passing_manifest_exits_zero() {
    let dir = workspace();
    let manifest = write(&dir, "agent.yaml", PASSING);
    ossa(&dir)
        .args(["conformance", "run"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("release-notes@2.1.0"));
}

#[test]
fn run_json_output_carries_result_and_identity() {
    let dir = workspace();
    let manifest = write(&dir, "agent.yaml", PASSING);
    let entry = stdout_json(
        ossa(&dir)
            .env("AGENT_NAME", "triage")
            .args(["conformance", "run", "--profile", "baseline", "--output", "json"])
            .arg(&manifest),
    );

    assert_eq!(entry["manifest"]["name"], "triage");
    assert_eq!(entry["result"]["passed"], true);
    assert_eq!(entry["result"]["warned"], true);
    assert!((entry["result"]["score"].as_f64().unwrap() - 0.7).abs() < 1e-9);
}

#[test]
fn failing_manifest_exits_one() {
    let dir = workspace();
    let manifest = write(&dir, "agent.yml", MISSING_ROLE);
    ossa(&dir)
        .args(["conformance", "run"])
        .arg(&manifest)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("spec.role"));
}

#[test]
fn unknown_profile_exits_two() {
    let dir = workspace();
    let manifest = write(&dir, "agent.yaml", PASSING);
    ossa(&dir)
        .args(["conformance", "run", "--profile", "nonexistent"])
        .arg(&manifest)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("conformance profile not found: nonexistent"));
}

#[test]
fn strict_mode_rejects_structural_errors() {
    let dir = workspace();
    let manifest = write(&dir, "legacy.json", BAD_API_VERSION);

    ossa(&dir)
        .args(["conformance", "run", "--strict"])
        .arg(&manifest)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("structural validation failed"));

    // Without --strict the pattern constraint still fails the manifest.
    ossa(&dir)
        .args(["conformance", "run"])
        .arg(&manifest)
        .assert()
        .code(1);
}

#[test]
fn strict_mode_prints_structural_errors() {
    let dir = workspace();
    let manifest = write(&dir, "legacy.json", BAD_API_VERSION);

    let out = ossa(&dir)
        .args(["conformance", "run", "--strict", "--output", "json"])
        .arg(&manifest)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let reported: Value = serde_json::from_slice(&out.stdout).unwrap();
    let errors = reported["structural_errors"].as_array().unwrap();
    assert_eq!(errors[0]["path"], "apiVersion");
    assert!(errors[0]["message"].as_str().unwrap().contains("v1"));

    ossa(&dir)
        .args(["conformance", "run", "--strict"])
        .arg(&manifest)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("apiVersion: invalid apiVersion format: v1"));
}

#[test]
fn batch_reports_every_manifest() {
    let dir = workspace();
    let good = write(&dir, "good.yaml", PASSING);
    let bad = write(&dir, "bad.yaml", MISSING_ROLE);
    let missing = dir.path().join("missing.yaml");

    let mut cmd = ossa(&dir);
    cmd.args(["conformance", "batch", "--workers", "2", "--output", "json"])
        .arg(&good)
        .arg(&bad)
        .arg(&missing);
    let out = cmd.output().unwrap();
    assert_eq!(out.status.code(), Some(1));

    let report: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["summary"]["total"], 3);
    assert_eq!(report["summary"]["passed"], 1);
    let entries = report["entries"].as_array().unwrap();
    assert_eq!(entries[0]["result"]["passed"], true);
    assert_eq!(entries[1]["result"]["missing_required"][0], "spec.role");
    assert_eq!(entries[2]["result"]["violations"][0]["kind"], "evaluation");
}

#[test]
fn batch_of_passing_manifests_exits_zero() {
    let dir = workspace();
    let first = write(&dir, "first.yaml", PASSING);
    let second = write(&dir, "second.yaml", PASSING);
    ossa(&dir)
        .args(["conformance", "batch"])
        .arg(&first)
        .arg(&second)
        .assert()
        .success()
        .stdout(predicate::str::contains("Passed: 2"));
}

#[test]
fn profile_shows_resolved_lineage() {
    let dir = workspace();
    let profile =
        stdout_json(ossa(&dir).args(["conformance", "profile", "enterprise", "-o", "json"]));
    assert_eq!(profile["lineage"][0], "enterprise");
    assert_eq!(profile["lineage"][1], "baseline");
    assert_eq!(profile["pass_threshold"], 0.7);
}

#[test]
fn profiles_dir_adds_custom_profile() {
    let dir = workspace();
    let profiles = dir.path().join("profiles");
    fs::create_dir(&profiles).unwrap();
    fs::write(
        profiles.join("minimal.yaml"),
        "id: minimal\nrequired:\n  features: [kind]\n",
    )
    .unwrap();
    let manifest = write(&dir, "task.yaml", "kind: Task\n");

    ossa(&dir)
        .arg("--profiles-dir")
        .arg(&profiles)
        .args(["conformance", "run", "--profile", "minimal"])
        .arg(&manifest)
        .assert()
        .success();
}

#[test]
fn config_file_sets_default_profile() {
    let dir = workspace();
    let config = write(&dir, "config.toml", "default_profile = \"enterprise\"\n");
    let manifest = write(&dir, "agent.yaml", PASSING);

    let entry = stdout_json(
        ossa(&dir)
            .arg("--config")
            .arg(&config)
            .args(["conformance", "run", "--output", "json"])
            .arg(&manifest),
    );
    assert_eq!(entry["result"]["profile_id"], "enterprise");
}
