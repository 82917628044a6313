//! Manifest loading with environment expansion

use crate::error::{CliError, CliResult};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;
use std::path::Path;

lazy_static! {
    /// `${VAR}` or `${VAR:-default}`; names are upper-case identifiers.
    static ref ENV_REFERENCE: Regex =
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("valid env reference pattern");
}

/// Replace environment references using `lookup`.
///
/// An unset variable takes its default, or the empty string without one.
pub fn expand_with<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_REFERENCE
        .replace_all(text, |caps: &Captures<'_>| {
            lookup(&caps[1]).unwrap_or_else(|| {
                caps.get(2)
                    .map(|default| default.as_str().to_string())
                    .unwrap_or_default()
            })
        })
        .into_owned()
}

/// Replace environment references from the process environment.
pub fn expand_env(text: &str) -> String {
    expand_with(text, |name| std::env::var(name).ok())
}

/// Parse manifest text by extension; anything but `.json` is read as YAML.
pub fn parse(text: &str, path: &Path) -> CliResult<Value> {
    let expanded = expand_env(text);
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let parsed = if is_json {
        serde_json::from_str(&expanded).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&expanded).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| CliError::ManifestLoad {
        path: path.display().to_string(),
        message,
    })
}

/// Read and parse a manifest file.
pub fn load(path: &Path) -> CliResult<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| CliError::ManifestLoad {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let manifest = parse(&text, path)?;
    tracing::debug!(path = %path.display(), "loaded manifest");
    Ok(manifest)
}
