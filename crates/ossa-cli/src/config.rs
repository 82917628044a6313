//! CLI configuration

use crate::error::{CliError, CliResult};
use crate::output::OutputFormat;
use ossa_conformance::DEFAULT_BATCH_WORKERS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Profile used when neither the command line nor the config names one.
pub const DEFAULT_PROFILE: &str = "baseline";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    /// Default conformance profile
    pub default_profile: Option<String>,

    /// Directory of extra profile definitions, layered over the builtins
    pub profiles_dir: Option<PathBuf>,

    /// Default output format
    pub output: Option<OutputFormat>,

    /// Worker count for batch runs
    pub workers: Option<usize>,
}

impl CliConfig {
    /// Load configuration from file
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is an error.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_config_path() {
                Some(p) => p,
                None => return Ok(CliConfig::default()),
            },
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: CliConfig = toml::from_str(&contents)
                .map_err(|e| CliError::Config(format!("{}: {}", config_path.display(), e)))?;
            tracing::debug!(path = %config_path.display(), "loaded configuration");
            Ok(config)
        } else {
            Ok(CliConfig::default())
        }
    }

    /// Get the default configuration file path
    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ossa").join("config.toml"))
    }

    pub fn profile(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    pub fn output(&self, flag: Option<OutputFormat>) -> OutputFormat {
        flag.or(self.output).unwrap_or_default()
    }

    pub fn workers(&self, flag: Option<usize>) -> usize {
        flag.or(self.workers).unwrap_or(DEFAULT_BATCH_WORKERS)
    }
}
