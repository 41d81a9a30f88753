//! Top-level cxxgraph configuration with layered resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{AnalysisConfig, OverrideStrictness, ResolutionConfig, ResolutionMode, ScanConfig};
use crate::errors::ConfigError;

/// Project config file name looked up in the analysis root.
pub const PROJECT_CONFIG_FILE: &str = "cxxgraph.toml";

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. Explicit overrides (applied via `apply_overrides`)
/// 2. Environment variables (`CXXGRAPH_*`)
/// 3. Project config (`cxxgraph.toml` in the project root)
/// 4. User config (`~/.cxxgraph/config.toml`)
/// 5. Compiled defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CxxgraphConfig {
    pub analysis: AnalysisConfig,
    pub resolution: ResolutionConfig,
    pub scan: ScanConfig,
}

/// Programmatic overrides, typically filled from command line flags.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub workers: Option<usize>,
    pub mode: Option<ResolutionMode>,
    pub acceptance_threshold: Option<f64>,
    pub parse_timeout_ms: Option<u64>,
}

impl CxxgraphConfig {
    /// Load configuration with layered resolution rooted at `root`.
    pub fn load(root: &Path, overrides: Option<&ConfigOverrides>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(e @ ConfigError::ParseError { .. }) => return Err(e),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unreadable user config");
                    }
                }
            }
        }

        let project_config_path = root.join(PROJECT_CONFIG_FILE);
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        Self::apply_env_overrides(&mut config)?;

        if let Some(overrides) = overrides {
            Self::apply_overrides(&mut config, overrides);
        }

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate the configuration values.
    pub fn validate(config: &CxxgraphConfig) -> Result<(), ConfigError> {
        if let Some(threshold) = config.resolution.acceptance_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(ConfigError::ValidationFailed {
                    field: "resolution.acceptance_threshold".to_string(),
                    message: "must be a finite, non-negative number".to_string(),
                });
            }
        }
        if config.scan.workers == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "scan.workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if config.analysis.parse_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "analysis.parse_timeout_ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.analysis.max_file_size == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "analysis.max_file_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.scan.extensions.iter().any(|e| e.trim_start_matches('.').is_empty()) {
            return Err(ConfigError::ValidationFailed {
                field: "scan.extensions".to_string(),
                message: "extensions must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the user config path: `~/.cxxgraph/config.toml`.
    fn user_config_path() -> Option<PathBuf> {
        home_dir().map(|h| h.join(".cxxgraph").join("config.toml"))
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are silently ignored.
    fn merge_toml_file(config: &mut CxxgraphConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: CxxgraphConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`; `other` wins only where it has a value.
    fn merge(base: &mut CxxgraphConfig, other: &CxxgraphConfig) {
        // Analysis
        if other.analysis.analyze_templates.is_some() {
            base.analysis.analyze_templates = other.analysis.analyze_templates;
        }
        if other.analysis.track_virtual_methods.is_some() {
            base.analysis.track_virtual_methods = other.analysis.track_virtual_methods;
        }
        if other.analysis.textual_fallback.is_some() {
            base.analysis.textual_fallback = other.analysis.textual_fallback;
        }
        if other.analysis.parse_timeout_ms.is_some() {
            base.analysis.parse_timeout_ms = other.analysis.parse_timeout_ms;
        }
        if other.analysis.max_file_size.is_some() {
            base.analysis.max_file_size = other.analysis.max_file_size;
        }

        // Resolution
        if other.resolution.mode.is_some() {
            base.resolution.mode = other.resolution.mode;
        }
        if other.resolution.acceptance_threshold.is_some() {
            base.resolution.acceptance_threshold = other.resolution.acceptance_threshold;
        }
        if other.resolution.override_strictness.is_some() {
            base.resolution.override_strictness = other.resolution.override_strictness;
        }
        if other.resolution.reject_ties.is_some() {
            base.resolution.reject_ties = other.resolution.reject_ties;
        }

        // Scan
        if other.scan.workers.is_some() {
            base.scan.workers = other.scan.workers;
        }
        if !other.scan.extensions.is_empty() {
            base.scan.extensions = other.scan.extensions.clone();
        }
        if other.scan.follow_symlinks.is_some() {
            base.scan.follow_symlinks = other.scan.follow_symlinks;
        }
        if !other.scan.extra_ignore.is_empty() {
            base.scan.extra_ignore = other.scan.extra_ignore.clone();
        }
    }

    /// Apply environment variable overrides.
    /// Pattern: `CXXGRAPH_SCAN_WORKERS`, `CXXGRAPH_RESOLUTION_MODE`, etc.
    fn apply_env_overrides(config: &mut CxxgraphConfig) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("CXXGRAPH_SCAN_WORKERS") {
            if let Ok(v) = val.parse::<usize>() {
                config.scan.workers = Some(v);
            }
        }
        if let Ok(val) = std::env::var("CXXGRAPH_PARSE_TIMEOUT_MS") {
            if let Ok(v) = val.parse::<u64>() {
                config.analysis.parse_timeout_ms = Some(v);
            }
        }
        if let Ok(val) = std::env::var("CXXGRAPH_RESOLUTION_MODE") {
            config.resolution.mode = Some(val.parse::<ResolutionMode>()?);
        }
        if let Ok(val) = std::env::var("CXXGRAPH_ACCEPTANCE_THRESHOLD") {
            if let Ok(v) = val.parse::<f64>() {
                config.resolution.acceptance_threshold = Some(v);
            }
        }
        if let Ok(val) = std::env::var("CXXGRAPH_OVERRIDE_STRICTNESS") {
            config.resolution.override_strictness = Some(val.parse::<OverrideStrictness>()?);
        }
        if let Ok(val) = std::env::var("CXXGRAPH_TEXTUAL_FALLBACK") {
            if let Ok(v) = val.parse::<bool>() {
                config.analysis.textual_fallback = Some(v);
            }
        }
        Ok(())
    }

    /// Apply explicit overrides (highest priority).
    pub fn apply_overrides(config: &mut CxxgraphConfig, overrides: &ConfigOverrides) {
        if let Some(v) = overrides.workers {
            config.scan.workers = Some(v);
        }
        if let Some(v) = overrides.mode {
            config.resolution.mode = Some(v);
        }
        if let Some(v) = overrides.acceptance_threshold {
            config.resolution.acceptance_threshold = Some(v);
        }
        if let Some(v) = overrides.parse_timeout_ms {
            config.analysis.parse_timeout_ms = Some(v);
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

/// Cross-platform home directory resolution.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
