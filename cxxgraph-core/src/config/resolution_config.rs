//! Cross-file and override resolution configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// How aggressively missing call targets are repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    /// No repair; the merged graph is returned as is.
    Basic,
    /// Exact and base-name matching with a namespace tie-break.
    #[default]
    Enhanced,
    /// Enhanced plus evidence-scored disambiguation.
    Full,
}

impl ResolutionMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Enhanced => "enhanced",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResolutionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "enhanced" => Ok(Self::Enhanced),
            "full" => Ok(Self::Full),
            other => Err(ConfigError::InvalidValue {
                field: "resolution.mode".to_string(),
                message: format!("unknown mode '{other}' (expected basic, enhanced or full)"),
            }),
        }
    }
}

/// Compatibility check used when deciding that a derived method overrides
/// a base virtual method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverrideStrictness {
    /// Same name and parameter count.
    #[default]
    Arity,
    /// Same name, parameter type list and const-ness.
    Signature,
}

impl FromStr for OverrideStrictness {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arity" => Ok(Self::Arity),
            "signature" => Ok(Self::Signature),
            other => Err(ConfigError::InvalidValue {
                field: "resolution.override_strictness".to_string(),
                message: format!("unknown strictness '{other}' (expected arity or signature)"),
            }),
        }
    }
}

/// Configuration for the resolution passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Default: enhanced.
    pub mode: Option<ResolutionMode>,
    /// A scored candidate is accepted only above this value. Default: 2.0.
    pub acceptance_threshold: Option<f64>,
    /// Default: arity.
    pub override_strictness: Option<OverrideStrictness>,
    /// Leave a name unresolved when two candidates tie, both for the
    /// namespace hint and for the top score. Default: false, the smallest
    /// name wins.
    pub reject_ties: Option<bool>,
}

impl ResolutionConfig {
    pub fn effective_mode(&self) -> ResolutionMode {
        self.mode.unwrap_or_default()
    }

    /// Returns the effective acceptance threshold, defaulting to 2.0.
    pub fn effective_acceptance_threshold(&self) -> f64 {
        self.acceptance_threshold.unwrap_or(2.0)
    }

    pub fn effective_override_strictness(&self) -> OverrideStrictness {
        self.override_strictness.unwrap_or_default()
    }

    pub fn effective_reject_ties(&self) -> bool {
        self.reject_ties.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("FULL".parse::<ResolutionMode>().unwrap(), ResolutionMode::Full);
        assert_eq!(" basic ".parse::<ResolutionMode>().unwrap(), ResolutionMode::Basic);
        assert!("fuzzy".parse::<ResolutionMode>().is_err());
    }

    #[test]
    fn defaults_match_reference_heuristic() {
        let config = ResolutionConfig::default();
        assert_eq!(config.effective_mode(), ResolutionMode::Enhanced);
        assert_eq!(config.effective_acceptance_threshold(), 2.0);
        assert_eq!(config.effective_override_strictness(), OverrideStrictness::Arity);
        assert!(!config.effective_reject_ties());
    }
}
