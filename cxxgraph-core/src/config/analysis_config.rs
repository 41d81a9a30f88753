//! Extraction configuration.

use serde::{Deserialize, Serialize};

/// Settings handed to a `SourceExtractor` at construction. Immutable from
/// then on; every worker gets its own clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Run template, SFINAE and metafunction detection. Default: true.
    pub analyze_templates: Option<bool>,
    /// Collect virtual/override data for the class hierarchy. Default: true.
    pub track_virtual_methods: Option<bool>,
    /// Run the regex call pass after the structural pass. Default: true.
    pub textual_fallback: Option<bool>,
    /// Per-file parse budget in milliseconds. Default: 10_000.
    pub parse_timeout_ms: Option<u64>,
    /// Files larger than this are skipped. Default: 4 MiB.
    pub max_file_size: Option<u64>,
}

impl AnalysisConfig {
    pub fn effective_analyze_templates(&self) -> bool {
        self.analyze_templates.unwrap_or(true)
    }

    pub fn effective_track_virtual_methods(&self) -> bool {
        self.track_virtual_methods.unwrap_or(true)
    }

    pub fn effective_textual_fallback(&self) -> bool {
        self.textual_fallback.unwrap_or(true)
    }

    /// Returns the effective parse timeout, defaulting to 10 seconds.
    pub fn effective_parse_timeout_ms(&self) -> u64 {
        self.parse_timeout_ms.unwrap_or(10_000)
    }

    /// Returns the effective size limit, defaulting to 4 MiB.
    pub fn effective_max_file_size(&self) -> u64 {
        self.max_file_size.unwrap_or(4 * 1024 * 1024)
    }
}
