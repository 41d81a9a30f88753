//! Source discovery and worker pool configuration.

use serde::{Deserialize, Serialize};

/// Extensions treated as C/C++ sources when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["c", "cpp", "cxx", "cc", "h", "hpp", "hxx", "hh"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker threads for per-file extraction. Default: 4.
    pub workers: Option<usize>,
    /// File extensions (without dot) to analyze.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Follow symbolic links while walking. Default: false.
    pub follow_symlinks: Option<bool>,
    /// Additional gitignore-style patterns to skip.
    #[serde(default)]
    pub extra_ignore: Vec<String>,
}

impl ScanConfig {
    /// Returns the effective worker count, defaulting to 4.
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or(4)
    }

    pub fn effective_extensions(&self) -> Vec<String> {
        if self.extensions.is_empty() {
            DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
        } else {
            self.extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect()
        }
    }

    pub fn effective_follow_symlinks(&self) -> bool {
        self.follow_symlinks.unwrap_or(false)
    }

    /// Whether `path` carries one of the effective extensions.
    pub fn accepts(&self, path: &std::path::Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.effective_extensions().iter().any(|e| *e == ext)
    }
}
