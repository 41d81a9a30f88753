//! Per-file include paths and compiler options.
//!
//! Locating and parsing a compilation database lives outside the engine;
//! the pipeline only asks a provider for the two lists it needs. Empty
//! lists are always valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Supplies include directories and compiler arguments per source file.
pub trait CompileCommandsProvider: Send + Sync {
    fn include_paths(&self, file: &Path) -> Vec<PathBuf>;
    fn compiler_options(&self, file: &Path) -> Vec<String>;
}

/// Provider with nothing to say about any file.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompileCommands;

impl CompileCommandsProvider for NoCompileCommands {
    fn include_paths(&self, _file: &Path) -> Vec<PathBuf> {
        Vec::new()
    }

    fn compiler_options(&self, _file: &Path) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Default)]
struct FileCommands {
    include_paths: Vec<PathBuf>,
    options: Vec<String>,
}

/// Fixed table of per-file entries with project-wide defaults for files
/// the table does not mention.
#[derive(Debug, Clone, Default)]
pub struct StaticCompileCommands {
    defaults: FileCommands,
    files: BTreeMap<PathBuf, FileCommands>,
}

impl StaticCompileCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.defaults.include_paths.push(dir.into());
        self
    }

    pub fn with_default_option(mut self, option: impl Into<String>) -> Self {
        self.defaults.options.push(option.into());
        self
    }

    /// Replaces the entry for `file`; defaults no longer apply to it.
    pub fn insert(&mut self, file: impl Into<PathBuf>, include_paths: Vec<PathBuf>, options: Vec<String>) {
        self.files.insert(
            file.into(),
            FileCommands {
                include_paths,
                options,
            },
        );
    }

    fn entry(&self, file: &Path) -> &FileCommands {
        self.files.get(file).unwrap_or(&self.defaults)
    }
}

impl CompileCommandsProvider for StaticCompileCommands {
    fn include_paths(&self, file: &Path) -> Vec<PathBuf> {
        self.entry(file).include_paths.clone()
    }

    fn compiler_options(&self, file: &Path) -> Vec<String> {
        self.entry(file).options.clone()
    }
}
