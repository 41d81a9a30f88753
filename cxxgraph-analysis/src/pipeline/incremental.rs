//! Incremental re-analysis: per-file results are cached by content hash
//! and only new or changed files are extracted again. The global passes
//! always rerun over the full re-folded graph.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use cxxgraph_core::config::CxxgraphConfig;
use cxxgraph_core::errors::{ParseError, PipelineError, PipelineResult};
use cxxgraph_core::traits::CancellationToken;
use tracing::{debug, info, warn};

use super::batch::{AnalysisOutput, AnalysisPipeline, FileAnalysis, FileOutcome};
use super::compile_commands::CompileCommandsProvider;
use crate::scanner::hash_file;

/// Classification of a file against the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Unchanged,
}

/// Which files an update touched, each list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

impl UpdateSummary {
    /// Files that went through extraction in this update.
    pub fn reanalyzed(&self) -> usize {
        self.added.len() + self.modified.len()
    }

    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct IncrementalUpdate {
    pub summary: UpdateSummary,
    pub output: AnalysisOutput,
}

#[derive(Debug, Clone)]
struct CachedFile {
    content_hash: u64,
    analysis: FileAnalysis,
}

/// Keeps per-file extraction results between runs.
#[derive(Debug, Default)]
pub struct IncrementalAnalyzer {
    pipeline: AnalysisPipeline,
    cache: BTreeMap<PathBuf, CachedFile>,
}

impl IncrementalAnalyzer {
    pub fn new(config: CxxgraphConfig) -> Self {
        Self {
            pipeline: AnalysisPipeline::new(config),
            cache: BTreeMap::new(),
        }
    }

    /// Number of files with a cached result.
    pub fn cached_files(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, path: &std::path::Path) -> bool {
        self.cache.contains_key(path)
    }

    /// Brings the cache in line with `files` and returns the re-resolved
    /// graph. Cached files absent from `files` are dropped.
    pub fn update(
        &mut self,
        files: &[PathBuf],
        provider: &dyn CompileCommandsProvider,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult<IncrementalUpdate>, PipelineError> {
        self.pipeline.check_frontend()?;
        let mut result = PipelineResult::new(IncrementalUpdate::default());
        let mut summary = UpdateSummary::default();

        let wanted: BTreeSet<&PathBuf> = files
            .iter()
            .filter(|path| self.pipeline.config().scan.accepts(path))
            .collect();

        let mut pending: Vec<(PathBuf, FileStatus, u64)> = Vec::new();
        for path in &wanted {
            let content_hash = match hash_file(path) {
                Ok(hash) => hash,
                Err(e) => {
                    self.cache.remove(*path);
                    result.add_error(
                        ParseError::FileUnreadable {
                            path: (*path).clone(),
                            message: e.to_string(),
                        }
                        .into(),
                    );
                    continue;
                }
            };
            let status = classify(self.cache.get(*path), content_hash);
            match status {
                FileStatus::Unchanged => summary.unchanged.push((*path).clone()),
                _ => pending.push(((*path).clone(), status, content_hash)),
            }
        }

        let removed: Vec<PathBuf> = self
            .cache
            .keys()
            .filter(|path| !wanted.contains(path))
            .cloned()
            .collect();
        for path in &removed {
            self.cache.remove(path);
        }
        summary.removed = removed;

        let paths: Vec<PathBuf> = pending.iter().map(|(path, _, _)| path.clone()).collect();
        let outcomes = self.pipeline.extract_files(&paths, provider, cancel)?;
        let mut cancelled = 0usize;
        let mut failed = 0usize;
        for ((path, status, content_hash), outcome) in pending.into_iter().zip(outcomes) {
            match outcome {
                FileOutcome::Analyzed(analysis) => {
                    self.cache.insert(
                        path.clone(),
                        CachedFile {
                            content_hash,
                            analysis,
                        },
                    );
                    match status {
                        FileStatus::Added => summary.added.push(path),
                        _ => summary.modified.push(path),
                    }
                }
                FileOutcome::Failed(error) => {
                    failed += 1;
                    self.cache.remove(&path);
                    result.add_error(error.into());
                }
                // The previous result, if any, stays until the next update.
                FileOutcome::Cancelled => cancelled += 1,
            }
        }
        if cancelled > 0 {
            warn!(cancelled, "update cancelled; stale results kept");
            result.add_error(PipelineError::Cancelled);
        }

        summary.added.sort();
        summary.modified.sort();
        summary.unchanged.sort();
        debug!(
            added = summary.added.len(),
            modified = summary.modified.len(),
            removed = summary.removed.len(),
            unchanged = summary.unchanged.len(),
            "incremental diff"
        );

        let mut output = self
            .pipeline
            .assemble(self.cache.values().map(|cached| cached.analysis.clone()));
        output.stats.files_analyzed = self.cache.len();
        output.stats.files_partial = self
            .cache
            .values()
            .filter(|cached| cached.analysis.error_nodes > 0)
            .count();
        output.stats.files_failed = failed;
        output.stats.files_skipped = cancelled;
        output.stats.functions = output.graph.len();
        output.stats.missing = output.graph.missing_functions().len();
        output.stats.resolved = output.resolution.resolved();
        info!(
            reanalyzed = summary.reanalyzed(),
            removed = summary.removed.len(),
            functions = output.stats.functions,
            missing = output.stats.missing,
            "incremental update complete"
        );

        result.data = IncrementalUpdate { summary, output };
        Ok(result)
    }
}

fn classify(cached: Option<&CachedFile>, content_hash: u64) -> FileStatus {
    match cached {
        None => FileStatus::Added,
        Some(cached) if cached.content_hash == content_hash => FileStatus::Unchanged,
        Some(_) => FileStatus::Modified,
    }
}
