//! Batch analysis: parallel per-file extraction, sequential fold, then the
//! global hierarchy and resolution passes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use cxxgraph_core::config::CxxgraphConfig;
use cxxgraph_core::errors::{ParseError, PipelineError, PipelineResult};
use cxxgraph_core::traits::{Cancellable, CancellationToken};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::compile_commands::CompileCommandsProvider;
use crate::call_graph::CallGraph;
use crate::extraction::{IncludeRef, SourceExtractor};
use crate::hierarchy::{collector, ClassHierarchy, ClassHierarchyResolver};
use crate::resolution::{CrossFileResolver, ResolutionStats};
use crate::scanner::discover_sources;

/// Everything extracted from one source file, before any global pass.
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub graph: CallGraph,
    pub hierarchy: ClassHierarchy,
    pub includes: Vec<IncludeRef>,
    /// Syntax error nodes in the parse; non-zero means a partial result.
    pub error_nodes: usize,
}

/// Aggregate counters reported by a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub files_analyzed: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    /// Analyzed files whose parse contained error nodes.
    pub files_partial: usize,
    pub functions: usize,
    pub missing: usize,
    pub resolved: usize,
    pub duration_ms: u64,
}

/// The finished graph and hierarchy of a batch.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutput {
    pub graph: CallGraph,
    pub hierarchy: ClassHierarchy,
    pub includes: BTreeMap<PathBuf, Vec<IncludeRef>>,
    pub stats: BatchStats,
    pub resolution: ResolutionStats,
}

pub(crate) enum FileOutcome {
    Analyzed(FileAnalysis),
    Failed(ParseError),
    Cancelled,
}

/// Runs extraction over a set of files and the global passes over the
/// merged result.
#[derive(Debug, Clone, Default)]
pub struct AnalysisPipeline {
    config: CxxgraphConfig,
}

impl AnalysisPipeline {
    pub fn new(config: CxxgraphConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CxxgraphConfig {
        &self.config
    }

    /// Discovers sources under `root` and runs the batch over them.
    pub fn analyze_directory(
        &self,
        root: &Path,
        provider: &dyn CompileCommandsProvider,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult<AnalysisOutput>, PipelineError> {
        let files = discover_sources(root, &self.config.scan)?;
        info!(root = %root.display(), files = files.len(), "starting batch analysis");
        self.run(&files, provider, cancel)
    }

    /// Analyzes `files` and returns the resolved graph.
    ///
    /// Per-file failures (unreadable, too large, timed out, unsupported
    /// extension) are collected as non-fatal errors. Only a front-end that
    /// cannot be initialized, or a worker pool that cannot be built,
    /// aborts the run. After cancellation no new file is started; files
    /// already extracted still go through the global passes.
    pub fn run(
        &self,
        files: &[PathBuf],
        provider: &dyn CompileCommandsProvider,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult<AnalysisOutput>, PipelineError> {
        let start = Instant::now();
        self.check_frontend()?;

        let mut result = PipelineResult::new(AnalysisOutput::default());
        let mut stats = BatchStats::default();

        let (accepted, rejected): (Vec<&PathBuf>, Vec<&PathBuf>) =
            files.iter().partition(|path| self.config.scan.accepts(path));
        for path in rejected {
            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            debug!(file = %path.display(), "unsupported extension");
            stats.files_skipped += 1;
            result.add_error(ParseError::UnsupportedExtension { extension }.into());
        }

        let accepted: Vec<PathBuf> = accepted.into_iter().cloned().collect();
        let mut analyses = Vec::with_capacity(accepted.len());
        let mut cancelled = 0usize;
        for outcome in self.extract_files(&accepted, provider, cancel)? {
            match outcome {
                FileOutcome::Analyzed(analysis) => {
                    stats.files_analyzed += 1;
                    if analysis.error_nodes > 0 {
                        stats.files_partial += 1;
                        result.add_error(
                            ParseError::PartialParse {
                                path: analysis.path.clone(),
                                error_nodes: analysis.error_nodes,
                            }
                            .into(),
                        );
                    }
                    analyses.push(analysis);
                }
                FileOutcome::Failed(error) => {
                    stats.files_failed += 1;
                    result.add_error(error.into());
                }
                FileOutcome::Cancelled => cancelled += 1,
            }
        }
        if cancelled > 0 {
            warn!(cancelled, "batch cancelled; keeping files already extracted");
            stats.files_skipped += cancelled;
            result.add_error(PipelineError::Cancelled);
        }

        let mut output = self.assemble(analyses);
        stats.functions = output.graph.len();
        stats.missing = output.graph.missing_functions().len();
        stats.resolved = output.resolution.resolved();
        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            analyzed = stats.files_analyzed,
            failed = stats.files_failed,
            skipped = stats.files_skipped,
            functions = stats.functions,
            missing = stats.missing,
            resolved = stats.resolved,
            duration_ms = stats.duration_ms,
            "batch analysis complete"
        );
        output.stats = stats;
        result.data = output;
        Ok(result)
    }

    /// Builds one extractor up front so a broken front-end fails the run
    /// before any worker starts.
    pub(crate) fn check_frontend(&self) -> Result<(), PipelineError> {
        let extractor = SourceExtractor::new(self.config.analysis.clone())?;
        let capabilities = extractor.capabilities();
        if !capabilities.is_complete() {
            warn!(?capabilities, "parser lacks some node kinds; textual strategies fill in");
        }
        Ok(())
    }

    /// Extracts `files` on a dedicated pool. Results come back in input
    /// order.
    pub(crate) fn extract_files(
        &self,
        files: &[PathBuf],
        provider: &dyn CompileCommandsProvider,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileOutcome>, PipelineError> {
        let workers = self.config.scan.effective_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("cxxgraph-worker-{i}"))
            .build()
            .map_err(|e| PipelineError::WorkerPool {
                message: e.to_string(),
            })?;

        let analysis_config = &self.config.analysis;
        let track_virtual = analysis_config.effective_track_virtual_methods();
        let outcomes = pool.install(|| {
            files
                .par_iter()
                .map_init(
                    || SourceExtractor::new(analysis_config.clone()),
                    |extractor, path| {
                        if cancel.is_cancelled() {
                            return FileOutcome::Cancelled;
                        }
                        let extractor = match extractor {
                            Ok(extractor) => extractor,
                            Err(error) => {
                                return FileOutcome::Failed(ParseError::FrontendInit {
                                    message: error.to_string(),
                                })
                            }
                        };
                        match analyze_file(extractor, path, provider, track_virtual) {
                            Ok(analysis) => FileOutcome::Analyzed(analysis),
                            Err(error) => {
                                warn!(file = %path.display(), %error, "file skipped");
                                FileOutcome::Failed(error)
                            }
                        }
                    },
                )
                .collect::<Vec<_>>()
        });
        Ok(outcomes)
    }

    /// Folds per-file results in path order and runs the global passes.
    pub fn assemble(&self, analyses: impl IntoIterator<Item = FileAnalysis>) -> AnalysisOutput {
        let mut analyses: Vec<FileAnalysis> = analyses.into_iter().collect();
        analyses.sort_by(|a, b| a.path.cmp(&b.path));

        let mut graph = CallGraph::new();
        let mut hierarchy = ClassHierarchy::new();
        let mut includes = BTreeMap::new();
        for analysis in analyses {
            graph.merge(analysis.graph);
            hierarchy.merge(analysis.hierarchy);
            includes.insert(analysis.path, analysis.includes);
        }

        let resolution = self.global_passes(&mut graph, &mut hierarchy);
        AnalysisOutput {
            graph,
            hierarchy,
            includes,
            stats: BatchStats::default(),
            resolution,
        }
    }

    /// Hierarchy enrichment, virtual expansion and cross-file resolution,
    /// in that order, over the complete merged graph.
    fn global_passes(&self, graph: &mut CallGraph, hierarchy: &mut ClassHierarchy) -> ResolutionStats {
        hierarchy.link_bases();
        graph.link_edges();

        if self.config.analysis.effective_track_virtual_methods() {
            let classes = ClassHierarchyResolver::from_config(&self.config.resolution);
            let overrides = classes.resolve_overrides(hierarchy);
            let enriched = classes.enrich_function_model(graph, hierarchy);
            let expanded = classes.resolve_virtual_calls_in_graph(graph, hierarchy);
            debug!(overrides, enriched, expanded, "class hierarchy applied");
        }

        let resolution = CrossFileResolver::new(self.config.resolution.clone()).resolve(graph);
        graph.link_specializations();
        resolution
    }
}

/// Parses and extracts one file with its compile commands.
pub fn analyze_file(
    extractor: &mut SourceExtractor,
    path: &Path,
    provider: &dyn CompileCommandsProvider,
    collect_classes: bool,
) -> Result<FileAnalysis, ParseError> {
    let include_paths = provider.include_paths(path);
    let options = provider.compiler_options(path);
    let unit = extractor.parse_unit(path, &include_paths, &options)?;
    let graph = extractor.extract(&unit);
    let hierarchy = if collect_classes {
        collector::collect_classes(&unit)
    } else {
        ClassHierarchy::new()
    };
    Ok(FileAnalysis {
        path: path.to_path_buf(),
        graph,
        hierarchy,
        error_nodes: unit.error_count(),
        includes: unit.includes,
    })
}
