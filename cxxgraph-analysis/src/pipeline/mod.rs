//! Batch orchestration: worker pool extraction, merge, global passes and
//! incremental re-analysis.

pub mod batch;
pub mod compile_commands;
pub mod incremental;

pub use batch::{analyze_file, AnalysisOutput, AnalysisPipeline, BatchStats, FileAnalysis};
pub use compile_commands::{CompileCommandsProvider, NoCompileCommands, StaticCompileCommands};
pub use incremental::{FileStatus, IncrementalAnalyzer, IncrementalUpdate, UpdateSummary};
