//! cxxgraph-analysis: C/C++ call graph extraction and repair.
//!
//! Per-file extraction runs in parallel over tree-sitter syntax trees; the
//! merged graph is then enriched with class hierarchy and virtual dispatch
//! data, and missing call targets are repaired across files.

pub mod call_graph;
pub mod extraction;
pub mod hierarchy;
pub mod pipeline;
pub mod resolution;
pub mod scanner;
pub mod sink;

pub use call_graph::{CallGraph, CallSite, FunctionRecord, MetafunctionKind, Provenance};
pub use extraction::SourceExtractor;
pub use hierarchy::{ClassHierarchy, ClassHierarchyResolver, ClassNode};
pub use pipeline::{AnalysisOutput, AnalysisPipeline};
pub use resolution::{CrossFileResolver, ResolutionStats};
pub use sink::{publish, GraphSink, MemorySink, RelationshipKind};
