//! Call graph model: function records, the merged graph and traversal.

pub mod graph;
pub mod naming;
pub mod traversal;
pub mod types;

pub use graph::CallGraph;
pub use types::{CallSite, FunctionRecord, MetafunctionKind, Provenance};
