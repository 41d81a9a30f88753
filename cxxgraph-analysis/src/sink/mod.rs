//! Write contract towards a graph store.
//!
//! The engine never talks to a database client directly. A store
//! implements `GraphSink`; `publish` streams one finished analysis into it.

pub mod memory;
pub mod publish;

use std::fmt;

use cxxgraph_core::errors::SinkError;
use serde::{Deserialize, Serialize};

use crate::call_graph::FunctionRecord;

pub use memory::MemorySink;
pub use publish::{publish, PublishStats};

/// Typed relationships between functions besides call edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    /// From a specialization or instantiation to its primary template.
    Specializes,
    /// From a derived method to the base method it overrides.
    Overrides,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Specializes => "SPECIALIZES",
            Self::Overrides => "OVERRIDES",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call per fact. Every operation must be idempotent except that a
/// repeated call edge increments that edge's usage count.
pub trait GraphSink {
    fn upsert_function(&mut self, record: &FunctionRecord, project: &str) -> Result<(), SinkError>;

    fn upsert_call_edge(&mut self, caller: &str, callee: &str, project: &str) -> Result<(), SinkError>;

    fn upsert_relationship(
        &mut self,
        kind: RelationshipKind,
        from: &str,
        to: &str,
        project: &str,
    ) -> Result<(), SinkError>;

    fn mark_missing(&mut self, name: &str, project: &str) -> Result<(), SinkError>;
}
