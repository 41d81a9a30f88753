//! In-memory `GraphSink` used by tests and embedding callers.

use std::collections::{BTreeMap, BTreeSet};

use cxxgraph_core::errors::SinkError;

use super::{GraphSink, RelationshipKind};
use crate::call_graph::FunctionRecord;

type Key = (String, String);

/// Stores every fact per project. Call edges carry a usage count.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    functions: BTreeMap<Key, FunctionRecord>,
    edges: BTreeMap<(String, String, String), u64>,
    relationships: BTreeSet<(String, RelationshipKind, String, String)>,
    missing: BTreeSet<Key>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(&self, project: &str, name: &str) -> Option<&FunctionRecord> {
        self.functions.get(&(project.to_string(), name.to_string()))
    }

    pub fn function_count(&self, project: &str) -> usize {
        self.functions.keys().filter(|(p, _)| p == project).count()
    }

    /// Times the edge was upserted, 0 when it never was.
    pub fn edge_usage(&self, project: &str, caller: &str, callee: &str) -> u64 {
        self.edges
            .get(&(project.to_string(), caller.to_string(), callee.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn edge_count(&self, project: &str) -> usize {
        self.edges.keys().filter(|(p, _, _)| p == project).count()
    }

    /// `(from, to)` pairs of one relationship kind, sorted.
    pub fn relationships(&self, project: &str, kind: RelationshipKind) -> Vec<(String, String)> {
        self.relationships
            .iter()
            .filter(|(p, k, _, _)| p == project && *k == kind)
            .map(|(_, _, from, to)| (from.clone(), to.clone()))
            .collect()
    }

    pub fn is_missing(&self, project: &str, name: &str) -> bool {
        self.missing.contains(&(project.to_string(), name.to_string()))
    }

    pub fn missing(&self, project: &str) -> Vec<String> {
        self.missing
            .iter()
            .filter(|(p, _)| p == project)
            .map(|(_, name)| name.clone())
            .collect()
    }
}

impl GraphSink for MemorySink {
    fn upsert_function(&mut self, record: &FunctionRecord, project: &str) -> Result<(), SinkError> {
        if record.name.is_empty() {
            return Err(SinkError::Rejected {
                name: String::new(),
                message: "function record without a name".to_string(),
            });
        }
        let key = (project.to_string(), record.name.clone());
        // A name that gained a record is no longer missing.
        self.missing.remove(&key);
        self.functions.insert(key, record.clone());
        Ok(())
    }

    fn upsert_call_edge(&mut self, caller: &str, callee: &str, project: &str) -> Result<(), SinkError> {
        *self
            .edges
            .entry((project.to_string(), caller.to_string(), callee.to_string()))
            .or_insert(0) += 1;
        Ok(())
    }

    fn upsert_relationship(
        &mut self,
        kind: RelationshipKind,
        from: &str,
        to: &str,
        project: &str,
    ) -> Result<(), SinkError> {
        self.relationships
            .insert((project.to_string(), kind, from.to_string(), to.to_string()));
        Ok(())
    }

    fn mark_missing(&mut self, name: &str, project: &str) -> Result<(), SinkError> {
        let key = (project.to_string(), name.to_string());
        if !self.functions.contains_key(&key) {
            self.missing.insert(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_edges_count_usage() {
        let mut sink = MemorySink::new();
        sink.upsert_call_edge("main", "run", "demo").unwrap();
        sink.upsert_call_edge("main", "run", "demo").unwrap();
        assert_eq!(sink.edge_usage("demo", "main", "run"), 2);
        assert_eq!(sink.edge_count("demo"), 1);
        assert_eq!(sink.edge_usage("other", "main", "run"), 0);
    }

    #[test]
    fn upserts_are_idempotent() {
        let mut sink = MemorySink::new();
        let record = FunctionRecord::new("ns::f");
        sink.upsert_function(&record, "demo").unwrap();
        sink.upsert_function(&record, "demo").unwrap();
        sink.upsert_relationship(RelationshipKind::Overrides, "D::f", "B::f", "demo")
            .unwrap();
        sink.upsert_relationship(RelationshipKind::Overrides, "D::f", "B::f", "demo")
            .unwrap();
        assert_eq!(sink.function_count("demo"), 1);
        assert_eq!(
            sink.relationships("demo", RelationshipKind::Overrides),
            vec![("D::f".to_string(), "B::f".to_string())]
        );
    }

    #[test]
    fn defined_function_clears_missing() {
        let mut sink = MemorySink::new();
        sink.mark_missing("helper", "demo").unwrap();
        assert!(sink.is_missing("demo", "helper"));
        sink.upsert_function(&FunctionRecord::new("helper"), "demo").unwrap();
        assert!(!sink.is_missing("demo", "helper"));
        sink.mark_missing("helper", "demo").unwrap();
        assert!(!sink.is_missing("demo", "helper"));
    }

    #[test]
    fn nameless_record_is_rejected() {
        let mut sink = MemorySink::new();
        let err = sink.upsert_function(&FunctionRecord::default(), "demo").unwrap_err();
        assert!(matches!(err, SinkError::Rejected { .. }));
    }
}
