//! Streams a finished analysis into a `GraphSink`.

use std::collections::BTreeSet;

use cxxgraph_core::errors::SinkError;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{GraphSink, RelationshipKind};
use crate::call_graph::{naming, CallGraph};
use crate::hierarchy::ClassHierarchy;

/// Facts written by one `publish` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishStats {
    pub functions: usize,
    pub call_edges: usize,
    pub specializes: usize,
    pub overrides: usize,
    pub missing: usize,
}

/// Writes functions, missing names, call edges, then SPECIALIZES and
/// OVERRIDES relationships. Stops at the first sink error.
pub fn publish(
    graph: &CallGraph,
    hierarchy: &ClassHierarchy,
    project: &str,
    sink: &mut dyn GraphSink,
) -> Result<PublishStats, SinkError> {
    let mut stats = PublishStats::default();

    for record in graph.records() {
        sink.upsert_function(record, project)?;
        stats.functions += 1;
    }
    for name in graph.missing_functions() {
        sink.mark_missing(name, project)?;
        stats.missing += 1;
    }
    for (caller, callee) in graph.edges() {
        sink.upsert_call_edge(&caller, &callee, project)?;
        stats.call_edges += 1;
    }

    for (from, to) in specializes(graph) {
        sink.upsert_relationship(RelationshipKind::Specializes, &from, &to, project)?;
        stats.specializes += 1;
    }
    for (from, to) in overrides(graph, hierarchy) {
        sink.upsert_relationship(RelationshipKind::Overrides, &from, &to, project)?;
        stats.overrides += 1;
    }

    info!(
        project,
        functions = stats.functions,
        call_edges = stats.call_edges,
        missing = stats.missing,
        "published"
    );
    Ok(stats)
}

fn specializes(graph: &CallGraph) -> BTreeSet<(String, String)> {
    let mut pairs = BTreeSet::new();
    for record in graph.records() {
        if let Some(primary) = &record.primary_template {
            pairs.insert((record.name.clone(), primary.clone()));
        }
        for specialization in &record.specializations {
            pairs.insert((specialization.clone(), record.name.clone()));
        }
    }
    pairs
}

/// Overrides recorded on function records plus those only the hierarchy
/// knows about (declared but never defined in the analyzed files).
fn overrides(graph: &CallGraph, hierarchy: &ClassHierarchy) -> BTreeSet<(String, String)> {
    let mut pairs = BTreeSet::new();
    for record in graph.records() {
        for base_method in &record.overrides {
            pairs.insert((record.name.clone(), base_method.clone()));
        }
    }
    for class in hierarchy.classes() {
        for (method, bases) in &class.overridden_methods {
            for base in bases {
                pairs.insert((naming::join(&class.name, method), naming::join(base, method)));
            }
        }
    }
    pairs
}
