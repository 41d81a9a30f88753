//! Publishing a finished analysis into a graph sink.

use cxxgraph_analysis::call_graph::{CallGraph, FunctionRecord};
use cxxgraph_analysis::pipeline::{AnalysisOutput, AnalysisPipeline, NoCompileCommands};
use cxxgraph_analysis::sink::{publish, GraphSink, MemorySink, RelationshipKind};
use cxxgraph_analysis::hierarchy::ClassHierarchy;
use cxxgraph_core::errors::SinkError;
use cxxgraph_core::traits::CancellationToken;

const SHAPES: &str = r#"
class Shape {
public:
    virtual double area() const { return 0.0; }
};

class Circle : public Shape {
public:
    double area() const override { return 3.0 * r * r; }
    double r;
};

double measure(Shape* shape) {
    return shape->area();
}

int main() {
    return helper();
}
"#;

fn analyze(source: &str) -> AnalysisOutput {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shapes.cpp");
    std::fs::write(&path, source).unwrap();
    AnalysisPipeline::default()
        .run(&[path], &NoCompileCommands, &CancellationToken::new())
        .unwrap()
        .data
}

#[test]
fn test_publish_writes_every_fact() {
    let output = analyze(SHAPES);
    let mut sink = MemorySink::new();
    let stats = publish(&output.graph, &output.hierarchy, "demo", &mut sink).unwrap();

    assert_eq!(stats.functions, output.graph.len());
    assert_eq!(sink.function_count("demo"), output.graph.len());
    assert_eq!(stats.call_edges, output.graph.edge_count());
    assert_eq!(sink.edge_usage("demo", "measure", "Shape::area"), 1);
    assert_eq!(sink.edge_usage("demo", "measure", "Circle::area"), 1);

    assert_eq!(stats.missing, 1);
    assert!(sink.is_missing("demo", "helper"));
    assert_eq!(sink.edge_usage("demo", "main", "helper"), 1);

    assert_eq!(
        sink.relationships("demo", RelationshipKind::Overrides),
        vec![("Circle::area".to_string(), "Shape::area".to_string())]
    );
    assert_eq!(stats.overrides, 1);
}

#[test]
fn test_republishing_counts_edge_usage_only() {
    let output = analyze(SHAPES);
    let mut sink = MemorySink::new();
    publish(&output.graph, &output.hierarchy, "demo", &mut sink).unwrap();
    publish(&output.graph, &output.hierarchy, "demo", &mut sink).unwrap();

    assert_eq!(sink.function_count("demo"), output.graph.len());
    assert_eq!(sink.edge_usage("demo", "measure", "Circle::area"), 2);
    assert_eq!(sink.relationships("demo", RelationshipKind::Overrides).len(), 1);
    assert_eq!(sink.missing("demo"), vec!["helper".to_string()]);
}

#[test]
fn test_projects_are_isolated() {
    let output = analyze(SHAPES);
    let mut sink = MemorySink::new();
    publish(&output.graph, &output.hierarchy, "alpha", &mut sink).unwrap();

    assert!(sink.function("alpha", "Circle::area").is_some());
    assert!(sink.function("beta", "Circle::area").is_none());
    assert_eq!(sink.edge_count("beta"), 0);
    assert!(!sink.is_missing("beta", "helper"));
}

#[test]
fn test_specializations_are_published() {
    let mut graph = CallGraph::new();
    let mut primary = FunctionRecord::new("sort");
    primary.is_template = true;
    primary.is_definition = true;
    graph.add_function(primary);
    graph.add_function(FunctionRecord::new("sort<int>"));
    graph.link_specializations();

    let mut sink = MemorySink::new();
    let stats = publish(&graph, &ClassHierarchy::new(), "demo", &mut sink).unwrap();
    assert_eq!(stats.specializes, 1);
    assert_eq!(
        sink.relationships("demo", RelationshipKind::Specializes),
        vec![("sort<int>".to_string(), "sort".to_string())]
    );
    assert!(sink.relationships("demo", RelationshipKind::Overrides).is_empty());
}

/// Accepts functions, fails on the first call edge.
#[derive(Default)]
struct FailingEdges {
    functions: usize,
    relationships: usize,
}

impl GraphSink for FailingEdges {
    fn upsert_function(&mut self, _record: &FunctionRecord, _project: &str) -> Result<(), SinkError> {
        self.functions += 1;
        Ok(())
    }

    fn upsert_call_edge(&mut self, caller: &str, callee: &str, _project: &str) -> Result<(), SinkError> {
        Err(SinkError::WriteFailed {
            kind: "CALLS".to_string(),
            message: format!("{caller} -> {callee}"),
        })
    }

    fn upsert_relationship(
        &mut self,
        _kind: RelationshipKind,
        _from: &str,
        _to: &str,
        _project: &str,
    ) -> Result<(), SinkError> {
        self.relationships += 1;
        Ok(())
    }

    fn mark_missing(&mut self, _name: &str, _project: &str) -> Result<(), SinkError> {
        Ok(())
    }
}

#[test]
fn test_sink_error_stops_publishing() {
    let output = analyze(SHAPES);
    let mut sink = FailingEdges::default();
    let err = publish(&output.graph, &output.hierarchy, "demo", &mut sink).unwrap_err();

    assert!(matches!(err, SinkError::WriteFailed { .. }));
    assert_eq!(sink.functions, output.graph.len());
    assert_eq!(sink.relationships, 0);
}

#[test]
fn test_relationship_kind_names() {
    assert_eq!(RelationshipKind::Specializes.to_string(), "SPECIALIZES");
    assert_eq!(
        serde_json::to_string(&RelationshipKind::Overrides).unwrap(),
        "\"OVERRIDES\""
    );
}
