//! Graph views and traversals over a finished call graph.

use std::collections::{BTreeSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use super::graph::CallGraph;

/// A petgraph projection of a `CallGraph`. Missing functions become nodes
/// too so every edge has both endpoints.
pub struct CallDigraph {
    pub graph: DiGraph<String, ()>,
    pub index: FxHashMap<String, NodeIndex>,
}

impl CallDigraph {
    pub fn node(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }
}

impl CallGraph {
    pub fn to_digraph(&self) -> CallDigraph {
        let mut graph = DiGraph::new();
        let mut index = FxHashMap::default();
        for name in self.functions().keys().chain(self.missing_functions().iter()) {
            let id = graph.add_node(name.clone());
            index.insert(name.clone(), id);
        }
        for record in self.records() {
            let Some(&from) = index.get(&record.name) else {
                continue;
            };
            for callee in &record.calls {
                if let Some(&to) = index.get(callee) {
                    graph.update_edge(from, to, ());
                }
            }
        }
        CallDigraph { graph, index }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Callees,
    Callers,
}

fn bfs(graph: &CallGraph, start: &str, max_depth: usize, direction: Direction) -> Vec<String> {
    let mut visited: FxHashSet<String> = FxHashSet::default();
    let mut order = Vec::new();
    let mut queue = VecDeque::new();
    visited.insert(start.to_string());
    queue.push_back((start.to_string(), 0usize));

    while let Some((name, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let Some(record) = graph.get_function(&name) else {
            continue;
        };
        let next = match direction {
            Direction::Callees => &record.calls,
            Direction::Callers => &record.called_by,
        };
        for neighbor in next {
            if visited.insert(neighbor.clone()) {
                order.push(neighbor.clone());
                queue.push_back((neighbor.clone(), depth + 1));
            }
        }
    }
    order
}

/// Everything reachable from `start` through `calls`, breadth first.
pub fn transitive_callees(graph: &CallGraph, start: &str, max_depth: usize) -> Vec<String> {
    bfs(graph, start, max_depth, Direction::Callees)
}

/// Everything that can reach `start`, breadth first.
pub fn transitive_callers(graph: &CallGraph, start: &str, max_depth: usize) -> Vec<String> {
    bfs(graph, start, max_depth, Direction::Callers)
}

/// Groups of mutually recursive functions (including self recursion),
/// each group sorted, groups sorted by first member.
pub fn recursive_groups(graph: &CallGraph) -> Vec<Vec<String>> {
    let view = graph.to_digraph();
    let mut groups: BTreeSet<Vec<String>> = BTreeSet::new();
    for scc in tarjan_scc(&view.graph) {
        let recursive = scc.len() > 1
            || scc
                .first()
                .is_some_and(|&n| view.graph.find_edge(n, n).is_some());
        if recursive {
            let mut names: Vec<String> = scc.iter().map(|&n| view.graph[n].clone()).collect();
            names.sort();
            groups.insert(names);
        }
    }
    groups.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_graph::FunctionRecord;

    fn graph(edges: &[(&str, &str)]) -> CallGraph {
        let mut g = CallGraph::new();
        for (from, _) in edges {
            if !g.contains(from) {
                g.add_function(FunctionRecord::new(*from));
            }
        }
        for (from, to) in edges {
            g.add_call(from, to).unwrap();
        }
        g
    }

    #[test]
    fn bfs_respects_depth() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "d")]);
        assert_eq!(transitive_callees(&g, "a", 2), vec!["b", "c"]);
        assert_eq!(transitive_callees(&g, "a", 10), vec!["b", "c", "d"]);
        assert_eq!(transitive_callers(&g, "c", 10), vec!["b", "a"]);
    }

    #[test]
    fn recursion_groups_include_self_loops() {
        let g = graph(&[("even", "odd"), ("odd", "even"), ("fact", "fact"), ("main", "fact")]);
        let groups = recursive_groups(&g);
        assert_eq!(
            groups,
            vec![
                vec!["even".to_string(), "odd".to_string()],
                vec!["fact".to_string()],
            ]
        );
    }

    #[test]
    fn digraph_includes_missing_nodes() {
        let g = graph(&[("main", "printf")]);
        let view = g.to_digraph();
        assert_eq!(view.graph.node_count(), 2);
        assert_eq!(view.graph.edge_count(), 1);
        assert!(view.node("printf").is_some());
    }
}
