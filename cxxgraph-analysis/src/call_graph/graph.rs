//! The merged call graph.

use std::collections::{BTreeMap, BTreeSet};

use cxxgraph_core::errors::CallGraphError;
use serde::{Deserialize, Serialize};

use super::naming;
use super::types::FunctionRecord;

/// Function records keyed by qualified name plus the set of callee names
/// that have no record yet.
///
/// After every public mutation, each callee is either a key of
/// `functions` or a member of `missing_functions`, and `called_by` is the
/// transpose of `calls` over known functions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallGraph {
    functions: BTreeMap<String, FunctionRecord>,
    missing_functions: BTreeSet<String>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, merging into an existing one of the same name.
    /// A previously missing name becomes known and its callers are linked.
    pub fn add_function(&mut self, record: FunctionRecord) -> &mut FunctionRecord {
        let name = record.name.clone();
        let callees = record.calls.clone();
        match self.functions.get_mut(&name) {
            Some(existing) => existing.merge_from(&record),
            None => {
                self.functions.insert(name.clone(), record);
            }
        }

        if self.missing_functions.remove(&name) {
            for caller in self.callers_of(&name) {
                self.link_caller(&caller, &name);
            }
        }
        for callee in &callees {
            self.link_or_mark_missing(&name, callee);
        }

        self.functions
            .entry(name)
            .or_insert_with_key(|key| FunctionRecord::new(key.clone()))
    }

    /// Marks `name` as referenced but undefined. No-op for known functions.
    pub fn add_missing_function(&mut self, name: &str) -> bool {
        if self.functions.contains_key(name) {
            return false;
        }
        self.missing_functions.insert(name.to_string())
    }

    pub fn get_function(&self, name: &str) -> Option<&FunctionRecord> {
        self.functions.get(name)
    }

    pub fn get_function_mut(&mut self, name: &str) -> Option<&mut FunctionRecord> {
        self.functions.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn is_missing(&self, name: &str) -> bool {
        self.missing_functions.contains(name)
    }

    pub fn functions(&self) -> &BTreeMap<String, FunctionRecord> {
        &self.functions
    }

    pub fn records(&self) -> impl Iterator<Item = &FunctionRecord> {
        self.functions.values()
    }

    pub fn missing_functions(&self) -> &BTreeSet<String> {
        &self.missing_functions
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.missing_functions.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.functions.values().map(|f| f.calls.len()).sum()
    }

    /// All `(caller, callee)` pairs in deterministic order.
    pub fn edges(&self) -> BTreeSet<(String, String)> {
        self.functions
            .values()
            .flat_map(|f| f.calls.iter().map(move |c| (f.name.clone(), c.clone())))
            .collect()
    }

    /// Adds a call edge from a known caller. Unknown callees are recorded
    /// as missing.
    pub fn add_call(&mut self, caller: &str, callee: &str) -> Result<bool, CallGraphError> {
        let record = self
            .functions
            .get_mut(caller)
            .ok_or_else(|| CallGraphError::UnknownFunction {
                name: caller.to_string(),
            })?;
        let added = record.add_call(callee);
        self.link_or_mark_missing(caller, callee);
        Ok(added)
    }

    /// Names of known functions whose `calls` contain `callee`.
    pub fn callers_of(&self, callee: &str) -> Vec<String> {
        self.functions
            .values()
            .filter(|f| f.calls.iter().any(|c| c == callee))
            .map(|f| f.name.clone())
            .collect()
    }

    /// Points every edge that targets `from` at `to` and marks `from`
    /// resolved. Returns the number of callers rewired.
    pub fn rewire(&mut self, from: &str, to: &str) -> usize {
        let callers = self.callers_of(from);
        for caller in &callers {
            if let Some(record) = self.functions.get_mut(caller) {
                record.replace_call(from, to);
            }
            if let Some(old) = self.functions.get_mut(from) {
                old.remove_caller(caller);
            }
            self.link_or_mark_missing(caller, to);
        }
        self.missing_functions.remove(from);
        callers.len()
    }

    /// Drops a stale missing entry for a name that has a record and links
    /// its callers. Returns false when `name` is unknown.
    pub fn resolve_exact(&mut self, name: &str) -> bool {
        if !self.functions.contains_key(name) {
            return false;
        }
        self.missing_functions.remove(name);
        for caller in self.callers_of(name) {
            self.link_caller(&caller, name);
        }
        true
    }

    /// Unions `other` into `self`.
    ///
    /// Colliding records merge field by field; missing names that now have
    /// a definition on either side are dropped and their callers linked.
    pub fn merge(&mut self, other: CallGraph) {
        let CallGraph {
            functions,
            missing_functions,
        } = other;

        let mut incoming_edges = Vec::new();
        for (name, record) in functions {
            for callee in &record.calls {
                incoming_edges.push((name.clone(), callee.clone()));
            }
            match self.functions.get_mut(&name) {
                Some(existing) => existing.merge_from(&record),
                None => {
                    self.functions.insert(name, record);
                }
            }
        }

        self.missing_functions.extend(missing_functions);
        let functions = &self.functions;
        let newly_known: BTreeSet<String> = self
            .missing_functions
            .iter()
            .filter(|name| functions.contains_key(*name))
            .cloned()
            .collect();
        self.missing_functions
            .retain(|name| !newly_known.contains(name));

        for (caller, callee) in incoming_edges {
            self.link_or_mark_missing(&caller, &callee);
        }
        if !newly_known.is_empty() {
            let edges: Vec<(String, String)> = self
                .functions
                .values()
                .flat_map(|f| {
                    f.calls
                        .iter()
                        .filter(|c| newly_known.contains(*c))
                        .map(move |c| (f.name.clone(), c.clone()))
                })
                .collect();
            for (caller, callee) in edges {
                self.link_caller(&caller, &callee);
            }
        }
    }

    /// Re-establishes both graph invariants from the `calls` lists alone.
    /// Returns the number of names newly marked missing.
    pub fn link_edges(&mut self) -> usize {
        let known: BTreeSet<String> = self.functions.keys().cloned().collect();
        self.missing_functions.retain(|name| !known.contains(name));

        let edges: Vec<(String, String)> = self.edges().into_iter().collect();
        let mut marked = 0;
        for (caller, callee) in edges {
            if known.contains(&callee) {
                self.link_caller(&caller, &callee);
            } else if self.missing_functions.insert(callee) {
                marked += 1;
            }
        }
        marked
    }

    /// Callees that are neither known nor marked missing. Empty whenever
    /// the graph is consistent.
    pub fn dangling_callees(&self) -> BTreeSet<String> {
        self.functions
            .values()
            .flat_map(|f| f.calls.iter())
            .filter(|c| !self.functions.contains_key(*c) && !self.missing_functions.contains(*c))
            .cloned()
            .collect()
    }

    /// Appends each specialization to its primary template's list.
    ///
    /// Uses `primary_template` when set; otherwise a record spelled
    /// `name<args>` whose stripped name is known is treated as an
    /// instantiation of that record. Returns links added.
    pub fn link_specializations(&mut self) -> usize {
        let mut pairs = Vec::new();
        for record in self.functions.values() {
            let primary = match &record.primary_template {
                Some(primary) => Some(primary.clone()),
                None if record.name.contains('<') => {
                    let stripped = naming::strip_template_args(&record.name);
                    (stripped != record.name && self.functions.contains_key(&stripped))
                        .then_some(stripped)
                }
                None => None,
            };
            if let Some(primary) = primary {
                if primary != record.name {
                    pairs.push((primary, record.name.clone()));
                }
            }
        }

        let mut linked = 0;
        for (primary, specialization) in pairs {
            if let Some(record) = self.functions.get_mut(&specialization) {
                if record.primary_template.is_none() {
                    record.primary_template = Some(primary.clone());
                }
            }
            if let Some(record) = self.functions.get_mut(&primary) {
                if record.add_specialization(&specialization) {
                    linked += 1;
                }
            }
        }
        linked
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn link_caller(&mut self, caller: &str, callee: &str) {
        if let Some(record) = self.functions.get_mut(callee) {
            record.add_caller(caller);
        }
    }

    fn link_or_mark_missing(&mut self, caller: &str, callee: &str) {
        if self.functions.contains_key(callee) {
            self.link_caller(caller, callee);
        } else {
            self.missing_functions.insert(callee.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, calls: &[&str]) -> FunctionRecord {
        let mut r = FunctionRecord::new(name);
        for c in calls {
            r.add_call(c);
        }
        r
    }

    #[test]
    fn add_function_links_and_marks_missing() {
        let mut g = CallGraph::new();
        g.add_function(record("main", &["helper", "printf"]));
        assert!(g.is_missing("helper"));
        assert!(g.is_missing("printf"));

        g.add_function(record("helper", &[]));
        assert!(!g.is_missing("helper"));
        assert_eq!(g.get_function("helper").unwrap().called_by, vec!["main"]);
        assert!(g.dangling_callees().is_empty());
    }

    #[test]
    fn add_missing_ignores_known_names() {
        let mut g = CallGraph::new();
        g.add_function(record("f", &[]));
        assert!(!g.add_missing_function("f"));
        assert!(g.add_missing_function("g"));
        assert!(!g.add_missing_function("g"));
    }

    #[test]
    fn add_call_requires_known_caller() {
        let mut g = CallGraph::new();
        assert!(g.add_call("ghost", "f").is_err());
        g.add_function(record("f", &[]));
        assert!(g.add_call("f", "f").unwrap());
        assert_eq!(g.get_function("f").unwrap().called_by, vec!["f"]);
    }

    #[test]
    fn rewire_updates_both_endpoints() {
        let mut g = CallGraph::new();
        g.add_function(record("calculate", &["add"]));
        g.add_function(record("math::add", &[]));
        assert_eq!(g.rewire("add", "math::add"), 1);
        assert!(!g.is_missing("add"));
        assert_eq!(g.get_function("calculate").unwrap().calls, vec!["math::add"]);
        assert_eq!(g.get_function("math::add").unwrap().called_by, vec!["calculate"]);
    }

    #[test]
    fn merge_resolves_cross_file_missing() {
        let mut a = CallGraph::new();
        a.add_function(record("calculate", &["math::add"]));
        let mut b = CallGraph::new();
        b.add_function(record("math::add", &[]));

        a.merge(b);
        assert!(a.missing_functions().is_empty());
        assert_eq!(a.get_function("math::add").unwrap().called_by, vec!["calculate"]);
    }

    #[test]
    fn link_specializations_uses_primary_and_spelling() {
        let mut g = CallGraph::new();
        g.add_function(record("traits::is_same", &[]));
        let mut partial = record("traits::is_same<T, T>", &[]);
        partial.primary_template = Some("traits::is_same".to_string());
        g.add_function(partial);
        g.add_function(record("process", &[]));
        g.add_function(record("process<int>", &[]));

        assert_eq!(g.link_specializations(), 2);
        assert_eq!(
            g.get_function("traits::is_same").unwrap().specializations,
            vec!["traits::is_same<T, T>"]
        );
        assert_eq!(
            g.get_function("process<int>").unwrap().primary_template.as_deref(),
            Some("process")
        );
        assert_eq!(g.link_specializations(), 0);
    }
}
