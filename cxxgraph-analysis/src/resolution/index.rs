use rustc_hash::FxHashMap;

use crate::call_graph::{naming, CallGraph};

/// Known functions grouped by base name (qualifier and template arguments
/// stripped). Candidate lists are sorted.
#[derive(Debug, Default)]
pub struct FunctionIndex {
    by_base: FxHashMap<String, Vec<String>>,
}

impl FunctionIndex {
    /// Concepts are not callable and are left out.
    pub fn build(graph: &CallGraph) -> Self {
        let mut by_base: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for record in graph.records().filter(|r| !r.is_concept) {
            by_base
                .entry(record.base_name())
                .or_default()
                .push(record.name.clone());
        }
        for names in by_base.values_mut() {
            names.sort();
        }
        Self { by_base }
    }

    pub fn by_base(&self, base: &str) -> &[String] {
        self.by_base.get(base).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Candidates for `missing` by base name.
    pub fn candidates(&self, missing: &str) -> &[String] {
        self.by_base(&naming::base_name(missing))
    }

    /// Candidates whose name, template arguments removed, ends with the
    /// qualified spelling of `missing`: `Shape::area` finds
    /// `geo::Shape::area`. Empty for unqualified names.
    pub fn by_qualified_suffix(&self, missing: &str) -> Vec<String> {
        if naming::qualifier(missing).is_none() {
            return Vec::new();
        }
        let wanted = naming::strip_template_args(missing);
        let suffix = format!("::{wanted}");
        self.candidates(missing)
            .iter()
            .filter(|name| {
                let stripped = naming::strip_template_args(name);
                stripped == wanted || stripped.ends_with(&suffix)
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_base.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_base.is_empty()
    }
}
