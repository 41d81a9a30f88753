//! Override detection, virtual method tables and polymorphic call
//! expansion.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use cxxgraph_core::config::{OverrideStrictness, ResolutionConfig};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use super::collector;
use super::types::ClassHierarchy;
use crate::call_graph::{naming, CallGraph};
use crate::extraction::TranslationUnit;

/// Method name to the classes providing its final implementation.
pub type Vtable = BTreeMap<String, BTreeSet<String>>;

/// Builds vtables for one hierarchy, memoizing per class so repeated
/// queries share work.
pub struct VtableBuilder<'h> {
    hierarchy: &'h ClassHierarchy,
    memo: FxHashMap<String, Vtable>,
}

impl<'h> VtableBuilder<'h> {
    pub fn new(hierarchy: &'h ClassHierarchy) -> Self {
        Self {
            hierarchy,
            memo: FxHashMap::default(),
        }
    }

    pub fn vtable(&mut self, class: &str) -> Vtable {
        self.vtable_guarded(class, &FxHashSet::default())
    }

    fn vtable_guarded(&mut self, class: &str, visited: &FxHashSet<String>) -> Vtable {
        if let Some(cached) = self.memo.get(class) {
            return cached.clone();
        }
        if visited.contains(class) {
            warn!(class, "inheritance cycle while building vtable");
            return Vtable::new();
        }
        let Some(node) = self.hierarchy.get(class) else {
            return Vtable::new();
        };

        let mut path = visited.clone();
        path.insert(class.to_string());

        let mut table = Vtable::new();
        for base in &node.base_classes {
            if !self.hierarchy.contains(base) {
                continue;
            }
            for (method, implementors) in self.vtable_guarded(base, &path) {
                table.entry(method).or_default().extend(implementors);
            }
        }

        // An override replaces the inherited implementors; a method new to
        // this class starts a fresh entry. Either way this class is final.
        for method in &node.virtual_methods {
            table.insert(method.clone(), BTreeSet::from([class.to_string()]));
        }

        self.memo.insert(class.to_string(), table.clone());
        table
    }
}

/// Consumes class declarations and enriches call graphs with member,
/// override and dispatch information.
#[derive(Debug, Clone, Default)]
pub struct ClassHierarchyResolver {
    strictness: OverrideStrictness,
}

impl ClassHierarchyResolver {
    pub fn new(strictness: OverrideStrictness) -> Self {
        Self { strictness }
    }

    pub fn from_config(config: &ResolutionConfig) -> Self {
        Self::new(config.effective_override_strictness())
    }

    pub fn strictness(&self) -> OverrideStrictness {
        self.strictness
    }

    /// Collects the classes declared in one translation unit.
    pub fn analyze(&self, unit: &TranslationUnit) -> ClassHierarchy {
        collector::collect_classes(unit)
    }

    /// For every class and each direct base, marks same-named compatible
    /// methods as overrides and inherits their virtual-ness. Runs to a
    /// fixed point so deep chains propagate. Returns overrides recorded.
    pub fn resolve_overrides(&self, hierarchy: &mut ClassHierarchy) -> usize {
        let mut recorded = 0;
        let names: Vec<String> = hierarchy.names().cloned().collect();
        // Bounded by the class count: each round can only propagate one level.
        for _ in 0..=names.len() {
            let mut found = Vec::new();
            for class in &names {
                let Some(node) = hierarchy.get(class) else {
                    continue;
                };
                for base in &node.base_classes {
                    let Some(base_node) = hierarchy.get(base) else {
                        continue;
                    };
                    for method in &base_node.virtual_methods {
                        let Some(derived_sig) = node.method_signatures.get(method) else {
                            continue;
                        };
                        let compatible = match base_node.method_signatures.get(method) {
                            Some(base_sig) => match self.strictness {
                                OverrideStrictness::Arity => base_sig.arity() == derived_sig.arity(),
                                OverrideStrictness::Signature => base_sig.matches_exactly(derived_sig),
                            },
                            // Virtual-ness inherited without a visible declaration.
                            None => true,
                        };
                        let already = node
                            .overridden_methods
                            .get(method)
                            .is_some_and(|b| b.contains(base));
                        if compatible && !already {
                            found.push((class.clone(), method.clone(), base.clone()));
                        }
                    }
                }
            }
            if found.is_empty() {
                break;
            }
            for (class, method, base) in found {
                if let Some(node) = hierarchy.get_mut(&class) {
                    node.overridden_methods
                        .entry(method.clone())
                        .or_default()
                        .insert(base);
                    node.virtual_methods.insert(method);
                    recorded += 1;
                }
            }
        }
        debug!(recorded, strictness = ?self.strictness, "override resolution complete");
        recorded
    }

    /// Virtual method table of one class. See `VtableBuilder` for bulk use.
    pub fn vtable(&self, hierarchy: &ClassHierarchy, class: &str) -> Vtable {
        VtableBuilder::new(hierarchy).vtable(class)
    }

    /// Candidate implementations of `base::method` over the derived-class
    /// closure, sorted. Classes where the method is declared pure are
    /// skipped. Falls back to the static name when nothing polymorphic
    /// is known.
    pub fn resolve_virtual_call(
        &self,
        hierarchy: &ClassHierarchy,
        base: &str,
        method: &str,
    ) -> Vec<String> {
        let fallback = || vec![naming::join(base, method)];
        let Some(base_node) = hierarchy.get(base) else {
            return fallback();
        };
        if !base_node.virtual_methods.contains(method) {
            return fallback();
        }

        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut implementations = BTreeSet::new();
        visited.insert(base_node.name.as_str());
        queue.push_back(base_node.name.as_str());
        while let Some(current) = queue.pop_front() {
            let Some(node) = hierarchy.get(current) else {
                continue;
            };
            if node.virtual_methods.contains(method) && !node.is_pure(method) {
                implementations.insert(naming::join(current, method));
            }
            for derived in &node.derived_classes {
                if visited.insert(derived.as_str()) {
                    queue.push_back(derived.as_str());
                }
            }
        }

        if implementations.is_empty() {
            fallback()
        } else {
            implementations.into_iter().collect()
        }
    }

    /// Sets class linkage, ancestry, virtual-ness and overrides on every
    /// member function. Returns the number of records touched.
    pub fn enrich_function_model(&self, graph: &mut CallGraph, hierarchy: &ClassHierarchy) -> usize {
        let names: Vec<String> = graph.functions().keys().cloned().collect();
        let mut enriched = 0;
        for name in names {
            let Some(record) = graph.get_function_mut(&name) else {
                continue;
            };
            let class = match &record.class_name {
                Some(class) => hierarchy.resolve_name(class, &record.namespace),
                None => naming::qualifier(&name).and_then(|scope| {
                    let scope = naming::strip_template_args(scope);
                    hierarchy
                        .contains(&scope)
                        .then_some(scope)
                }),
            };
            let Some(class) = class else {
                continue;
            };
            let Some(node) = hierarchy.get(&class) else {
                continue;
            };

            let method = naming::base_name(&name);
            record.is_member = true;
            record.namespace = naming::qualifier(&class).unwrap_or("").to_string();
            record.class_hierarchy = hierarchy.ancestors(&class);
            if node.virtual_methods.contains(&method) {
                record.is_virtual = true;
                if let Some(bases) = node.overridden_methods.get(&method) {
                    for base in bases {
                        record.add_override(&naming::join(base, &method));
                    }
                }
            }
            record.class_name = Some(class);
            enriched += 1;
        }
        debug!(enriched, "function model enriched");
        enriched
    }

    /// Adds one edge per possible implementation for each call through a
    /// virtual method, keeping the static edge. Returns edges added.
    pub fn resolve_virtual_calls_in_graph(
        &self,
        graph: &mut CallGraph,
        hierarchy: &ClassHierarchy,
    ) -> usize {
        let mut expansions = Vec::new();
        for record in graph.records() {
            for callee in &record.calls {
                let Some(scope) = naming::qualifier(callee) else {
                    continue;
                };
                let Some(class) = hierarchy.resolve_name(scope, &record.namespace) else {
                    continue;
                };
                let method = naming::base_name(callee);
                let is_virtual = hierarchy
                    .get(&class)
                    .is_some_and(|n| n.virtual_methods.contains(&method));
                if !is_virtual {
                    continue;
                }
                for target in self.resolve_virtual_call(hierarchy, &class, &method) {
                    if &target != callee {
                        expansions.push((record.name.clone(), target));
                    }
                }
            }
        }

        let mut added = 0;
        for (caller, target) in expansions {
            if let Ok(true) = graph.add_call(&caller, &target) {
                added += 1;
            }
        }
        debug!(added, "virtual call edges expanded");
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::MethodSignature;

    fn sig(params: &[&str]) -> MethodSignature {
        MethodSignature {
            return_type: "double".to_string(),
            param_types: params.iter().map(|p| p.to_string()).collect(),
            is_const: true,
        }
    }

    #[test]
    fn arity_and_signature_strictness_differ() {
        let mut h = ClassHierarchy::new();
        let base = h.get_or_create("Base");
        base.declare_method("scale", sig(&["int"]));
        base.virtual_methods.insert("scale".to_string());
        let derived = h.get_or_create("Derived");
        derived.add_base("Base", "public");
        derived.declare_method("scale", sig(&["double"]));
        h.link_bases();

        let mut strict = h.clone();
        assert_eq!(
            ClassHierarchyResolver::new(OverrideStrictness::Signature).resolve_overrides(&mut strict),
            0
        );
        assert_eq!(
            ClassHierarchyResolver::new(OverrideStrictness::Arity).resolve_overrides(&mut h),
            1
        );
        assert!(h.get("Derived").unwrap().virtual_methods.contains("scale"));
    }

    #[test]
    fn overrides_propagate_through_chains() {
        let mut h = ClassHierarchy::new();
        let a = h.get_or_create("A");
        a.declare_method("f", sig(&[]));
        a.virtual_methods.insert("f".to_string());
        h.get_or_create("B").add_base("A", "public");
        let c = h.get_or_create("C");
        c.add_base("B", "public");
        c.declare_method("f", sig(&[]));
        let b = h.get_or_create("B");
        b.declare_method("f", sig(&[]));
        h.link_bases();

        let resolver = ClassHierarchyResolver::default();
        assert_eq!(resolver.resolve_overrides(&mut h), 2);
        assert!(h.get("C").unwrap().overridden_methods["f"].contains("B"));
        assert_eq!(resolver.resolve_overrides(&mut h), 0);
    }

    #[test]
    fn vtable_replaces_overridden_entries() {
        let mut h = ClassHierarchy::new();
        let shape = h.get_or_create("Shape");
        shape.declare_method("area", sig(&[]));
        shape.declare_method("name", sig(&[]));
        shape.virtual_methods.extend(["area".to_string(), "name".to_string()]);
        let circle = h.get_or_create("Circle");
        circle.add_base("Shape", "public");
        circle.declare_method("area", sig(&[]));
        h.link_bases();

        let resolver = ClassHierarchyResolver::default();
        resolver.resolve_overrides(&mut h);
        let table = resolver.vtable(&h, "Circle");
        assert_eq!(table["area"], BTreeSet::from(["Circle".to_string()]));
        assert_eq!(table["name"], BTreeSet::from(["Shape".to_string()]));
    }

    #[test]
    fn builder_memoizes_across_queries() {
        let mut h = ClassHierarchy::new();
        let base = h.get_or_create("Base");
        base.virtual_methods.insert("run".to_string());
        h.get_or_create("Left").add_base("Base", "public");
        h.get_or_create("Right").add_base("Base", "public");
        h.link_bases();

        let mut builder = VtableBuilder::new(&h);
        let left = builder.vtable("Left");
        let right = builder.vtable("Right");
        assert_eq!(left, right);
        assert_eq!(builder.memo.len(), 3);
    }
}
