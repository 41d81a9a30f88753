//! Class nodes and the hierarchy that owns them.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::call_graph::naming;

/// Declared shape of a method, used for override compatibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub return_type: String,
    pub param_types: Vec<String>,
    pub is_const: bool,
}

impl MethodSignature {
    pub fn arity(&self) -> usize {
        self.param_types.len()
    }

    /// Parameter types and const-ness agree after type normalization.
    pub fn matches_exactly(&self, other: &MethodSignature) -> bool {
        self.is_const == other.is_const
            && self.param_types.len() == other.param_types.len()
            && self
                .param_types
                .iter()
                .zip(&other.param_types)
                .all(|(a, b)| naming::normalize_type_token(a) == naming::normalize_type_token(b))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassNode {
    /// Namespace-qualified class name.
    pub name: String,
    pub namespace: String,
    pub file_path: String,
    pub line_number: u32,
    pub is_struct: bool,
    pub is_template: bool,
    pub base_classes: BTreeSet<String>,
    pub derived_classes: BTreeSet<String>,
    /// Base name to `public`/`protected`/`private`.
    pub base_class_access: BTreeMap<String, String>,
    pub virtual_methods: BTreeSet<String>,
    pub pure_virtual_methods: BTreeSet<String>,
    /// Method name to the bases it overrides.
    pub overridden_methods: BTreeMap<String, BTreeSet<String>>,
    /// First declaration wins for overloaded names.
    pub method_signatures: BTreeMap<String, MethodSignature>,
}

impl ClassNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn declares(&self, method: &str) -> bool {
        self.method_signatures.contains_key(method)
    }

    /// Records a method declaration; returns false for a repeated name.
    pub fn declare_method(&mut self, method: &str, signature: MethodSignature) -> bool {
        if self.method_signatures.contains_key(method) {
            return false;
        }
        self.method_signatures.insert(method.to_string(), signature);
        true
    }

    pub fn add_base(&mut self, base: &str, access: &str) {
        self.base_classes.insert(base.to_string());
        self.base_class_access
            .insert(base.to_string(), access.to_string());
    }

    /// True when `method` is declared pure here.
    pub fn is_pure(&self, method: &str) -> bool {
        self.pure_virtual_methods.contains(method)
    }

    pub fn merge_from(&mut self, other: &ClassNode) {
        if self.namespace.is_empty() {
            self.namespace.clone_from(&other.namespace);
        }
        if self.file_path.is_empty() {
            self.file_path.clone_from(&other.file_path);
            self.line_number = other.line_number;
        }
        self.is_struct |= other.is_struct;
        self.is_template |= other.is_template;
        self.base_classes.extend(other.base_classes.iter().cloned());
        self.derived_classes
            .extend(other.derived_classes.iter().cloned());
        for (base, access) in &other.base_class_access {
            self.base_class_access
                .entry(base.clone())
                .or_insert_with(|| access.clone());
        }
        self.virtual_methods
            .extend(other.virtual_methods.iter().cloned());
        self.pure_virtual_methods
            .extend(other.pure_virtual_methods.iter().cloned());
        for (method, bases) in &other.overridden_methods {
            self.overridden_methods
                .entry(method.clone())
                .or_default()
                .extend(bases.iter().cloned());
        }
        for (method, signature) in &other.method_signatures {
            self.method_signatures
                .entry(method.clone())
                .or_insert_with(|| signature.clone());
        }
    }
}

/// Owns every `ClassNode` of a compilation scope, keyed by qualified name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassHierarchy {
    classes: BTreeMap<String, ClassNode>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ClassNode> {
        self.classes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ClassNode> {
        self.classes.get_mut(name)
    }

    pub fn get_or_create(&mut self, name: &str) -> &mut ClassNode {
        self.classes
            .entry(name.to_string())
            .or_insert_with(|| ClassNode::new(name))
    }

    /// Inserts `node`, merging into an existing node of the same name.
    pub fn insert(&mut self, node: ClassNode) {
        match self.classes.get_mut(&node.name) {
            Some(existing) => existing.merge_from(&node),
            None => {
                self.classes.insert(node.name.clone(), node);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassNode> {
        self.classes.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.classes.keys()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn merge(&mut self, other: ClassHierarchy) {
        for (_, node) in other.classes {
            self.insert(node);
        }
    }

    /// Maps a spelled class reference to a known key: exact match, then the
    /// enclosing namespace chain of `context`, then a unique class with the
    /// same unqualified name.
    pub fn resolve_name(&self, spelled: &str, context: &str) -> Option<String> {
        let spelled = naming::strip_template_args(spelled);
        let spelled = spelled.trim_start_matches("::");
        if self.classes.contains_key(spelled) {
            return Some(spelled.to_string());
        }
        for scope in naming::scope_chain(context) {
            let candidate = naming::join(&scope, spelled);
            if self.classes.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        let base = naming::base_name(spelled);
        let mut matches = self
            .classes
            .keys()
            .filter(|k| naming::base_name(k) == base);
        match (matches.next(), matches.next()) {
            (Some(only), None) if spelled == base => Some(only.clone()),
            _ => None,
        }
    }

    /// Rewrites base references to known class keys and rebuilds
    /// `derived_classes`. Unknown bases (library types) stay as spelled.
    pub fn link_bases(&mut self) {
        let mut rewrites = Vec::new();
        for node in self.classes.values() {
            for base in &node.base_classes {
                let context = naming::qualifier(&node.name).unwrap_or("");
                if let Some(resolved) = self.resolve_name(base, context) {
                    if &resolved != base {
                        rewrites.push((node.name.clone(), base.clone(), resolved));
                    }
                }
            }
        }
        for (class, spelled, resolved) in rewrites {
            if let Some(node) = self.classes.get_mut(&class) {
                node.base_classes.remove(&spelled);
                node.base_classes.insert(resolved.clone());
                if let Some(access) = node.base_class_access.remove(&spelled) {
                    node.base_class_access.insert(resolved, access);
                }
            }
        }

        let links: Vec<(String, String)> = self
            .classes
            .values()
            .flat_map(|n| n.base_classes.iter().map(move |b| (b.clone(), n.name.clone())))
            .collect();
        for (base, derived) in links {
            if let Some(node) = self.classes.get_mut(&base) {
                node.derived_classes.insert(derived);
            }
        }
    }

    /// Transitive bases of `name`, nearest first. Terminates on cycles.
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        self.walk(name, |n| &n.base_classes)
    }

    /// Transitive derived classes of `name`, nearest first.
    pub fn descendants(&self, name: &str) -> Vec<String> {
        self.walk(name, |n| &n.derived_classes)
    }

    fn walk<'a>(&'a self, start: &str, next: impl Fn(&'a ClassNode) -> &'a BTreeSet<String>) -> Vec<String> {
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        visited.insert(start);
        if let Some(node) = self.classes.get(start) {
            queue.push_back(node.name.as_str());
        }
        while let Some(current) = queue.pop_front() {
            let Some(node) = self.classes.get(current) else {
                continue;
            };
            for neighbor in next(node) {
                if visited.insert(neighbor.as_str()) {
                    order.push(neighbor.clone());
                    queue.push_back(neighbor.as_str());
                }
            }
        }
        order
    }
}
