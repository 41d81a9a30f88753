//! Function records and call-site evidence.

use std::collections::BTreeMap;
use std::fmt;

use cxxgraph_core::types::collections::SmallVec4;
use serde::{Deserialize, Serialize};

use super::naming;

/// Where a call edge or feature annotation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Read off a syntax tree node.
    Structural,
    /// Matched by a textual pattern.
    Heuristic,
}

impl Provenance {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Heuristic => "heuristic",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classification of a compile-time computation template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetafunctionKind {
    /// Exposes a static `value`.
    ValueTrait,
    /// Exposes a nested `type`.
    TypeTrait,
    /// Computes its `type` from another trait's `::type`.
    Transform,
    /// Exposes both `value` and `type`.
    MixedTrait,
}

impl MetafunctionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ValueTrait => "value_trait",
            Self::TypeTrait => "type_trait",
            Self::Transform => "transform",
            Self::MixedTrait => "mixed_trait",
        }
    }
}

impl fmt::Display for MetafunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Evidence recorded at one call site, used by scored resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Callee name as recorded (possibly unresolved).
    pub target: String,
    pub line: u32,
    /// Number of arguments, when the call was read structurally.
    pub arg_count: Option<usize>,
    /// Normalized argument type tokens (`int`, `string`, `?` when unknown).
    pub arg_types: SmallVec4<String>,
    /// Receiver type of a member call, or the caller's class.
    pub context_type: Option<String>,
    pub provenance: Provenance,
}

impl CallSite {
    pub fn structural(target: impl Into<String>, line: u32) -> Self {
        Self {
            target: target.into(),
            line,
            arg_count: None,
            arg_types: SmallVec4::new(),
            context_type: None,
            provenance: Provenance::Structural,
        }
    }

    pub fn heuristic(target: impl Into<String>, line: u32) -> Self {
        Self {
            provenance: Provenance::Heuristic,
            ..Self::structural(target, line)
        }
    }

    /// Argument type tokens joined with `|`, the key used for type clues.
    pub fn arg_type_key(&self) -> String {
        self.arg_types.join("|")
    }
}

/// One function, method, function template, class template or concept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionRecord {
    /// Qualified name: `ns::func`, `ns::Class::method`, `ns::tpl<Args>`.
    pub name: String,
    pub file_path: String,
    /// 1-based; 0 when unknown.
    pub line_number: u32,
    pub signature: String,
    /// Enclosing namespace, empty for the global namespace.
    pub namespace: String,
    pub return_type: String,
    pub param_types: SmallVec4<String>,
    pub access_specifier: Option<String>,

    /// Ordered-unique callee names.
    pub calls: Vec<String>,
    /// Ordered-unique caller names.
    pub called_by: Vec<String>,
    pub call_sites: Vec<CallSite>,

    pub is_definition: bool,
    pub is_virtual: bool,
    pub is_member: bool,
    pub is_const: bool,
    pub is_static: bool,
    pub is_constructor: bool,
    pub is_destructor: bool,
    pub is_operator: bool,
    pub is_inline: bool,
    pub is_explicit: bool,

    pub is_template: bool,
    pub template_params: Vec<String>,
    pub specializations: Vec<String>,
    pub partial_specialization: bool,
    pub primary_template: Option<String>,
    pub template_template_params: Vec<String>,
    pub has_variadic_templates: bool,
    pub variadic_template_param: Option<String>,
    pub has_fold_expression: bool,

    pub is_metafunction: bool,
    pub metafunction_kind: Option<MetafunctionKind>,
    pub has_sfinae: bool,
    pub sfinae_techniques: Vec<String>,
    pub is_concept: bool,
    pub concept_requirements: Vec<String>,

    pub class_name: Option<String>,
    /// Base-qualified names (`Shape::area`) this method overrides.
    pub overrides: Vec<String>,
    /// Ancestor classes of `class_name`, nearest first.
    pub class_hierarchy: Vec<String>,

    /// Feature key (`sfinae:enable_if`, `variadic`, ...) to its source.
    pub feature_provenance: BTreeMap<String, Provenance>,
}

fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|v| v == value) {
        false
    } else {
        list.push(value.to_string());
        true
    }
}

fn union_into(list: &mut Vec<String>, incoming: &[String]) {
    for value in incoming {
        push_unique(list, value);
    }
}

impl FunctionRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Last name segment without template arguments.
    pub fn base_name(&self) -> String {
        naming::base_name(&self.name)
    }

    pub fn param_count(&self) -> usize {
        self.param_types.len()
    }

    /// Returns true when the callee was not already present.
    pub fn add_call(&mut self, callee: &str) -> bool {
        push_unique(&mut self.calls, callee)
    }

    pub fn add_caller(&mut self, caller: &str) -> bool {
        push_unique(&mut self.called_by, caller)
    }

    pub fn add_specialization(&mut self, name: &str) -> bool {
        push_unique(&mut self.specializations, name)
    }

    pub fn add_override(&mut self, base_method: &str) -> bool {
        push_unique(&mut self.overrides, base_method)
    }

    pub fn add_sfinae_technique(&mut self, technique: &str) -> bool {
        self.has_sfinae = true;
        push_unique(&mut self.sfinae_techniques, technique)
    }

    pub fn add_concept_requirement(&mut self, requirement: &str) -> bool {
        push_unique(&mut self.concept_requirements, requirement)
    }

    /// Records a feature's provenance. A structural sighting wins over a
    /// heuristic one.
    pub fn note_feature(&mut self, feature: impl Into<String>, provenance: Provenance) {
        let entry = self
            .feature_provenance
            .entry(feature.into())
            .or_insert(provenance);
        if provenance == Provenance::Structural {
            *entry = Provenance::Structural;
        }
    }

    /// Adds the call site and the matching edge.
    pub fn add_call_site(&mut self, site: CallSite) {
        self.add_call(&site.target);
        if !self.call_sites.contains(&site) {
            self.call_sites.push(site);
        }
    }

    /// Drops `from` from the callee list and points its call sites at `to`.
    pub fn replace_call(&mut self, from: &str, to: &str) -> bool {
        let before = self.calls.len();
        self.calls.retain(|c| c != from);
        let removed = self.calls.len() != before;
        if removed {
            self.add_call(to);
        }
        for site in self.call_sites.iter_mut().filter(|s| s.target == from) {
            site.target = to.to_string();
        }
        removed
    }

    pub fn remove_caller(&mut self, caller: &str) {
        self.called_by.retain(|c| c != caller);
    }

    /// Unions list fields and fills empty scalars from `other`; non-empty
    /// scalars on `self` are never overwritten.
    pub fn merge_from(&mut self, other: &FunctionRecord) {
        union_into(&mut self.calls, &other.calls);
        union_into(&mut self.called_by, &other.called_by);
        union_into(&mut self.specializations, &other.specializations);
        union_into(&mut self.overrides, &other.overrides);
        union_into(&mut self.template_params, &other.template_params);
        union_into(&mut self.template_template_params, &other.template_template_params);
        union_into(&mut self.sfinae_techniques, &other.sfinae_techniques);
        union_into(&mut self.concept_requirements, &other.concept_requirements);
        union_into(&mut self.class_hierarchy, &other.class_hierarchy);
        for site in &other.call_sites {
            if !self.call_sites.contains(site) {
                self.call_sites.push(site.clone());
            }
        }
        for (feature, provenance) in &other.feature_provenance {
            self.note_feature(feature.clone(), *provenance);
        }

        fill_str(&mut self.file_path, &other.file_path);
        fill_str(&mut self.signature, &other.signature);
        fill_str(&mut self.namespace, &other.namespace);
        fill_str(&mut self.return_type, &other.return_type);
        if self.line_number == 0 {
            self.line_number = other.line_number;
        }
        if self.param_types.is_empty() {
            self.param_types = other.param_types.clone();
        }
        fill_opt(&mut self.access_specifier, &other.access_specifier);
        fill_opt(&mut self.primary_template, &other.primary_template);
        fill_opt(&mut self.variadic_template_param, &other.variadic_template_param);
        fill_opt(&mut self.metafunction_kind, &other.metafunction_kind);
        fill_opt(&mut self.class_name, &other.class_name);

        self.is_definition |= other.is_definition;
        self.is_virtual |= other.is_virtual;
        self.is_member |= other.is_member;
        self.is_const |= other.is_const;
        self.is_static |= other.is_static;
        self.is_constructor |= other.is_constructor;
        self.is_destructor |= other.is_destructor;
        self.is_operator |= other.is_operator;
        self.is_inline |= other.is_inline;
        self.is_explicit |= other.is_explicit;
        self.is_template |= other.is_template;
        self.partial_specialization |= other.partial_specialization;
        self.has_variadic_templates |= other.has_variadic_templates;
        self.has_fold_expression |= other.has_fold_expression;
        self.is_metafunction |= other.is_metafunction;
        self.has_sfinae |= other.has_sfinae;
        self.is_concept |= other.is_concept;
    }
}

fn fill_str(target: &mut String, incoming: &str) {
    if target.is_empty() && !incoming.is_empty() {
        *target = incoming.to_string();
    }
}

fn fill_opt<T: Clone>(target: &mut Option<T>, incoming: &Option<T>) {
    if target.is_none() {
        target.clone_from(incoming);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_helpers_are_duplicate_safe_and_ordered() {
        let mut record = FunctionRecord::new("main");
        assert!(record.add_call("b"));
        assert!(record.add_call("a"));
        assert!(!record.add_call("b"));
        assert_eq!(record.calls, vec!["b", "a"]);

        assert!(record.add_sfinae_technique("void_t"));
        assert!(!record.add_sfinae_technique("void_t"));
        assert!(record.has_sfinae);
    }

    #[test]
    fn merge_fills_empty_scalars_only() {
        let mut left = FunctionRecord::new("f");
        left.file_path = "a.cpp".to_string();
        left.add_call("g");

        let mut right = FunctionRecord::new("f");
        right.file_path = "b.cpp".to_string();
        right.signature = "void f()".to_string();
        right.line_number = 7;
        right.is_virtual = true;
        right.add_call("h");
        right.add_call("g");

        left.merge_from(&right);
        assert_eq!(left.file_path, "a.cpp");
        assert_eq!(left.signature, "void f()");
        assert_eq!(left.line_number, 7);
        assert!(left.is_virtual);
        assert_eq!(left.calls, vec!["g", "h"]);
    }

    #[test]
    fn replace_call_moves_call_sites() {
        let mut record = FunctionRecord::new("calculate");
        record.add_call_site(CallSite::structural("add", 3));
        assert!(record.replace_call("add", "math::add"));
        assert_eq!(record.calls, vec!["math::add"]);
        assert_eq!(record.call_sites[0].target, "math::add");
        assert!(!record.replace_call("add", "math::add"));
    }

    #[test]
    fn structural_provenance_wins() {
        let mut record = FunctionRecord::new("f");
        record.note_feature("variadic", Provenance::Heuristic);
        record.note_feature("variadic", Provenance::Structural);
        record.note_feature("variadic", Provenance::Heuristic);
        assert_eq!(record.feature_provenance["variadic"], Provenance::Structural);
    }
}
