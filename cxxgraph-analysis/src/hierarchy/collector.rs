//! Collects class declarations, bases and method declarations from one
//! translation unit.

use tree_sitter::Node;

use super::types::{ClassHierarchy, ClassNode, MethodSignature};
use crate::call_graph::naming;
use crate::extraction::syntax;
use crate::extraction::TranslationUnit;

/// Every class, struct and union with a body in `unit`, bases linked
/// within the unit.
pub fn collect_classes(unit: &TranslationUnit) -> ClassHierarchy {
    let mut collector = Collector {
        unit,
        hierarchy: ClassHierarchy::new(),
    };
    collector.visit_children(unit.root(), "", "", false);
    let mut hierarchy = collector.hierarchy;
    hierarchy.link_bases();
    hierarchy
}

struct Collector<'a> {
    unit: &'a TranslationUnit,
    hierarchy: ClassHierarchy,
}

impl<'a> Collector<'a> {
    fn source(&self) -> &'a str {
        &self.unit.source
    }

    fn visit_children(&mut self, node: Node<'a>, namespace: &str, enclosing: &str, templated: bool) {
        for child in syntax::named_children(node) {
            self.visit(child, namespace, enclosing, templated);
        }
    }

    /// `enclosing` is the namespace or the qualified outer class.
    fn visit(&mut self, node: Node<'a>, namespace: &str, enclosing: &str, templated: bool) {
        match node.kind() {
            "translation_unit" | "declaration_list" | "linkage_specification" | "preproc_if"
            | "preproc_ifdef" | "preproc_else" | "preproc_elif" | "preproc_elifdef" => {
                self.visit_children(node, namespace, enclosing, false)
            }
            "namespace_definition" => {
                let inner = match syntax::namespace_name(node, self.source()) {
                    Some(name) => naming::join(namespace, &name),
                    None => namespace.to_string(),
                };
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit_children(body, &inner, &inner, false);
                }
            }
            "template_declaration" => {
                for child in syntax::named_children(node) {
                    if child.kind() != "template_parameter_list" {
                        self.visit(child, namespace, enclosing, true);
                    }
                }
            }
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                self.visit_class(node, namespace, enclosing, templated)
            }
            "declaration" | "field_declaration" => {
                if let Some(ty) = node.child_by_field_name("type") {
                    if matches!(ty.kind(), "class_specifier" | "struct_specifier" | "union_specifier") {
                        self.visit_class(ty, namespace, enclosing, templated);
                    }
                }
            }
            _ => {}
        }
    }

    fn visit_class(&mut self, node: Node<'a>, namespace: &str, enclosing: &str, templated: bool) {
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let Some(name) = syntax::class_name(node, self.source()) else {
            return;
        };
        let qualified = naming::join(enclosing, &name.base);

        let mut class = ClassNode::new(qualified.clone());
        class.namespace = namespace.to_string();
        class.file_path = self.unit.path_str();
        class.line_number = syntax::line(node);
        class.is_struct = node.kind() == "struct_specifier";
        class.is_template = templated;
        for (base, access, _) in syntax::base_specifiers(node, self.source(), syntax::default_access(node)) {
            class.add_base(&base, &access);
        }

        for member in syntax::named_children(body) {
            match member.kind() {
                "field_declaration" | "declaration" | "function_definition" => {
                    self.declare_member(&mut class, member);
                }
                "template_declaration" => {
                    for inner in syntax::named_children(member) {
                        if matches!(inner.kind(), "field_declaration" | "declaration" | "function_definition") {
                            self.declare_member(&mut class, inner);
                        }
                    }
                }
                _ => {}
            }
        }
        self.hierarchy.insert(class);

        for member in syntax::named_children(body) {
            // Nested classes only; methods were handled above.
            if matches!(
                member.kind(),
                "field_declaration" | "declaration" | "template_declaration"
            ) {
                self.visit(member, namespace, &qualified, false);
            }
        }
    }

    /// Records a method declaration or in-class definition on `class`.
    fn declare_member(&self, class: &mut ClassNode, member: Node<'a>) {
        let source = self.source();
        let Some(func_decl) = member
            .child_by_field_name("declarator")
            .and_then(syntax::function_declarator)
        else {
            return;
        };
        let Some(name_node) = func_decl.child_by_field_name("declarator") else {
            return;
        };
        let method = naming::split_qualified(&syntax::declared_name(name_node, source))
            .1
            .to_string();
        if method.is_empty() {
            return;
        }

        let signature = MethodSignature {
            return_type: syntax::return_type(member, func_decl, source),
            param_types: syntax::parameter_types(func_decl, source),
            is_const: syntax::is_const_method(func_decl, source),
        };
        class.declare_method(&method, signature);

        let is_virtual = syntax::has_virtual_keyword(member)
            || !syntax::virtual_specifiers(func_decl, source).is_empty();
        if is_virtual {
            class.virtual_methods.insert(method.clone());
            if member.kind() != "function_definition" && syntax::is_pure_declaration(member, source) {
                class.pure_virtual_methods.insert(method);
            }
        }
    }
}
