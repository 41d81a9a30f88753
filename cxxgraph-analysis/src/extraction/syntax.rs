//! Small helpers over tree-sitter C++ nodes shared by the extractor and
//! the class collector.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::call_graph::naming;

static PURE_SPECIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"=\s*0\s*;?\s*$").unwrap());

/// Source text of `node`; empty if the range is not valid UTF-8.
pub fn text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    source.get(node.byte_range()).unwrap_or("")
}

/// Node text with whitespace collapsed.
pub fn normalized(node: Node<'_>, source: &str) -> String {
    naming::normalize_whitespace(text(node, source))
}

/// 1-based start line.
pub fn line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

pub fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

pub fn has_child_kind(node: Node<'_>, kind: &str) -> bool {
    children(node).iter().any(|c| c.kind() == kind)
}

/// First node of `kind` in pre-order, `node` included.
pub fn find_descendant<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == kind {
            return Some(current);
        }
        let mut kids = children(current);
        kids.reverse();
        stack.extend(kids);
    }
    None
}

/// Counts ERROR and MISSING nodes, skipping clean subtrees.
pub fn count_errors(root: Node<'_>) -> usize {
    if !root.has_error() {
        return 0;
    }
    let mut count = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            count += 1;
        }
        if node.has_error() {
            stack.extend(children(node));
        }
    }
    count
}

/// Collapses whitespace and canonicalizes template argument spacing:
/// `is_same< T,T >` becomes `is_same<T, T>`.
pub fn canonical_spelling(raw: &str) -> String {
    let collapsed = naming::normalize_whitespace(raw);
    let mut out = String::with_capacity(collapsed.len());
    let chars: Vec<char> = collapsed.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        match c {
            ' ' => {
                let prev = out.chars().last();
                let next = chars.get(i + 1).copied();
                let around_punct = matches!(prev, Some('<' | ',' | ':'))
                    || matches!(next, Some('<' | '>' | ',' | ':'));
                if !around_punct {
                    out.push(' ');
                }
            }
            ',' => out.push_str(", "),
            _ => out.push(c),
        }
    }
    // `, ` followed by a stripped space left a double space only if input had one.
    out.replace(",  ", ", ").replace(", >", ">")
}

/// `operator +` becomes `operator+`; `operator new` and conversion
/// operators keep their space.
pub fn canonical_operator(raw: &str) -> String {
    let collapsed = naming::normalize_whitespace(raw);
    let Some(pos) = naming::operator_start(&collapsed) else {
        return collapsed;
    };
    let (head, tail) = collapsed.split_at(pos);
    let rest = tail["operator".len()..].trim_start();
    let symbolic = rest.chars().next().is_some_and(|c| !(c.is_alphanumeric() || c == '_'));
    if symbolic {
        format!("{head}operator{}", rest.replace(' ', ""))
    } else {
        format!("{head}operator {rest}")
    }
}

/// Descends pointer/reference/parenthesized wrappers to the function
/// declarator, if there is one.
pub fn function_declarator(declarator: Node<'_>) -> Option<Node<'_>> {
    let mut current = declarator;
    loop {
        match current.kind() {
            "function_declarator" => return Some(current),
            "pointer_declarator" | "reference_declarator" | "parenthesized_declarator"
            | "attributed_declarator" | "init_declarator" => {
                current = current
                    .child_by_field_name("declarator")
                    .or_else(|| named_children(current).into_iter().last())?;
            }
            _ => return None,
        }
    }
}

/// `*`, `&` or `&&` contributed by declarator wrappers above `stop`.
pub fn declarator_suffix(declarator: Node<'_>, stop_kind: &str, source: &str) -> String {
    let mut suffix = String::new();
    let mut current = Some(declarator);
    while let Some(node) = current {
        if node.kind() == stop_kind || node.kind() == "identifier" || node.kind() == "field_identifier" {
            break;
        }
        match node.kind() {
            "pointer_declarator" | "abstract_pointer_declarator" => suffix.push('*'),
            "reference_declarator" | "abstract_reference_declarator" => {
                if text(node, source).trim_start().starts_with("&&") {
                    suffix.push_str("&&");
                } else {
                    suffix.push('&');
                }
            }
            _ => {}
        }
        current = node
            .child_by_field_name("declarator")
            .or_else(|| named_children(node).into_iter().last());
    }
    suffix
}

/// Identifier introduced by a declarator (`*p`, `&r`, `arr[3]`, `x = 1`).
pub fn declarator_identifier(declarator: Node<'_>, source: &str) -> Option<String> {
    let mut stack = vec![declarator];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "identifier" | "field_identifier" => return Some(text(node, source).to_string()),
            "parameter_list" | "argument_list" | "initializer_list" => continue,
            _ => {
                if let Some(inner) = node.child_by_field_name("declarator") {
                    stack.push(inner);
                } else {
                    let mut kids = named_children(node);
                    kids.reverse();
                    stack.extend(kids);
                }
            }
        }
    }
    None
}

/// Spelled name of a function declarator's `declarator` child.
pub fn declared_name(name_node: Node<'_>, source: &str) -> String {
    let raw = text(name_node, source);
    let spelled = if naming::operator_start(raw).is_some() {
        canonical_operator(raw)
    } else {
        canonical_spelling(raw)
    };
    spelled.trim_start_matches("::").replace("~ ", "~")
}

/// `(name, type)` per parameter. `(void)` yields nothing.
pub fn parameter_bindings(func_decl: Node<'_>, source: &str) -> Vec<(Option<String>, String)> {
    let Some(params) = func_decl.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut bindings = Vec::new();
    for param in named_children(params) {
        let variadic = match param.kind() {
            "parameter_declaration" | "optional_parameter_declaration" => false,
            "variadic_parameter_declaration" => true,
            _ => continue,
        };
        let base = leading_type(param, source);
        let declarator = param.child_by_field_name("declarator");
        let suffix = declarator
            .map(|d| declarator_suffix(d, "identifier", source))
            .unwrap_or_default();
        let name = declarator.and_then(|d| declarator_identifier(d, source));
        let mut ty = format!("{base}{suffix}");
        if variadic {
            ty.push_str("...");
        }
        bindings.push((name, ty));
    }
    if bindings.len() == 1 && bindings[0].0.is_none() && bindings[0].1 == "void" {
        bindings.clear();
    }
    bindings
}

pub fn parameter_types(func_decl: Node<'_>, source: &str) -> Vec<String> {
    parameter_bindings(func_decl, source)
        .into_iter()
        .map(|(_, ty)| ty)
        .collect()
}

/// The `type` field of a declaration with the cv-qualifiers spelled
/// before it: `const std::string`.
pub fn leading_type(decl: Node<'_>, source: &str) -> String {
    let Some(type_node) = decl.child_by_field_name("type") else {
        return String::new();
    };
    let mut spelled = String::new();
    for child in children(decl) {
        if child.start_byte() >= type_node.start_byte() {
            break;
        }
        if child.kind() == "type_qualifier" {
            spelled.push_str(text(child, source));
            spelled.push(' ');
        }
    }
    spelled.push_str(&normalized(type_node, source));
    spelled
}

/// `const` after the parameter list.
pub fn is_const_method(func_decl: Node<'_>, source: &str) -> bool {
    children(func_decl)
        .iter()
        .any(|c| c.kind() == "type_qualifier" && text(*c, source) == "const")
}

/// `override` / `final` specifiers on a function declarator.
pub fn virtual_specifiers(func_decl: Node<'_>, source: &str) -> Vec<String> {
    children(func_decl)
        .into_iter()
        .filter(|c| c.kind() == "virtual_specifier")
        .map(|c| text(c, source).to_string())
        .collect()
}

/// `static`, `inline`, `extern`... on a declaration.
pub fn storage_specifiers(decl: Node<'_>, source: &str) -> Vec<String> {
    children(decl)
        .into_iter()
        .filter(|c| c.kind() == "storage_class_specifier")
        .map(|c| text(c, source).to_string())
        .collect()
}

pub fn has_virtual_keyword(decl: Node<'_>) -> bool {
    has_child_kind(decl, "virtual")
}

pub fn is_explicit(decl: Node<'_>, source: &str) -> bool {
    children(decl)
        .iter()
        .any(|c| c.kind() == "explicit_function_specifier" && text(*c, source).starts_with("explicit"))
}

/// `virtual R f() = 0;`
pub fn is_pure_declaration(decl: Node<'_>, source: &str) -> bool {
    PURE_SPECIFIER.is_match(text(decl, source).trim_end())
}

/// Return type of a function declaration, including pointer/reference
/// wrappers and a trailing return type when the leading type is `auto`.
pub fn return_type(decl: Node<'_>, func_decl: Node<'_>, source: &str) -> String {
    let leading = leading_type(decl, source);
    if leading == "auto" {
        if let Some(trailing) = children(func_decl)
            .into_iter()
            .find(|c| c.kind() == "trailing_return_type")
        {
            return normalized(trailing, source)
                .trim_start_matches("->")
                .trim()
                .to_string();
        }
    }
    let suffix = decl
        .child_by_field_name("declarator")
        .map(|d| declarator_suffix(d, "function_declarator", source))
        .unwrap_or_default();
    format!("{leading}{suffix}")
}

/// Class name split into its template name and specialization arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassName {
    pub base: String,
    pub args: Option<Vec<String>>,
}

impl ClassName {
    /// `is_same<T, T>` or plain `Shape`.
    pub fn spelled(&self) -> String {
        match &self.args {
            Some(args) => format!("{}<{}>", self.base, args.join(", ")),
            None => self.base.clone(),
        }
    }
}

pub fn class_name(class_node: Node<'_>, source: &str) -> Option<ClassName> {
    let name = class_node.child_by_field_name("name")?;
    match name.kind() {
        "template_type" => {
            let base = name
                .child_by_field_name("name")
                .map(|n| canonical_spelling(text(n, source)))?;
            let args = name
                .child_by_field_name("arguments")
                .map(|a| template_arguments(a, source))
                .unwrap_or_default();
            Some(ClassName {
                base,
                args: Some(args),
            })
        }
        _ => Some(ClassName {
            base: canonical_spelling(text(name, source)),
            args: None,
        }),
    }
}

pub fn template_arguments(list: Node<'_>, source: &str) -> Vec<String> {
    named_children(list)
        .into_iter()
        .map(|a| canonical_spelling(text(a, source)))
        .collect()
}

/// Direct bases as `(spelled name without template args, access, virtual)`.
pub fn base_specifiers(class_node: Node<'_>, source: &str, default_access: &str) -> Vec<(String, String, bool)> {
    let Some(clause) = children(class_node)
        .into_iter()
        .find(|c| c.kind() == "base_class_clause")
    else {
        return Vec::new();
    };
    let mut bases = Vec::new();
    let mut access: Option<String> = None;
    let mut is_virtual = false;
    for child in children(clause) {
        match child.kind() {
            "access_specifier" => access = Some(text(child, source).trim().to_string()),
            "virtual" => is_virtual = true,
            "type_identifier" | "qualified_type_identifier" | "template_type" => {
                let spelled = naming::strip_template_args(&canonical_spelling(text(child, source)));
                bases.push((
                    spelled.trim_start_matches("::").to_string(),
                    access.take().unwrap_or_else(|| default_access.to_string()),
                    is_virtual,
                ));
                is_virtual = false;
            }
            _ => {}
        }
    }
    bases
}

/// Default member/base access for `class` vs `struct`/`union`.
pub fn default_access(class_node: Node<'_>) -> &'static str {
    if class_node.kind() == "class_specifier" {
        "private"
    } else {
        "public"
    }
}

/// Namespace name, or `None` for an anonymous namespace.
pub fn namespace_name(ns_node: Node<'_>, source: &str) -> Option<String> {
    ns_node
        .child_by_field_name("name")
        .map(|n| naming::normalize_whitespace(text(n, source)).replace(' ', ""))
        .filter(|n| !n.is_empty())
}
