//! Call-site extraction for one function body: a structural pass over
//! `call_expression` nodes, then a textual pass that only fills gaps.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use super::frontend::FrontendCapabilities;
use super::syntax;
use crate::call_graph::naming;
use crate::call_graph::CallSite;

static QUALIFIED_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"((?:\w+::)+)(~?\w+)\s*\(").unwrap());
// `regex` has no lookaround: the leading group stands in for `(?<![:\w])`
// and the opening parenthesis is checked by `followed_by_paren`.
static PLAIN_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|[^:\w])(\w+)").unwrap());

const NOT_CALLS: &[&str] = &[
    "if", "for", "while", "switch", "return", "sizeof", "catch", "alignof", "alignas",
    "decltype", "typeid", "noexcept", "static_assert", "static_cast", "dynamic_cast",
    "const_cast", "reinterpret_cast", "new", "delete", "throw", "case", "do", "else",
    "requires", "co_await", "co_return", "co_yield", "defined", "operator", "template",
];

const PRIMITIVES: &[&str] = &[
    "void", "bool", "char", "short", "int", "long", "float", "double", "unsigned", "signed",
    "auto", "size_t", "wchar_t", "char8_t", "char16_t", "char32_t",
];

const SMART_POINTERS: &[&str] = &["unique_ptr", "shared_ptr", "weak_ptr"];

/// Variable name to spelled type for one function: parameters and
/// block-scope declarations.
#[derive(Debug, Default, Clone)]
pub struct LocalSymbols {
    types: BTreeMap<String, String>,
}

impl LocalSymbols {
    pub fn collect(func_decl: Node<'_>, body: Option<Node<'_>>, source: &str) -> Self {
        let mut symbols = Self::default();
        for (name, ty) in syntax::parameter_bindings(func_decl, source) {
            if let Some(name) = name {
                symbols.types.insert(name, ty);
            }
        }
        let Some(body) = body else {
            return symbols;
        };
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            if node.kind() == "declaration" {
                let base = syntax::leading_type(node, source);
                let mut cursor = node.walk();
                for declarator in node.children_by_field_name("declarator", &mut cursor) {
                    if let Some(name) = syntax::declarator_identifier(declarator, source) {
                        let suffix = syntax::declarator_suffix(declarator, "identifier", source);
                        symbols.types.insert(name, format!("{base}{suffix}"));
                    }
                }
            }
            // Lambdas have their own scope.
            if node.kind() != "lambda_expression" {
                stack.extend(syntax::named_children(node));
            }
        }
        symbols
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: impl Into<String>) {
        self.types.insert(name.into(), ty.into());
    }

    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.types.get(name).map(String::as_str)
    }
}

/// Class a receiver of spelled type `spelled` dispatches on. Smart
/// pointers unwrap to their pointee; primitives and `std::` types give
/// `None`.
pub fn receiver_class(spelled: &str) -> Option<String> {
    let cleaned = spelled
        .replace(['&', '*'], " ")
        .split_whitespace()
        .filter(|w| !matches!(*w, "const" | "volatile" | "struct" | "class" | "typename"))
        .collect::<Vec<_>>()
        .join(" ");
    let cleaned = cleaned.trim_start_matches("::");
    if cleaned.is_empty() || PRIMITIVES.contains(&cleaned) {
        return None;
    }
    let outer = naming::strip_template_args(cleaned);
    let outer_base = outer.trim_start_matches("std::");
    if SMART_POINTERS.contains(&outer_base) {
        return first_template_arg(cleaned).and_then(|inner| receiver_class(&inner));
    }
    if outer.starts_with("std::") || PRIMITIVES.contains(&outer.as_str()) {
        return None;
    }
    Some(outer)
}

fn first_template_arg(spelled: &str) -> Option<String> {
    let open = spelled.find('<')?;
    let mut depth = 0usize;
    for (offset, c) in spelled[open..].char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth == 0 {
                    return Some(spelled[open + 1..open + offset].trim().to_string());
                }
            }
            ',' if depth == 1 => return Some(spelled[open + 1..open + offset].trim().to_string()),
            _ => {}
        }
    }
    None
}

/// Best-effort type token for one call argument.
pub fn infer_arg_type(arg: Node<'_>, source: &str, symbols: &LocalSymbols) -> String {
    let text = syntax::text(arg, source);
    match arg.kind() {
        "number_literal" => {
            let lower = text.to_ascii_lowercase();
            let hex = lower.starts_with("0x");
            if !hex && (lower.contains('.') || lower.contains('e')) {
                if lower.ends_with('f') {
                    "float".into()
                } else {
                    "double".into()
                }
            } else {
                "int".into()
            }
        }
        "string_literal" | "raw_string_literal" | "concatenated_string" => "string".into(),
        "char_literal" => "char".into(),
        "true" | "false" => "bool".into(),
        "null" | "nullptr" => "nullptr_t".into(),
        "identifier" => symbols
            .type_of(text)
            .map(naming::normalize_type_token)
            .unwrap_or_else(|| "?".into()),
        _ => "?".into(),
    }
}

/// Scans a function body for call sites.
pub struct CallCollector<'a> {
    source: &'a str,
    symbols: &'a LocalSymbols,
    caller_class: Option<&'a str>,
    capabilities: FrontendCapabilities,
    textual: bool,
    template_params: &'a [String],
}

impl<'a> CallCollector<'a> {
    pub fn new(
        source: &'a str,
        symbols: &'a LocalSymbols,
        caller_class: Option<&'a str>,
        capabilities: FrontendCapabilities,
        textual_fallback: bool,
    ) -> Self {
        Self {
            source,
            symbols,
            caller_class,
            capabilities,
            // Without member-call nodes the textual pass is the only way to see `obj.m()`.
            textual: textual_fallback || !capabilities.member_calls,
            template_params: &[],
        }
    }

    /// Template parameters in scope. `T()` and `T(x)` construct a value of
    /// the parameter type and are not calls.
    pub fn with_template_params(mut self, params: &'a [String]) -> Self {
        self.template_params = params;
        self
    }

    fn names_template_param(&self, target: &str) -> bool {
        self.template_params.iter().any(|p| p == target)
    }

    /// Structural sites first, in source order, then heuristic gap fills.
    pub fn collect(&self, body: Node<'_>) -> Vec<CallSite> {
        let mut sites = self.structural(body);
        if self.textual {
            let seen: BTreeSet<String> = sites
                .iter()
                .flat_map(|s| [s.target.clone(), naming::base_name(&s.target)])
                .collect();
            sites.extend(self.textual_pass(body, &seen));
        }
        sites
    }

    fn structural(&self, body: Node<'_>) -> Vec<CallSite> {
        let mut sites = Vec::new();
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            if node.kind() == "call_expression" {
                if let Some(site) = self.call_site(node) {
                    sites.push(site);
                }
            }
            let mut kids = syntax::children(node);
            kids.reverse();
            stack.extend(kids);
        }
        sites
    }

    fn call_site(&self, call: Node<'_>) -> Option<CallSite> {
        let function = call.child_by_field_name("function")?;
        let (target, receiver) = match function.kind() {
            "identifier" | "qualified_identifier" | "template_function" => {
                let spelled = syntax::declared_name(function, self.source);
                (spelled, None)
            }
            "field_expression" if self.capabilities.member_calls => {
                let field = function.child_by_field_name("field")?;
                let method = syntax::declared_name(field, self.source);
                let receiver = function
                    .child_by_field_name("argument")
                    .and_then(|arg| self.receiver_of(arg));
                match &receiver {
                    Some(class) => (naming::join(class, &method), receiver.clone()),
                    None => (method, None),
                }
            }
            _ => return None,
        };
        if target.is_empty() || self.names_template_param(&target) {
            return None;
        }

        let mut site = CallSite::structural(target, syntax::line(call));
        if let Some(args) = call.child_by_field_name("arguments") {
            let args = syntax::named_children(args);
            site.arg_count = Some(args.len());
            site.arg_types = args
                .iter()
                .map(|a| infer_arg_type(*a, self.source, self.symbols))
                .collect();
        }
        site.context_type = receiver.or_else(|| self.caller_class.map(str::to_string));
        Some(site)
    }

    fn receiver_of(&self, argument: Node<'_>) -> Option<String> {
        match argument.kind() {
            "this" => self.caller_class.map(str::to_string),
            "identifier" => self
                .symbols
                .type_of(syntax::text(argument, self.source))
                .and_then(receiver_class),
            "pointer_expression" | "parenthesized_expression" => syntax::named_children(argument)
                .into_iter()
                .last()
                .and_then(|inner| self.receiver_of(inner)),
            _ => None,
        }
    }

    fn textual_pass(&self, body: Node<'_>, seen: &BTreeSet<String>) -> Vec<CallSite> {
        let text = blank_literals(body, self.source);
        let first_line = syntax::line(body);
        let line_at = |offset: usize| first_line + text[..offset].matches('\n').count() as u32;

        let mut recorded: BTreeSet<String> = BTreeSet::new();
        let mut sites = Vec::new();
        let mut push = |target: String, offset: usize| {
            let base = naming::base_name(&target);
            if seen.contains(&target) || seen.contains(&base) || !recorded.insert(target.clone()) {
                return;
            }
            sites.push(CallSite::heuristic(target, line_at(offset)));
        };

        for caps in QUALIFIED_CALL.captures_iter(&text) {
            let (Some(scope), Some(name)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if NOT_CALLS.contains(&name.as_str()) || self.names_template_param(name.as_str()) {
                continue;
            }
            let target = format!("{}{}", scope.as_str(), name.as_str());
            push(target, scope.start());
        }
        for caps in PLAIN_CALL.captures_iter(&text) {
            let Some(name) = caps.get(1) else {
                continue;
            };
            let word = name.as_str();
            if !followed_by_paren(&text, name.end())
                || NOT_CALLS.contains(&word)
                || PRIMITIVES.contains(&word)
                || self.names_template_param(word)
                // `Widget w(3);` declares `w`, it does not call it.
                || self.symbols.type_of(word).is_some()
                || word.chars().next().is_some_and(|c| c.is_ascii_digit())
            {
                continue;
            }
            push(word.to_string(), name.start());
        }
        sites
    }
}

fn followed_by_paren(text: &str, offset: usize) -> bool {
    text[offset..].trim_start().starts_with('(')
}

/// Body text with comments and literals replaced by spaces, newlines kept.
fn blank_literals(body: Node<'_>, source: &str) -> String {
    let start = body.start_byte();
    let mut bytes = syntax::text(body, source).as_bytes().to_vec();
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "comment" | "string_literal" | "raw_string_literal" | "char_literal" => {
                let range = node.start_byte().saturating_sub(start)..node.end_byte().saturating_sub(start);
                for b in bytes.get_mut(range).into_iter().flatten() {
                    if *b != b'\n' {
                        *b = b' ';
                    }
                }
            }
            _ => stack.extend(syntax::children(node)),
        }
    }
    // Blanked ranges cover whole characters.
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_class_unwraps_pointers_and_smart_pointers() {
        assert_eq!(receiver_class("const Shape &").as_deref(), Some("Shape"));
        assert_eq!(receiver_class("geo::Circle*").as_deref(), Some("geo::Circle"));
        assert_eq!(
            receiver_class("std::unique_ptr<geo::Shape>").as_deref(),
            Some("geo::Shape")
        );
        assert_eq!(receiver_class("Box<int>").as_deref(), Some("Box"));
        assert_eq!(receiver_class("int"), None);
        assert_eq!(receiver_class("auto&"), None);
        assert_eq!(receiver_class("std::vector<int>"), None);
    }

    #[test]
    fn first_template_arg_respects_nesting() {
        assert_eq!(
            first_template_arg("map<pair<int, int>, string>").as_deref(),
            Some("pair<int, int>")
        );
        assert_eq!(first_template_arg("plain"), None);
    }

    #[test]
    fn plain_call_pattern_skips_qualified_and_member_prefixes() {
        let text = "a::b(1); c(2); x.d(e(3));";
        let names: Vec<_> = PLAIN_CALL
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .filter(|m| followed_by_paren(text, m.end()))
            .map(|m| m.as_str().to_string())
            .collect();
        assert_eq!(names, vec!["c", "d", "e"]);
    }
}
