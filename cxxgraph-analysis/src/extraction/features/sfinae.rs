//! SFINAE and related compile-time selection techniques.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::call_graph::{FunctionRecord, Provenance};
use crate::extraction::syntax;

/// Technique name and the pattern that reveals it, in reporting order.
static TECHNIQUES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("enable_if", r"\benable_if(?:_t)?\s*<|\bEnable[Ii]f\s*<"),
        ("disable_if", r"\bdisable_if(?:_t)?\s*<|\bDisable[Ii]f\s*<"),
        ("void_t", r"\bvoid_t\s*<"),
        ("decltype", r"\bdecltype\s*\("),
        ("expression_sfinae", r"\bdecltype\s*\(\s*(?:std::)?declval\s*<"),
        ("is_detected", r"\bis_detected(?:_v|_t)?\s*<|\bdetected_(?:t|or)\s*<"),
        ("tag_dispatch", r"\b(?:true|false)_type\b"),
        ("std_conditional", r"\bconditional(?:_t)?\s*<"),
        ("if_constexpr", r"\bif\s+constexpr\b"),
        ("requires_clause", r"\brequires\b"),
        ("return_type_sfinae", r"\)\s*(?:const\s*)?(?:noexcept\s*)?->\s*(?:decltype|typename)\b"),
        ("member_detection", r"\bvoid_t\s*<[^;{}]*::(?:type|value_type|iterator)\b"),
        ("static_assertions", r"\bstatic_assert\s*\([^;]*\bis_(?:same|convertible)"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).unwrap()))
    .collect()
});

/// Techniques visible as syntax nodes.
fn structural_techniques(node: Node<'_>, source: &str) -> Vec<&'static str> {
    let mut found = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current.kind() {
            "requires_clause" => found.push("requires_clause"),
            "if_statement" if syntax::children(current).iter().any(|c| c.kind() == "constexpr") => {
                found.push("if_constexpr")
            }
            "trailing_return_type" => {
                if syntax::find_descendant(current, "decltype").is_some() {
                    found.push("decltype");
                    found.push("return_type_sfinae");
                }
            }
            "template_type" | "qualified_type_identifier" => {
                let spelled = syntax::text(current, source);
                if spelled.contains("enable_if") {
                    found.push("enable_if");
                }
                if spelled.contains("void_t") {
                    found.push("void_t");
                }
            }
            _ => {}
        }
        stack.extend(syntax::children(current));
    }
    found
}

/// Scans a template declaration. Non-templates are left alone.
pub fn detect(template_decl: Node<'_>, source: &str, record: &mut FunctionRecord) {
    if !record.is_template {
        return;
    }
    let structural = structural_techniques(template_decl, source);
    let text = syntax::text(template_decl, source);
    for (name, pattern) in TECHNIQUES.iter() {
        let provenance = if structural.contains(name) {
            Provenance::Structural
        } else if pattern.is_match(text) {
            Provenance::Heuristic
        } else {
            continue;
        };
        record.add_sfinae_technique(name);
        record.note_feature(format!("sfinae:{name}"), provenance);
    }
}
