//! C++20 concepts: concept definitions and the requirements placed on
//! templates.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use super::templates::TemplateInfo;
use crate::call_graph::{naming, FunctionRecord, Provenance};
use crate::extraction::frontend::FrontendCapabilities;
use crate::extraction::syntax;

static CONCEPT_DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bconcept\s+(\w+)\s*=\s*((?:[^;{}]|\{[^{}]*\})+);").unwrap());
static REQUIRES_CONCEPT_IDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\brequires\s+((?:[\w:]+\s*<[^<>;{}]*>)(?:\s*(?:&&|\|\|)\s*[\w:]+\s*<[^<>;{}]*>)*)")
        .unwrap()
});
static REQUIRES_EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\brequires\s*(\([^;{}]*\))\s*(?:[\w{]|$)").unwrap());

/// `(name, requirement)` for a `concept_definition` node.
pub fn concept_definition(node: Node<'_>, source: &str) -> Option<(String, String)> {
    let name = node.child_by_field_name("name").map(|n| syntax::text(n, source))?;
    // Named children are the concept name followed by its constraint.
    let requirement = syntax::named_children(node)
        .into_iter()
        .skip(1)
        .last()
        .map(|expr| syntax::normalized(expr, source))
        .unwrap_or_default();
    Some((name.to_string(), requirement))
}

/// Concept definitions read off text the grammar could not structure.
pub fn textual_concepts(text: &str) -> Vec<(String, String)> {
    CONCEPT_DEFINITION
        .captures_iter(text)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_string();
            let requirement = naming::normalize_whitespace(caps.get(2)?.as_str());
            Some((name, requirement))
        })
        .collect()
}

/// Builds the record for a concept named `qualified`.
pub fn concept_record(qualified: &str, requirement: &str, provenance: Provenance) -> FunctionRecord {
    let mut record = FunctionRecord::new(qualified);
    record.is_concept = true;
    record.is_template = true;
    record.is_definition = true;
    if !requirement.is_empty() {
        record.add_concept_requirement(requirement);
    }
    record.note_feature("concept", provenance);
    record
}

fn requires_clauses<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current.kind() {
            "requires_clause" => found.push(current),
            "compound_statement" | "field_declaration_list" => {}
            _ => stack.extend(syntax::children(current)),
        }
    }
    found.sort_by_key(|n| n.start_byte());
    found
}

/// Requirements on a template: constrained parameters and `requires`
/// clauses.
pub fn detect_requirements(
    template_decl: Node<'_>,
    info: &TemplateInfo,
    source: &str,
    caps: FrontendCapabilities,
    record: &mut FunctionRecord,
) {
    for constraint in info.constraints() {
        record.add_concept_requirement(&constraint);
        record.note_feature("concept_constraint", Provenance::Structural);
    }

    if caps.requires_clauses && !template_decl.has_error() {
        for clause in requires_clauses(template_decl) {
            let requirement = clause
                .child_by_field_name("constraint")
                .map(|c| syntax::normalized(c, source))
                .unwrap_or_else(|| {
                    syntax::normalized(clause, source)
                        .trim_start_matches("requires")
                        .trim()
                        .to_string()
                });
            if !requirement.is_empty() {
                record.add_concept_requirement(&requirement);
                record.note_feature("requires_clause", Provenance::Structural);
            }
        }
        return;
    }

    let text = syntax::text(template_decl, source);
    let header_end = text.find('{').unwrap_or(text.len());
    let header = &text[..header_end];
    for caps in REQUIRES_CONCEPT_IDS
        .captures_iter(header)
        .chain(REQUIRES_EXPRESSION.captures_iter(header))
    {
        if let Some(found) = caps.get(1) {
            record.add_concept_requirement(&naming::normalize_whitespace(found.as_str()));
            record.note_feature("requires_clause", Provenance::Heuristic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textual_concept_definitions() {
        let found = textual_concepts(
            "template <typename T>\nconcept Addable = requires(T a, T b) { a + b; };",
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "Addable");
        assert_eq!(found[0].1, "requires(T a, T b) { a + b; }");
    }

    #[test]
    fn textual_requires_clause() {
        let caps = REQUIRES_CONCEPT_IDS
            .captures("template <typename T> requires Addable<T> && Copyable<T> T sum(T a)")
            .and_then(|c| c.get(1).map(|m| m.as_str().to_string()));
        assert_eq!(caps.as_deref(), Some("Addable<T> && Copyable<T>"));
    }
}
