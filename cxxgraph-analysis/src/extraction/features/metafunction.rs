//! Type trait, value trait and transform classification for class
//! templates.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::call_graph::{FunctionRecord, MetafunctionKind, Provenance};
use crate::extraction::syntax;

const CONSTANT_BASES: &[&str] = &["true_type", "false_type", "integral_constant", "bool_constant"];

static VALUE_MEMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bstatic\s+(?:(?:constexpr|const|inline)\s+)*[\w:<>]+\s+value\s*[=;{]").unwrap()
});
static TYPE_MEMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\busing\s+type\s*=|\btypedef\b[^;]*\btype\s*;").unwrap());
static TRANSFORM_MEMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\busing\s+type\s*=[^;]*::type\b|\btypedef\b[^;]*::type\s+type\s*;").unwrap()
});
static CONSTANT_BASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":\s*(?:public\s+)?(?:std::)?(?:true_type|false_type|integral_constant|bool_constant)\b")
        .unwrap()
});

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Traits {
    value: bool,
    ty: bool,
    transform: bool,
}

impl Traits {
    fn kind(&self) -> Option<MetafunctionKind> {
        match (self.value, self.ty, self.transform) {
            (true, true, _) => Some(MetafunctionKind::MixedTrait),
            (_, _, true) => Some(MetafunctionKind::Transform),
            (false, true, false) => Some(MetafunctionKind::TypeTrait),
            (true, false, false) => Some(MetafunctionKind::ValueTrait),
            (false, false, false) => None,
        }
    }
}

fn structural_traits(class_node: Node<'_>, body: Node<'_>, source: &str) -> Traits {
    let mut traits = Traits::default();
    for member in syntax::named_children(body) {
        match member.kind() {
            "field_declaration" => {
                let is_static = syntax::storage_specifiers(member, source)
                    .iter()
                    .any(|s| s == "static");
                let named_value = member
                    .child_by_field_name("declarator")
                    .and_then(|d| syntax::declarator_identifier(d, source))
                    .is_some_and(|n| n == "value");
                traits.value |= is_static && named_value;
            }
            "alias_declaration" => {
                let named_type = member
                    .child_by_field_name("name")
                    .is_some_and(|n| syntax::text(n, source) == "type");
                if named_type {
                    traits.ty = true;
                    let aliased = member
                        .child_by_field_name("type")
                        .map(|t| syntax::text(t, source))
                        .unwrap_or("");
                    traits.transform |= aliased.contains("::type");
                }
            }
            "type_definition" => {
                let named_type = member
                    .child_by_field_name("declarator")
                    .is_some_and(|d| syntax::text(d, source) == "type");
                if named_type {
                    traits.ty = true;
                    let aliased = member
                        .child_by_field_name("type")
                        .map(|t| syntax::text(t, source))
                        .unwrap_or("");
                    traits.transform |= aliased.contains("::type");
                }
            }
            _ => {}
        }
    }
    let derives_constant = syntax::base_specifiers(class_node, source, "public")
        .iter()
        .any(|(base, _, _)| CONSTANT_BASES.contains(&base.trim_start_matches("std::")));
    traits.value |= derives_constant;
    traits
}

fn textual_traits(text: &str) -> Traits {
    Traits {
        value: VALUE_MEMBER.is_match(text) || CONSTANT_BASE.is_match(text),
        ty: TYPE_MEMBER.is_match(text),
        transform: TRANSFORM_MEMBER.is_match(text),
    }
}

/// Classifies a class template with a body. Damaged bodies are read
/// textually.
pub fn detect(class_node: Node<'_>, body: Node<'_>, source: &str, record: &mut FunctionRecord) {
    let (traits, provenance) = if class_node.has_error() {
        (textual_traits(syntax::text(class_node, source)), Provenance::Heuristic)
    } else {
        (structural_traits(class_node, body, source), Provenance::Structural)
    };
    if let Some(kind) = traits.kind() {
        record.is_metafunction = true;
        record.metafunction_kind = Some(kind);
        record.note_feature("metafunction", provenance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table() {
        let t = |value, ty, transform| Traits { value, ty, transform }.kind();
        assert_eq!(t(true, false, false), Some(MetafunctionKind::ValueTrait));
        assert_eq!(t(false, true, false), Some(MetafunctionKind::TypeTrait));
        assert_eq!(t(false, true, true), Some(MetafunctionKind::Transform));
        assert_eq!(t(true, true, false), Some(MetafunctionKind::MixedTrait));
        assert_eq!(t(false, false, false), None);
    }

    #[test]
    fn textual_reading() {
        let traits = textual_traits(
            "template <typename T> struct add_ptr { using type = typename base<T>::type*; };",
        );
        assert!(traits.ty && traits.transform && !traits.value);
        let traits = textual_traits("template <typename T> struct is_ptr : std::false_type {};");
        assert_eq!(traits.kind(), Some(MetafunctionKind::ValueTrait));
        let traits = textual_traits("struct size_of { static constexpr int value = 4; };");
        assert_eq!(traits.kind(), Some(MetafunctionKind::ValueTrait));
    }
}
