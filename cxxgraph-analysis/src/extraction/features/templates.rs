use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::call_graph::{FunctionRecord, Provenance};
use crate::extraction::frontend::FrontendCapabilities;
use crate::extraction::syntax;

static TEMPLATE_TEMPLATE_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"template\s*<[^<>]*>\s*(?:class|typename)\s*(?:\.\.\.\s*)?(\w+)").unwrap()
});
static PACK_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:typename|class|\w+)\s*\.\.\.\s*(\w+)").unwrap());
static FOLD_EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\(\s*\.\.\.\s*(?:<<|>>|&&|\|\||[-+*/%^&|<>=!]=?|,)|(?:<<|>>|&&|\|\||[-+*/%^&|<>=!]=?|,)\s*\.\.\.\s*\)",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateParamKind {
    Type,
    NonType,
    TemplateTemplate,
    TypePack,
    ValuePack,
}

impl TemplateParamKind {
    pub fn is_pack(&self) -> bool {
        matches!(self, Self::TypePack | Self::ValuePack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParam {
    pub name: String,
    pub kind: TemplateParamKind,
    /// Concept named in place of `typename`: `Addable` in `Addable T`.
    pub constraint: Option<String>,
    pub provenance: Provenance,
}

/// Parameters of one `template <...>` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateInfo {
    pub params: Vec<TemplateParam>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecializationKind {
    /// `template <> struct X<int>`.
    Explicit,
    /// `template <typename T> struct X<T*>`.
    Partial,
}

impl TemplateInfo {
    pub fn parse(template_decl: Node<'_>, source: &str, caps: FrontendCapabilities) -> Self {
        let mut info = Self::default();
        let Some(list) = template_decl.child_by_field_name("parameters") else {
            return info;
        };
        for param in syntax::named_children(list) {
            if let Some(parsed) = parse_param(param, source) {
                info.push(parsed);
            }
        }

        let list_text = syntax::text(list, source);
        let damaged = list.has_error();
        if !caps.template_template_params || damaged {
            for caps in TEMPLATE_TEMPLATE_PARAM.captures_iter(list_text) {
                if let Some(name) = caps.get(1) {
                    info.push(heuristic(name.as_str(), TemplateParamKind::TemplateTemplate));
                }
            }
        }
        if !caps.variadic_params || damaged {
            for caps in PACK_PARAM.captures_iter(list_text) {
                if let Some(name) = caps.get(1) {
                    info.push(heuristic(name.as_str(), TemplateParamKind::TypePack));
                }
            }
        }
        info
    }

    fn push(&mut self, param: TemplateParam) {
        if let Some(existing) = self.params.iter_mut().find(|p| p.name == param.name) {
            // A textual sighting can only refine a plain parameter.
            let refines = matches!(existing.kind, TemplateParamKind::Type | TemplateParamKind::NonType)
                && !matches!(param.kind, TemplateParamKind::Type | TemplateParamKind::NonType);
            if refines {
                existing.kind = param.kind;
                existing.provenance = param.provenance;
            }
            return;
        }
        self.params.push(param);
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }

    pub fn template_template_params(&self) -> Vec<String> {
        self.params
            .iter()
            .filter(|p| p.kind == TemplateParamKind::TemplateTemplate)
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn pack(&self) -> Option<&TemplateParam> {
        self.params.iter().find(|p| p.kind.is_pack())
    }

    /// `Concept<T>` for every constrained parameter.
    pub fn constraints(&self) -> Vec<String> {
        self.params
            .iter()
            .filter_map(|p| p.constraint.as_ref().map(|c| format!("{c}<{}>", p.name)))
            .collect()
    }

    /// Template fields of `record`.
    pub fn apply(&self, record: &mut FunctionRecord) {
        record.is_template = true;
        for name in self.names() {
            if !record.template_params.contains(&name) {
                record.template_params.push(name);
            }
        }
        for param in self.params.iter().filter(|p| p.kind == TemplateParamKind::TemplateTemplate) {
            if !record.template_template_params.contains(&param.name) {
                record.template_template_params.push(param.name.clone());
            }
            record.note_feature("template_template_param", param.provenance);
        }
        if let Some(pack) = self.pack() {
            record.has_variadic_templates = true;
            record.variadic_template_param = Some(pack.name.clone());
            record.note_feature("variadic", pack.provenance);
        }
    }

    /// Classifies a declaration named with explicit template arguments.
    /// `args` is `None` for a primary template.
    pub fn classify_specialization(&self, args: Option<&[String]>) -> Option<SpecializationKind> {
        let args = args?;
        if self.params.is_empty() {
            return Some(SpecializationKind::Explicit);
        }
        // `template <typename T> struct X<T>` restates the primary.
        let restates_primary = args.len() == self.params.len()
            && args.iter().zip(&self.params).all(|(arg, param)| {
                *arg == param.name || param.kind.is_pack() && *arg == format!("{}...", param.name)
            });
        if restates_primary {
            None
        } else {
            Some(SpecializationKind::Partial)
        }
    }
}

fn heuristic(name: &str, kind: TemplateParamKind) -> TemplateParam {
    TemplateParam {
        name: name.to_string(),
        kind,
        constraint: None,
        provenance: Provenance::Heuristic,
    }
}

fn structural(name: String, kind: TemplateParamKind, constraint: Option<String>) -> TemplateParam {
    TemplateParam {
        name,
        kind,
        constraint,
        provenance: Provenance::Structural,
    }
}

fn last_type_identifier(node: Node<'_>, source: &str) -> Option<String> {
    syntax::named_children(node)
        .into_iter()
        .filter(|c| c.kind() == "type_identifier")
        .last()
        .map(|c| syntax::text(c, source).to_string())
}

fn parse_param(param: Node<'_>, source: &str) -> Option<TemplateParam> {
    match param.kind() {
        "type_parameter_declaration" => {
            let name = last_type_identifier(param, source)?;
            Some(structural(name, TemplateParamKind::Type, None))
        }
        "optional_type_parameter_declaration" => {
            let name = param
                .child_by_field_name("name")
                .map(|n| syntax::text(n, source).to_string())?;
            Some(structural(name, TemplateParamKind::Type, None))
        }
        "variadic_type_parameter_declaration" => {
            let name = last_type_identifier(param, source)?;
            Some(structural(name, TemplateParamKind::TypePack, None))
        }
        "parameter_declaration" | "optional_parameter_declaration" => {
            let name = param
                .child_by_field_name("declarator")
                .and_then(|d| syntax::declarator_identifier(d, source))?;
            // `Addable T` parses as a non-type parameter of type `Addable`.
            let constraint = param
                .child_by_field_name("type")
                .filter(|t| matches!(t.kind(), "type_identifier" | "qualified_type_identifier"))
                .map(|t| syntax::normalized(t, source));
            let kind = if constraint.is_some() {
                TemplateParamKind::Type
            } else {
                TemplateParamKind::NonType
            };
            Some(structural(name, kind, constraint))
        }
        "variadic_parameter_declaration" => {
            let name = param
                .child_by_field_name("declarator")
                .and_then(|d| syntax::declarator_identifier(d, source))?;
            let constrained = param
                .child_by_field_name("type")
                .is_some_and(|t| matches!(t.kind(), "type_identifier" | "qualified_type_identifier"));
            let kind = if constrained {
                TemplateParamKind::TypePack
            } else {
                TemplateParamKind::ValuePack
            };
            Some(structural(name, kind, None))
        }
        "template_template_parameter_declaration" => {
            let inner = syntax::named_children(param)
                .into_iter()
                .filter(|c| c.kind() != "template_parameter_list")
                .last()?;
            let name = parse_param(inner, source)?.name;
            Some(structural(name, TemplateParamKind::TemplateTemplate, None))
        }
        _ => None,
    }
}

/// Fold expressions in a template body: `(args + ...)`.
pub fn detect_fold(body: Node<'_>, source: &str, caps: FrontendCapabilities, record: &mut FunctionRecord) {
    if caps.fold_expressions && syntax::find_descendant(body, "fold_expression").is_some() {
        record.has_fold_expression = true;
        record.note_feature("fold_expression", Provenance::Structural);
    } else if (!caps.fold_expressions || body.has_error())
        && FOLD_EXPRESSION.is_match(syntax::text(body, source))
    {
        record.has_fold_expression = true;
        record.note_feature("fold_expression", Provenance::Heuristic);
    }
}
