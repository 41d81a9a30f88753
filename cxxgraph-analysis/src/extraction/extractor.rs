//! Per-file extraction: walks one translation unit and produces its
//! partial call graph.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use cxxgraph_core::config::AnalysisConfig;
use cxxgraph_core::errors::ParseError;
use tracing::{debug, warn};
use tree_sitter::Node;

use super::calls::{CallCollector, LocalSymbols};
use super::features::{concepts, metafunction, sfinae, templates, SpecializationKind, TemplateInfo};
use super::frontend::{CppFrontend, FrontendCapabilities, TranslationUnit};
use super::syntax;
use crate::call_graph::{naming, CallGraph, FunctionRecord, Provenance};

/// Extracts function records from C/C++ sources. Owns a parser, so each
/// worker thread needs its own extractor.
pub struct SourceExtractor {
    config: AnalysisConfig,
    frontend: CppFrontend,
    capabilities: FrontendCapabilities,
}

impl SourceExtractor {
    pub fn new(config: AnalysisConfig) -> Result<Self, ParseError> {
        let frontend = CppFrontend::new(config.effective_parse_timeout_ms())?;
        let capabilities = frontend.capabilities();
        Ok(Self {
            config,
            frontend,
            capabilities,
        })
    }

    /// Restricts the structural strategies to `capabilities`; features
    /// outside it use their textual strategy.
    pub fn with_capabilities(mut self, capabilities: FrontendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn capabilities(&self) -> FrontendCapabilities {
        self.capabilities
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Extracts `file`. Failures are logged and yield an empty graph.
    pub fn analyze(&mut self, file: &Path, include_dirs: &[PathBuf], compiler_args: &[String]) -> CallGraph {
        match self.try_analyze(file, include_dirs, compiler_args) {
            Ok(graph) => graph,
            Err(error) => {
                warn!(file = %file.display(), %error, "extraction failed");
                CallGraph::new()
            }
        }
    }

    pub fn try_analyze(
        &mut self,
        file: &Path,
        include_dirs: &[PathBuf],
        compiler_args: &[String],
    ) -> Result<CallGraph, ParseError> {
        let unit = self.parse_unit(file, include_dirs, compiler_args)?;
        Ok(self.extract(&unit))
    }

    /// Reads and parses `file`, enforcing the size limit.
    pub fn parse_unit(
        &mut self,
        file: &Path,
        include_dirs: &[PathBuf],
        compiler_args: &[String],
    ) -> Result<TranslationUnit, ParseError> {
        let unreadable = |e: std::io::Error| ParseError::FileUnreadable {
            path: file.to_path_buf(),
            message: e.to_string(),
        };
        let size = std::fs::metadata(file).map_err(unreadable)?.len();
        let limit = self.config.effective_max_file_size();
        if size > limit {
            return Err(ParseError::FileTooLarge {
                path: file.to_path_buf(),
                size,
                limit,
            });
        }
        let bytes = std::fs::read(file).map_err(unreadable)?;
        let source = String::from_utf8_lossy(&bytes).into_owned();
        self.frontend
            .translation_unit(file, source, include_dirs, compiler_args)
    }

    /// Extracts in-memory source as if read from `path`.
    pub fn analyze_source(&mut self, path: &Path, source: &str) -> Result<CallGraph, ParseError> {
        let unit = self
            .frontend
            .translation_unit(path, source.to_string(), &[], &[])?;
        Ok(self.extract(&unit))
    }

    /// Walks a parsed unit.
    pub fn extract(&self, unit: &TranslationUnit) -> CallGraph {
        let errors = unit.error_count();
        if errors > 0 {
            debug!(file = %unit.path.display(), errors, "syntax errors; extracting what parsed");
        }
        let mut walker = Walker {
            unit,
            config: &self.config,
            capabilities: self.capabilities,
            records: Vec::new(),
        };
        walker.visit_children(unit.root(), &Scope::default());
        let records = qualify_same_file_calls(walker.records);

        let mut graph = CallGraph::new();
        for record in records {
            graph.add_function(record);
        }
        graph.link_edges();
        graph.link_specializations();
        debug!(
            file = %unit.path.display(),
            functions = graph.len(),
            missing = graph.missing_functions().len(),
            "extracted"
        );
        graph
    }
}

#[derive(Debug, Clone, Default)]
struct Scope {
    namespace: String,
    class: Option<ClassScope>,
    /// Parameters of enclosing class templates.
    template_params: Vec<String>,
}

#[derive(Debug, Clone)]
struct ClassScope {
    /// Qualified spelling, template arguments included for specializations.
    qualified: String,
    access: String,
}

impl Scope {
    fn enclosing(&self) -> &str {
        self.class
            .as_ref()
            .map(|c| c.qualified.as_str())
            .unwrap_or(&self.namespace)
    }
}

/// The template header a declaration sits under.
struct TemplateContext<'t> {
    node: Node<'t>,
    info: TemplateInfo,
}

struct Walker<'a> {
    unit: &'a TranslationUnit,
    config: &'a AnalysisConfig,
    capabilities: FrontendCapabilities,
    records: Vec<FunctionRecord>,
}

impl<'a> Walker<'a> {
    fn source(&self) -> &'a str {
        &self.unit.source
    }

    fn visit_children(&mut self, node: Node<'a>, scope: &Scope) {
        for child in syntax::named_children(node) {
            self.visit(child, scope, None);
        }
    }

    fn visit(&mut self, node: Node<'a>, scope: &Scope, template: Option<&TemplateContext<'a>>) {
        match node.kind() {
            "translation_unit" | "declaration_list" | "linkage_specification" | "preproc_if"
            | "preproc_ifdef" | "preproc_else" | "preproc_elif" | "preproc_elifdef" => {
                self.visit_children(node, scope)
            }
            "namespace_definition" => self.visit_namespace(node, scope),
            "template_declaration" => self.visit_template(node, scope),
            "function_definition" => self.visit_function(node, scope, template),
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                self.visit_class(node, scope, template)
            }
            "declaration" | "field_declaration" => {
                if let Some(ty) = node.child_by_field_name("type") {
                    if matches!(ty.kind(), "class_specifier" | "struct_specifier" | "union_specifier") {
                        self.visit_class(ty, scope, template);
                    }
                }
            }
            "concept_definition" if self.capabilities.concepts => self.visit_concept(node, scope),
            _ => {}
        }
    }

    fn visit_namespace(&mut self, node: Node<'a>, scope: &Scope) {
        let inner = Scope {
            namespace: match syntax::namespace_name(node, self.source()) {
                Some(name) => naming::join(&scope.namespace, &name),
                None => scope.namespace.clone(),
            },
            class: None,
            template_params: Vec::new(),
        };
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children(body, &inner);
        }
    }

    fn visit_template(&mut self, node: Node<'a>, scope: &Scope) {
        let context = TemplateContext {
            node,
            info: TemplateInfo::parse(node, self.source(), self.capabilities),
        };
        let before = self.records.len();
        for child in syntax::named_children(node) {
            if !matches!(child.kind(), "template_parameter_list" | "requires_clause") {
                self.visit(child, scope, Some(&context));
            }
        }
        if self.records.len() == before && !self.capabilities.concepts {
            let text = syntax::text(node, self.source());
            for (name, requirement) in concepts::textual_concepts(text) {
                let qualified = naming::join(&scope.namespace, &name);
                let mut record = concepts::concept_record(&qualified, &requirement, Provenance::Heuristic);
                self.locate(&mut record, node, scope);
                record.template_params = context.info.names();
                self.records.push(record);
            }
        }
    }

    fn visit_concept(&mut self, node: Node<'a>, scope: &Scope) {
        let Some((name, requirement)) = concepts::concept_definition(node, self.source()) else {
            return;
        };
        let qualified = naming::join(&scope.namespace, &name);
        let mut record = concepts::concept_record(&qualified, &requirement, Provenance::Structural);
        let anchor = node.parent().filter(|p| p.kind() == "template_declaration").unwrap_or(node);
        self.locate(&mut record, anchor, scope);
        if anchor.kind() == "template_declaration" {
            let info = TemplateInfo::parse(anchor, self.source(), self.capabilities);
            record.template_params = info.names();
        }
        self.records.push(record);
    }

    fn locate(&self, record: &mut FunctionRecord, node: Node<'_>, scope: &Scope) {
        record.file_path = self.unit.path_str();
        record.line_number = syntax::line(node);
        record.namespace = scope.namespace.clone();
        record.signature = signature_text(node, self.source());
    }

    fn visit_class(&mut self, node: Node<'a>, scope: &Scope, template: Option<&TemplateContext<'a>>) {
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let Some(name) = syntax::class_name(node, self.source()) else {
            return;
        };
        let qualified = naming::join(scope.enclosing(), &name.spelled());

        if let Some(template) = template {
            if self.config.effective_analyze_templates() {
                let record = self.class_template_record(node, body, &qualified, &name, scope, template);
                self.records.push(record);
            }
        }

        let mut template_params = scope.template_params.clone();
        if let Some(template) = template {
            template_params.extend(template.info.names());
        }
        let mut access = syntax::default_access(node).to_string();
        for member in syntax::named_children(body) {
            if member.kind() == "access_specifier" {
                access = syntax::text(member, self.source()).trim().to_string();
                continue;
            }
            let inner = Scope {
                namespace: scope.namespace.clone(),
                class: Some(ClassScope {
                    qualified: qualified.clone(),
                    access: access.clone(),
                }),
                template_params: template_params.clone(),
            };
            self.visit(member, &inner, None);
        }
    }

    fn class_template_record(
        &self,
        node: Node<'a>,
        body: Node<'a>,
        qualified: &str,
        name: &syntax::ClassName,
        scope: &Scope,
        template: &TemplateContext<'a>,
    ) -> FunctionRecord {
        let source = self.source();
        let mut record = FunctionRecord::new(qualified);
        self.locate(&mut record, template.node, scope);
        record.signature = signature_text(node, source);
        record.is_definition = true;
        record.access_specifier = scope.class.as_ref().map(|c| c.access.clone());
        template.info.apply(&mut record);
        if let Some(kind) = template.info.classify_specialization(name.args.as_deref()) {
            record.partial_specialization = kind == SpecializationKind::Partial;
            record.primary_template = Some(naming::strip_template_args(qualified));
        }
        metafunction::detect(node, body, source, &mut record);
        sfinae::detect(template.node, source, &mut record);
        concepts::detect_requirements(template.node, &template.info, source, self.capabilities, &mut record);
        record
    }

    fn visit_function(&mut self, node: Node<'a>, scope: &Scope, template: Option<&TemplateContext<'a>>) {
        let source = self.source();
        let Some(func_decl) = node
            .child_by_field_name("declarator")
            .and_then(syntax::function_declarator)
        else {
            return;
        };
        let Some(name_node) = func_decl.child_by_field_name("declarator") else {
            return;
        };
        let spelled = syntax::declared_name(name_node, source);
        if spelled.is_empty() {
            return;
        }

        let out_of_line = scope.class.is_none() && naming::qualifier(&spelled).is_some();
        let qualified = match &scope.class {
            Some(class) => naming::join(&class.qualified, &spelled),
            None if out_of_line => naming::join(&scope.namespace, &strip_scope_args(&spelled)),
            None => naming::join(&scope.namespace, &spelled),
        };
        let owner = match &scope.class {
            Some(class) => Some(class.qualified.clone()),
            None if out_of_line => naming::qualifier(&qualified).map(str::to_string),
            None => None,
        };

        let mut record = FunctionRecord::new(qualified.clone());
        self.locate(&mut record, node, scope);
        record.is_definition = true;
        record.return_type = syntax::return_type(node, func_decl, source);
        record.param_types = syntax::parameter_types(func_decl, source).into_iter().collect();
        record.access_specifier = scope.class.as_ref().map(|c| c.access.clone());
        record.is_member = scope.class.is_some();
        record.class_name = scope
            .class
            .as_ref()
            .map(|c| naming::strip_template_args(&c.qualified));
        record.is_virtual = syntax::has_virtual_keyword(node)
            || !syntax::virtual_specifiers(func_decl, source).is_empty();
        record.is_const = syntax::is_const_method(func_decl, source);
        let storage = syntax::storage_specifiers(node, source);
        record.is_static = storage.iter().any(|s| s == "static");
        record.is_inline = storage.iter().any(|s| s == "inline");
        record.is_explicit = syntax::is_explicit(node, source);

        let base = naming::base_name(&qualified);
        record.is_destructor = base.starts_with('~');
        record.is_operator = naming::operator_start(&base).is_some();
        record.is_constructor = !record.is_destructor
            && owner
                .as_deref()
                .is_some_and(|owner| naming::base_name(owner) == base);

        if let Some(template) = template {
            template.info.apply(&mut record);
            let args = naming::template_args(&spelled);
            if let Some(kind) = template.info.classify_specialization(args.as_deref()) {
                record.partial_specialization = kind == SpecializationKind::Partial;
                record.primary_template = Some(naming::strip_template_args(&qualified));
            }
            if self.config.effective_analyze_templates() {
                sfinae::detect(template.node, source, &mut record);
                concepts::detect_requirements(template.node, &template.info, source, self.capabilities, &mut record);
                if let Some(body) = node.child_by_field_name("body") {
                    templates::detect_fold(body, source, self.capabilities, &mut record);
                }
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            let symbols = LocalSymbols::collect(func_decl, Some(body), source);
            let mut template_params = scope.template_params.clone();
            if let Some(template) = template {
                template_params.extend(template.info.names());
            }
            let collector = CallCollector::new(
                source,
                &symbols,
                owner.as_deref(),
                self.capabilities,
                self.config.effective_textual_fallback(),
            )
            .with_template_params(&template_params);
            // Sites are attached unlinked; `qualify_same_file_calls` adds the edges.
            record.call_sites = collector.collect(body);
        }

        self.records.push(record);
    }
}

/// Declaration text up to its body, whitespace collapsed.
fn signature_text(node: Node<'_>, source: &str) -> String {
    let end = node
        .child_by_field_name("body")
        .map(|b| b.start_byte())
        .unwrap_or_else(|| node.end_byte());
    let text = source.get(node.start_byte()..end).unwrap_or("");
    naming::normalize_whitespace(text.trim_end_matches(';'))
}

/// `Box<T>::get` is defined on `Box`: drops template arguments from every
/// segment but the last.
fn strip_scope_args(spelled: &str) -> String {
    match naming::split_qualified(spelled) {
        (Some(scope), last) => naming::join(&naming::strip_template_args(scope), last),
        (None, last) => last.to_string(),
    }
}

/// Rewrites call targets that name a function defined in this file in the
/// caller's class or namespace chain, then links the edges.
fn qualify_same_file_calls(mut records: Vec<FunctionRecord>) -> Vec<FunctionRecord> {
    let defined: BTreeSet<String> = records.iter().map(|r| r.name.clone()).collect();
    for record in &mut records {
        let scope = naming::qualifier(&record.name)
            .map(str::to_string)
            .unwrap_or_default();
        let chain = naming::scope_chain(&scope);
        let sites = std::mem::take(&mut record.call_sites);
        for mut site in sites {
            if !defined.contains(&site.target) {
                if let Some(found) = chain
                    .iter()
                    .map(|s| naming::join(s, &site.target))
                    .find(|candidate| defined.contains(candidate))
                {
                    site.target = found;
                }
            }
            record.add_call_site(site);
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_graph::CallSite;

    #[test]
    fn scope_args_are_stripped_from_qualifiers_only() {
        assert_eq!(strip_scope_args("Box<T>::get"), "Box::get");
        assert_eq!(strip_scope_args("process<int>"), "process<int>");
        assert_eq!(strip_scope_args("a::B<int>::f"), "a::B::f");
    }

    #[test]
    fn same_file_calls_prefer_the_innermost_scope() {
        let mut caller = FunctionRecord::new("geo::Circle::area");
        caller.call_sites = vec![
            CallSite::structural("radius", 3),
            CallSite::structural("pi", 3),
            CallSite::structural("sqrt", 4),
        ];
        let records = vec![
            caller,
            FunctionRecord::new("geo::Circle::radius"),
            FunctionRecord::new("geo::pi"),
        ];
        let records = qualify_same_file_calls(records);
        assert_eq!(
            records[0].calls,
            vec!["geo::Circle::radius", "geo::pi", "sqrt"]
        );
    }
}
