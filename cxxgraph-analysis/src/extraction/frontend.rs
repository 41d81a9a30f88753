//! tree-sitter C++ front-end: parser ownership, capability probing and
//! translation units.

use std::path::{Path, PathBuf};

use cxxgraph_core::errors::ParseError;
use tracing::debug;
use tree_sitter::{Language, Node, Parser, Tree};

use super::syntax;

pub fn cpp_language() -> Language {
    tree_sitter_cpp::LANGUAGE.into()
}

/// Which syntax node kinds the loaded grammar can produce. Features whose
/// node kind is absent are detected textually instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontendCapabilities {
    pub member_calls: bool,
    pub template_template_params: bool,
    pub variadic_params: bool,
    pub fold_expressions: bool,
    pub requires_clauses: bool,
    pub concepts: bool,
}

impl FrontendCapabilities {
    pub fn probe(language: &Language) -> Self {
        let has = |kind: &str| language.id_for_node_kind(kind, true) != 0;
        let caps = Self {
            member_calls: has("field_expression"),
            template_template_params: has("template_template_parameter_declaration"),
            variadic_params: has("variadic_type_parameter_declaration"),
            fold_expressions: has("fold_expression"),
            requires_clauses: has("requires_clause"),
            concepts: has("concept_definition"),
        };
        debug!(?caps, "front-end capability probe");
        caps
    }

    /// Every structural strategy available.
    pub fn full() -> Self {
        Self {
            member_calls: true,
            template_template_params: true,
            variadic_params: true,
            fold_expressions: true,
            requires_clauses: true,
            concepts: true,
        }
    }

    /// No optional node kinds; every feature uses its textual strategy.
    pub fn textual_only() -> Self {
        Self {
            member_calls: false,
            template_template_params: false,
            variadic_params: false,
            fold_expressions: false,
            requires_clauses: false,
            concepts: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        *self == Self::full()
    }
}

/// An `#include` directive and where it was found, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRef {
    pub spelled: String,
    pub system: bool,
    pub resolved: Option<PathBuf>,
}

/// One parsed source file. Owns the text its tree points into.
pub struct TranslationUnit {
    pub path: PathBuf,
    pub source: String,
    pub tree: Tree,
    pub include_dirs: Vec<PathBuf>,
    pub compiler_args: Vec<String>,
    pub includes: Vec<IncludeRef>,
}

impl TranslationUnit {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn text(&self, node: Node<'_>) -> &str {
        syntax::text(node, &self.source)
    }

    pub fn path_str(&self) -> String {
        self.path.display().to_string()
    }

    /// Number of ERROR and MISSING nodes.
    pub fn error_count(&self) -> usize {
        syntax::count_errors(self.root())
    }
}

/// Owns one tree-sitter parser. Not shared between threads; each worker
/// builds its own.
pub struct CppFrontend {
    parser: Parser,
    capabilities: FrontendCapabilities,
    timeout_ms: u64,
}

impl CppFrontend {
    pub fn new(timeout_ms: u64) -> Result<Self, ParseError> {
        let language = cpp_language();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| ParseError::FrontendInit {
                message: e.to_string(),
            })?;
        parser.set_timeout_micros(timeout_ms.saturating_mul(1000));
        Ok(Self {
            capabilities: FrontendCapabilities::probe(&language),
            parser,
            timeout_ms,
        })
    }

    pub fn capabilities(&self) -> FrontendCapabilities {
        self.capabilities
    }

    /// Parses `source`. A parse that runs out of time reports `Timeout`.
    pub fn parse(&mut self, path: &Path, source: &str) -> Result<Tree, ParseError> {
        self.parser.reset();
        self.parser
            .parse(source, None)
            .ok_or_else(|| ParseError::Timeout {
                path: path.to_path_buf(),
                timeout_ms: self.timeout_ms,
            })
    }

    /// Parses and wraps the result with include information.
    pub fn translation_unit(
        &mut self,
        path: &Path,
        source: String,
        include_dirs: &[PathBuf],
        compiler_args: &[String],
    ) -> Result<TranslationUnit, ParseError> {
        let tree = self.parse(path, &source)?;
        let mut search_dirs = include_dirs.to_vec();
        search_dirs.extend(include_dirs_from_args(compiler_args));
        let includes = collect_includes(tree.root_node(), &source, path, &search_dirs);
        Ok(TranslationUnit {
            path: path.to_path_buf(),
            source,
            tree,
            include_dirs: search_dirs,
            compiler_args: compiler_args.to_vec(),
            includes,
        })
    }
}

/// `-I dir`, `-Idir`, `-isystem dir` and `-iquote dir` entries.
pub fn include_dirs_from_args(args: &[String]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        for flag in ["-isystem", "-iquote", "-I"] {
            if let Some(rest) = arg.strip_prefix(flag) {
                if rest.is_empty() {
                    if let Some(next) = iter.next() {
                        dirs.push(PathBuf::from(next));
                    }
                } else {
                    dirs.push(PathBuf::from(rest));
                }
                break;
            }
        }
    }
    dirs
}

fn collect_includes(root: Node<'_>, source: &str, file: &Path, dirs: &[PathBuf]) -> Vec<IncludeRef> {
    let mut includes = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "preproc_include" {
            if let Some(path_node) = node.child_by_field_name("path") {
                let raw = syntax::text(path_node, source).trim();
                let system = raw.starts_with('<');
                let spelled = raw.trim_matches(|c| c == '"' || c == '<' || c == '>').to_string();
                let resolved = resolve_include(&spelled, system, file, dirs);
                includes.push(IncludeRef {
                    spelled,
                    system,
                    resolved,
                });
            }
            continue;
        }
        if matches!(node.kind(), "function_definition" | "compound_statement") {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    includes
}

fn resolve_include(spelled: &str, system: bool, file: &Path, dirs: &[PathBuf]) -> Option<PathBuf> {
    let local = (!system)
        .then(|| file.parent().map(|dir| dir.join(spelled)))
        .flatten();
    local
        .into_iter()
        .chain(dirs.iter().map(|dir| dir.join(spelled)))
        .find(|candidate| candidate.is_file())
}
