//! C++ feature detection over a declaration's subtree and text. Each
//! detector prefers syntax nodes and falls back to patterns when the
//! grammar lacks the node kind or the subtree has parse errors.

pub mod concepts;
pub mod metafunction;
pub mod sfinae;
pub mod templates;

pub use templates::{SpecializationKind, TemplateInfo, TemplateParam, TemplateParamKind};
