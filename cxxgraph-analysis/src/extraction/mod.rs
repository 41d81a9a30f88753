//! Per-translation-unit extraction of functions, calls and C++ features.

pub mod calls;
pub mod extractor;
pub mod features;
pub mod frontend;
pub mod syntax;

pub use extractor::SourceExtractor;
pub use frontend::{CppFrontend, FrontendCapabilities, IncludeRef, TranslationUnit};
