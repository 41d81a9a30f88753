//! Parser errors.

use std::path::PathBuf;

use super::error_code::{self, CxxgraphErrorCode};

/// Errors that can occur while turning a source file into a syntax tree.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Cannot read {path}: {message}")]
    FileUnreadable { path: PathBuf, message: String },

    #[error("Parser front-end initialization failed: {message}")]
    FrontendInit { message: String },

    #[error("Parse timeout for {path} after {timeout_ms}ms")]
    Timeout { path: PathBuf, timeout_ms: u64 },

    #[error("Unsupported source extension: {extension}")]
    UnsupportedExtension { extension: String },

    #[error("Partial parse of {path}: {error_nodes} error nodes")]
    PartialParse { path: PathBuf, error_nodes: usize },

    #[error("File too large: {path} ({size} bytes, limit {limit})")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },
}

impl ParseError {
    /// Only a broken front-end aborts a whole batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FrontendInit { .. })
    }
}

impl CxxgraphErrorCode for ParseError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => error_code::PARSE_TIMEOUT,
            Self::FrontendInit { .. } => error_code::FRONTEND_INIT_FAILED,
            Self::UnsupportedExtension { .. } => error_code::UNSUPPORTED_EXTENSION,
            _ => error_code::PARSE_ERROR,
        }
    }
}
