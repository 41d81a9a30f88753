//! Call graph errors.

use super::error_code::{self, CxxgraphErrorCode};

/// Errors raised by call graph lookups that require a known function.
#[derive(Debug, thiserror::Error)]
pub enum CallGraphError {
    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("Resolution failed for {name}: {message}")]
    ResolutionFailed { name: String, message: String },
}

impl CxxgraphErrorCode for CallGraphError {
    fn error_code(&self) -> &'static str {
        error_code::CALL_GRAPH_ERROR
    }
}
