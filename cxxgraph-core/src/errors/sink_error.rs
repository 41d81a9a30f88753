//! Graph sink errors.

use super::error_code::{self, CxxgraphErrorCode};

/// Errors reported by a graph store while accepting facts.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Sink write failed for {kind}: {message}")]
    WriteFailed { kind: String, message: String },

    #[error("Sink rejected {name}: {message}")]
    Rejected { name: String, message: String },
}

impl CxxgraphErrorCode for SinkError {
    fn error_code(&self) -> &'static str {
        error_code::SINK_ERROR
    }
}
