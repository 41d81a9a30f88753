//! Source discovery errors.

use std::path::PathBuf;

use super::error_code::{self, CxxgraphErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Scan root not found: {path}")]
    RootNotFound { path: PathBuf },

    #[error("Directory walk failed: {message}")]
    Walk { message: String },
}

impl CxxgraphErrorCode for ScanError {
    fn error_code(&self) -> &'static str {
        error_code::SCAN_ERROR
    }
}
