//! CxxgraphErrorCode trait for structured error reporting.

/// Every error enum implements this to expose a stable, machine-readable
/// code alongside its human-readable message.
pub trait CxxgraphErrorCode {
    /// Returns the error code string (e.g., "PARSE_ERROR").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted error string: `[ERROR_CODE] message`.
    fn coded_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const PARSE_ERROR: &str = "PARSE_ERROR";
pub const PARSE_TIMEOUT: &str = "PARSE_TIMEOUT";
pub const FRONTEND_INIT_FAILED: &str = "FRONTEND_INIT_FAILED";
pub const UNSUPPORTED_EXTENSION: &str = "UNSUPPORTED_EXTENSION";
pub const CANCELLED: &str = "CANCELLED";
pub const CALL_GRAPH_ERROR: &str = "CALL_GRAPH_ERROR";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const SCAN_ERROR: &str = "SCAN_ERROR";
pub const SINK_ERROR: &str = "SINK_ERROR";
pub const PIPELINE_ERROR: &str = "PIPELINE_ERROR";
