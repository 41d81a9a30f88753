//! Error code mapping and non-fatal error collection.

use std::path::PathBuf;

use cxxgraph_core::errors::error_code;
use cxxgraph_core::errors::{
    CxxgraphErrorCode, ParseError, PipelineError, PipelineResult, SinkError,
};

#[test]
fn test_parse_error_codes() {
    let timeout = ParseError::Timeout {
        path: PathBuf::from("slow.cpp"),
        timeout_ms: 50,
    };
    assert_eq!(timeout.error_code(), error_code::PARSE_TIMEOUT);
    assert_eq!(
        timeout.coded_string(),
        "[PARSE_TIMEOUT] Parse timeout for slow.cpp after 50ms"
    );
    assert!(!timeout.is_fatal());

    let init = ParseError::FrontendInit {
        message: "grammar version mismatch".to_string(),
    };
    assert!(init.is_fatal());
    assert_eq!(init.error_code(), error_code::FRONTEND_INIT_FAILED);
}

#[test]
fn test_pipeline_error_delegates_codes() {
    let err: PipelineError = SinkError::WriteFailed {
        kind: "call_edge".to_string(),
        message: "closed".to_string(),
    }
    .into();
    assert_eq!(err.error_code(), error_code::SINK_ERROR);
    assert_eq!(PipelineError::Cancelled.error_code(), error_code::CANCELLED);
}

#[test]
fn test_pipeline_result_collects_non_fatal_errors() {
    let mut result: PipelineResult<Vec<String>> = PipelineResult::new(vec!["a.cpp".to_string()]);
    assert!(result.is_clean());

    result.add_error(
        ParseError::FileUnreadable {
            path: PathBuf::from("b.cpp"),
            message: "permission denied".to_string(),
        }
        .into(),
    );
    assert!(!result.is_clean());
    assert_eq!(result.error_count(), 1);
    assert_eq!(result.data.len(), 1);
}
