//! Error handling for cxxgraph.
//! One error enum per subsystem, `thiserror` only, zero `anyhow`.

pub mod call_graph_error;
pub mod config_error;
pub mod error_code;
pub mod parse_error;
pub mod pipeline_error;
pub mod scan_error;
pub mod sink_error;

pub use call_graph_error::CallGraphError;
pub use config_error::ConfigError;
pub use error_code::CxxgraphErrorCode;
pub use parse_error::ParseError;
pub use pipeline_error::{PipelineError, PipelineResult};
pub use scan_error::ScanError;
pub use sink_error::SinkError;
