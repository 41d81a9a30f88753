//! Configuration system for cxxgraph.
//! TOML-based, layered resolution: overrides > env > project > user > defaults.

pub mod analysis_config;
pub mod cxxgraph_config;
pub mod resolution_config;
pub mod scan_config;

pub use analysis_config::AnalysisConfig;
pub use cxxgraph_config::{ConfigOverrides, CxxgraphConfig};
pub use resolution_config::{OverrideStrictness, ResolutionConfig, ResolutionMode};
pub use scan_config::ScanConfig;
