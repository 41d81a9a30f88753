//! Shared foundation for the cxxgraph engine: errors, configuration,
//! tracing setup, cancellation and collection aliases.

pub mod config;
pub mod errors;
pub mod tracing;
pub mod traits;
pub mod types;
