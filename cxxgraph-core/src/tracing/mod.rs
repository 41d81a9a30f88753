//! Observability for cxxgraph.
//! `tracing` crate with `EnvFilter`, per-subsystem log levels.

pub mod setup;

pub use setup::{env_filter, filter_from, init_tracing, DEFAULT_FILTER, LOG_ENV_VAR};
