//! Cross-file repair of missing call targets.

pub mod index;
pub mod resolver;
pub mod stats;

pub use index::FunctionIndex;
pub use resolver::{CrossFileResolver, Resolution, Strategy};
pub use stats::ResolutionStats;
