//! Source discovery and content hashing.
//!
//! Discovery walks a tree the way `git` sees it (ignore files honored)
//! and keeps files whose extension the scan config accepts. Hashes feed
//! the incremental analyzer's change detection.

pub mod hasher;
pub mod walker;

pub use hasher::{hash_content, hash_file};
pub use walker::discover_sources;
