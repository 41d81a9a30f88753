//! Class hierarchy collection, override detection and virtual dispatch.

pub mod collector;
pub mod resolver;
pub mod types;

pub use resolver::{ClassHierarchyResolver, Vtable, VtableBuilder};
pub use types::{ClassHierarchy, ClassNode, MethodSignature};
