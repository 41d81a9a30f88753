//! Cross-crate traits.

pub mod cancellation;

pub use cancellation::{Cancellable, CancellationToken};
