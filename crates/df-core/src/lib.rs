//! df-core: stable foundation for dagflow.
//!
//! Contains:
//! - ids (stable compact IDs for graph objects)
//! - error (shared error types)

pub mod error;
pub mod ids;

// Re-exports: nice ergonomics for downstream crates
pub use error::{DfError, DfResult};
pub use ids::*;
