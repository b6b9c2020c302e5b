//! GPU object utilities
//!
//! Thin wrappers reducing the batch-oriented native object APIs to the
//! single-object semantics every call site actually wants.

pub mod objects;

pub use objects::{GlObjects, Handle, ObjectKind};
