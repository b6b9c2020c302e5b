//! Platform GPU context management
//!
//! An opaque, platform-specific rendering context behind the
//! [`ContextDriver`] seam, wrapped by [`PlatformContext`] which enforces the
//! `Uninitialized -> Active -> Uninitialized` lifecycle and keeps the
//! process-wide live-context count in step.

pub mod platform;
pub mod requirements;

pub use platform::{
    ContextDriver, ContextError, ContextResult, GpuInfo, PlatformContext, ReadBuffer, Rect,
};
pub use requirements::ContextRequirements;
