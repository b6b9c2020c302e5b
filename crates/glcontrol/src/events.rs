//! Lifecycle event sinks and host-integration strategies
//!
//! The embedding surface type supplies these trait implementations; the
//! control never paints or pumps on its own authority.

use crate::context::ContextRequirements;
use thiserror::Error;

/// Errors raised by user-supplied event handlers
#[derive(Error, Debug)]
pub enum EventError {
    /// Custom handler error
    #[error("Event handler error: {0}")]
    Custom(String),
}

/// Result type for event handlers
pub type EventResult = Result<(), EventError>;

/// Lifecycle events fired by a [`GlControl`](crate::surface::GlControl)
///
/// Every method has a no-op default, so implementors handle only the
/// events they care about. The context is current when `open`, `resize`,
/// `before_render`, `render` and `update` fire; handlers may touch GPU
/// resources directly.
pub trait SurfaceEvents {
    /// Tweak context requirements immediately before context creation
    fn adjust_context(&mut self, _requirements: &mut ContextRequirements) {}

    /// The context just opened; receives the live-context count
    /// including this one
    fn open(&mut self, _live_contexts: usize) -> EventResult {
        Ok(())
    }

    /// The surface size changed
    fn resize(&mut self) -> EventResult {
        Ok(())
    }

    /// About to render a frame
    fn before_render(&mut self) -> EventResult {
        Ok(())
    }

    /// Render a frame
    fn render(&mut self) -> EventResult {
        Ok(())
    }

    /// Per-tick update; may regenerate GPU resources
    fn update(&mut self) -> EventResult {
        Ok(())
    }

    /// The context is about to close; receives the live-context count
    /// still including this one
    fn close(&mut self, _live_contexts: usize) {}
}

/// Event sink that ignores every lifecycle event
pub struct NullEvents;

impl SurfaceEvents for NullEvents {}

/// Strategy for asking the host to schedule a repaint
///
/// A redraw is only ever *requested*; forcing a synchronous paint from
/// inside update handling breaks host event loops.
pub trait RedrawScheduler {
    /// Ask the host to schedule a repaint of the surface
    fn request_redraw(&self);
}

/// Redraw scheduler that drops every request
pub struct NullRedraw;

impl RedrawScheduler for NullRedraw {
    fn request_redraw(&self) {}
}
