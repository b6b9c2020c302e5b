//! # glcontrol
//!
//! GPU rendering-context lifecycle management for embeddable drawing surfaces.
//!
//! ## Features
//!
//! - **Context Lifecycle**: Idempotent initialize/finalize of a platform GPU context
//! - **Shared Pump**: One timer-driven update loop servicing every live surface
//! - **GPU Object Helpers**: Single-object create/delete/free over batch-native APIs
//! - **Design Loading**: Serialized component subtrees behind a loader seam
//! - **Frame-Rate Limiting**: Process-wide FPS cap with a documented opt-out
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glcontrol::prelude::*;
//! use std::rc::Rc;
//!
//! struct MyTimer;
//! impl TickSource for MyTimer {
//!     fn enable(&self) { /* start the host timer */ }
//!     fn disable(&self) { /* stop the host timer */ }
//! }
//!
//! # struct MyDriver;
//! # impl ContextDriver for MyDriver {
//! #     fn create(&mut self, _: &ContextRequirements) -> Result<(), ContextError> { Ok(()) }
//! #     fn destroy(&mut self) {}
//! #     fn make_current(&mut self) -> Result<(), ContextError> { Ok(()) }
//! #     fn swap_buffers(&mut self) -> Result<(), ContextError> { Ok(()) }
//! #     fn set_viewport(&mut self, _: Rect) {}
//! #     fn read_pixels(&mut self, _: Rect, _: ReadBuffer) -> Result<Vec<u8>, ContextError> {
//! #         Ok(Vec::new())
//! #     }
//! #     fn info(&self) -> GpuInfo { GpuInfo::default() }
//! # }
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = GlRuntime::new(Box::new(MyTimer), RuntimeOptions::default());
//!     let control = GlControl::builder(Rc::clone(&runtime))
//!         .requirements(ContextRequirements::default())
//!         .size(800, 600)
//!         .build(Box::new(MyDriver));
//!     control.borrow_mut().initialize_context()?;
//!     // ... the host timer calls runtime.process_tick() every tick ...
//!     control.borrow_mut().finalize_context();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod context;
pub mod design;
pub mod foundation;
pub mod gl;
pub mod runtime;
pub mod surface;

mod events;

pub use events::{EventError, EventResult, NullEvents, NullRedraw, RedrawScheduler, SurfaceEvents};

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        context::{ContextDriver, ContextError, ContextRequirements, GpuInfo, ReadBuffer, Rect},
        design::{DesignComponent, DesignError, DesignLoader, DesignRoot, LoadPolicy},
        events::{EventError, EventResult, RedrawScheduler, SurfaceEvents},
        gl::objects::{GlObjects, Handle, ObjectKind},
        runtime::{AppHooks, GlRuntime, RuntimeOptions, TickSource},
        surface::{GlControl, SurfaceError},
    };
}
