//! Platform context state machine and driver seam

use crate::context::ContextRequirements;
use crate::runtime::GlRuntime;
use std::rc::Rc;
use thiserror::Error;

/// Platform context errors
#[derive(Error, Debug)]
pub enum ContextError {
    /// Context creation or initialization failed; fatal to this surface
    #[error("Context initialization failed: {0}")]
    InitializationFailed(String),

    /// Initialize called on an already-active context
    #[error("Context is already initialized")]
    AlreadyInitialized,

    /// Operation requires an active context
    #[error("Context is not initialized")]
    NotInitialized,

    /// Platform API error
    #[error("Context API error: {0}")]
    Api(String),
}

/// Result type for context operations
pub type ContextResult<T> = Result<T, ContextError>;

/// Axis-aligned pixel rectangle on a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Which color buffer a pixel read-back targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadBuffer {
    /// The buffer currently on screen
    Front,
    /// The buffer being rendered to (double-buffered contexts)
    Back,
}

/// GPU identification strings reported by the driver
#[derive(Debug, Clone, Default)]
pub struct GpuInfo {
    /// Hardware vendor
    pub vendor: String,
    /// Renderer/device name
    pub renderer: String,
    /// Driver/API version
    pub version: String,
}

/// Opaque platform seam to a real GPU rendering context
///
/// Implemented once per platform/windowing combination; test code
/// substitutes a recording stub. Call ordering is enforced by
/// [`PlatformContext`], so implementations may assume `create` precedes
/// everything else and `destroy` is never called twice in a row.
pub trait ContextDriver {
    /// Create the native context with the given capabilities
    fn create(&mut self, requirements: &ContextRequirements) -> ContextResult<()>;

    /// Destroy the native context and release its GPU resources
    fn destroy(&mut self);

    /// Bind the context to the calling thread
    fn make_current(&mut self) -> ContextResult<()>;

    /// Present the back buffer
    fn swap_buffers(&mut self) -> ContextResult<()>;

    /// Set the rasterizer viewport
    fn set_viewport(&mut self, rect: Rect);

    /// Read back RGBA8 pixels from the given buffer, restricted to `rect`
    fn read_pixels(&mut self, rect: Rect, source: ReadBuffer) -> ContextResult<Vec<u8>>;

    /// Identify the GPU behind the active context
    fn info(&self) -> GpuInfo;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextState {
    Uninitialized,
    Active,
}

/// Owns zero or one live native GPU context
///
/// Enforces the `Uninitialized -> (initialize) -> Active -> (finalize) ->
/// Uninitialized` state machine over a [`ContextDriver`] and keeps the
/// runtime's process-wide live-context counter in step: the counter
/// increments on successful `initialize` and decrements on `finalize`.
pub struct PlatformContext {
    driver: Box<dyn ContextDriver>,
    state: ContextState,
    runtime: Rc<GlRuntime>,
}

impl PlatformContext {
    /// Create an uninitialized platform context
    pub fn new(runtime: Rc<GlRuntime>, driver: Box<dyn ContextDriver>) -> Self {
        Self {
            driver,
            state: ContextState::Uninitialized,
            runtime,
        }
    }

    /// Whether a native context is currently live
    pub fn initialized(&self) -> bool {
        self.state == ContextState::Active
    }

    /// Create the native context from `requirements`
    ///
    /// At most once per active period; a second call without an intervening
    /// `finalize` is a contract violation and fails.
    pub fn initialize(&mut self, requirements: &ContextRequirements) -> ContextResult<()> {
        if self.state == ContextState::Active {
            return Err(ContextError::AlreadyInitialized);
        }
        self.driver.create(requirements)?;
        self.state = ContextState::Active;
        let live = self.runtime.context_opened();
        log::info!("GPU context initialized ({live} live)");
        Ok(())
    }

    /// Destroy the native context, returning to uninitialized; no-op when
    /// already uninitialized
    pub fn finalize(&mut self) {
        if self.state != ContextState::Active {
            return;
        }
        self.driver.destroy();
        self.state = ContextState::Uninitialized;
        let live = self.runtime.context_closed();
        log::info!("GPU context finalized ({live} live)");
    }

    /// Bind the context to the calling thread; requires an active context
    pub fn make_current(&mut self) -> ContextResult<()> {
        self.ensure_active()?;
        self.driver.make_current()
    }

    /// Present the back buffer; requires an active context
    pub fn swap_buffers(&mut self) -> ContextResult<()> {
        self.ensure_active()?;
        self.driver.swap_buffers()
    }

    /// Set the rasterizer viewport; requires an active context
    pub fn set_viewport(&mut self, rect: Rect) -> ContextResult<()> {
        self.ensure_active()?;
        self.driver.set_viewport(rect);
        Ok(())
    }

    /// Read back pixels from the given buffer; requires an active context
    pub fn read_pixels(&mut self, rect: Rect, source: ReadBuffer) -> ContextResult<Vec<u8>> {
        self.ensure_active()?;
        self.driver.read_pixels(rect, source)
    }

    /// GPU identification strings from the driver
    pub fn info(&self) -> GpuInfo {
        self.driver.info()
    }

    /// Access the driver, e.g. for GPU object work through
    /// [`GlObjects`](crate::gl::objects::GlObjects)
    pub fn driver_mut(&mut self) -> &mut dyn ContextDriver {
        self.driver.as_mut()
    }

    fn ensure_active(&self) -> ContextResult<()> {
        if self.state == ContextState::Active {
            Ok(())
        } else {
            Err(ContextError::NotInitialized)
        }
    }
}

impl Drop for PlatformContext {
    fn drop(&mut self) {
        self.finalize();
    }
}
