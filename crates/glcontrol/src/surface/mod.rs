//! Control container: one GPU-backed drawing surface
//!
//! A [`GlControl`] owns exactly one [`PlatformContext`] and one
//! [`ContextRequirements`] record, drives the open/resize/render/update/
//! close event sequence for its surface, and participates in the shared
//! pump through the process-wide [`GlRuntime`](crate::runtime::GlRuntime).

use crate::context::{
    ContextDriver, ContextError, ContextRequirements, PlatformContext, ReadBuffer, Rect,
};
use crate::design::{DesignComponent, DesignError, DesignLoader, DesignRoot, LoadPolicy};
use crate::events::{EventError, NullEvents, NullRedraw, RedrawScheduler, SurfaceEvents};
use crate::foundation::time::Stopwatch;
use crate::runtime::GlRuntime;
use image::RgbaImage;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

/// Surface-level errors
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// Operation requires an initialized GL context
    #[error("GL context not initialized")]
    NotInitialized,

    /// Platform context error
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    /// Lifecycle event handler error
    #[error("Event error: {0}")]
    Event(#[from] EventError),

    /// Design loading or lookup error
    #[error("Design error: {0}")]
    Design(#[from] DesignError),

    /// Pixel read-back produced unusable data
    #[error("Screen capture failed: {0}")]
    Capture(String),
}

/// One GPU-backed drawing surface
///
/// Constructed through [`GlControl::builder`], which registers the control
/// in the runtime registry; dropping the control unregisters it and
/// finalizes a still-open context. All operations must run on the one host
/// UI thread (see the crate docs for the threading model).
pub struct GlControl {
    id: u64,
    runtime: Rc<GlRuntime>,
    context: PlatformContext,
    requirements: ContextRequirements,
    events: Box<dyn SurfaceEvents>,
    redraw: Box<dyn RedrawScheduler>,
    loader: Option<Box<dyn DesignLoader>>,
    design: Option<DesignRoot>,
    design_url: Option<String>,
    load_policy: LoadPolicy,
    gl_initialized: bool,
    auto_redisplay: bool,
    effective_double_buffer: bool,
    swap_viewport_workaround: bool,
    width: u32,
    height: u32,
}

impl GlControl {
    /// Start building a control attached to the given runtime
    pub fn builder(runtime: Rc<GlRuntime>) -> GlControlBuilder {
        GlControlBuilder::new(runtime)
    }

    /// Whether `initialize_context` has run and `finalize_context` has not
    /// yet undone it; pure query
    pub fn gl_initialized(&self) -> bool {
        self.gl_initialized
    }

    /// Create and open the GPU context; idempotent
    ///
    /// No-op when already initialized. On the first call this runs the
    /// full open sequence: adjust-context hook, context creation, double
    /// buffer snapshot, make-current, one-time GPU probe, viewport setup,
    /// early-open application hook, open and resize events, design
    /// auto-load, redraw request, and — on the 0→1 live-context transition
    /// — enabling the shared pump.
    pub fn initialize_context(&mut self) -> Result<(), SurfaceError> {
        if self.gl_initialized {
            return Ok(());
        }

        self.events.adjust_context(&mut self.requirements);
        self.context.initialize(&self.requirements)?;
        // Snapshot for screen captures; later Requirements edits must not
        // change which buffer save_screen reads.
        self.effective_double_buffer = self.requirements.double_buffer;
        self.gl_initialized = true;

        self.context.make_current()?;
        self.runtime.log_gpu_info_once(&self.context.info());
        self.context.set_viewport(self.surface_rect())?;

        if let Some(hooks) = self.runtime.hooks() {
            hooks.context_early_open();
        }
        self.events.open(self.runtime.live_contexts())?;
        self.events.resize()?;

        if self.design.is_none() {
            if let Some(url) = self.design_url.clone() {
                self.load_design(&url)?;
            }
        }

        self.redraw.request_redraw();
        self.runtime.enable_updating_once();
        Ok(())
    }

    /// Close and destroy the GPU context; idempotent
    ///
    /// No-op when not initialized. Fires the close event with the
    /// live-context count taken *before* the decrement, then finalizes the
    /// platform context and — on the 1→0 transition — disables the shared
    /// pump.
    pub fn finalize_context(&mut self) {
        if !self.gl_initialized {
            return;
        }
        self.events.close(self.runtime.live_contexts());
        self.gl_initialized = false;
        self.context.finalize();
        self.runtime.disable_updating_if_idle();
    }

    /// Render one frame and present it
    ///
    /// Makes the context current, fires `before_render` and `render`
    /// inside a frame-timing measurement that is recorded even when a
    /// handler fails, applies the viewport-reset swap workaround when
    /// enabled, and swaps buffers. Never schedules another redraw; the
    /// caller's redraw policy is its own.
    pub fn do_render(&mut self) -> Result<(), SurfaceError> {
        if !self.gl_initialized {
            return Err(SurfaceError::NotInitialized);
        }
        self.context.make_current()?;

        let frame = Stopwatch::start_new();
        let rendered = self
            .events
            .before_render()
            .and_then(|()| self.events.render());
        log::trace!("frame events took {:.3} ms", frame.elapsed_millis());
        rendered?;

        if self.swap_viewport_workaround {
            // Some drivers present garbage when the viewport does not span
            // the whole surface at swap time.
            self.context.set_viewport(self.surface_rect())?;
        }
        self.context.swap_buffers()?;
        Ok(())
    }

    /// Service one pump tick for this surface
    ///
    /// Requests a redraw when `auto_redisplay` is set (request only — the
    /// host effects it later), then fires the update event with the
    /// context current: update logic may regenerate context-local GPU
    /// resources, and framebuffers are not shared across contexts.
    pub fn do_update(&mut self) -> Result<(), SurfaceError> {
        if self.auto_redisplay {
            self.redraw.request_redraw();
        }
        self.context.make_current()?;
        self.events.update()?;
        Ok(())
    }

    /// Capture `rect` of the rendered surface as an RGBA image
    ///
    /// Renders a fresh frame (without presenting it), then reads back from
    /// the back buffer when the context was initialized double-buffered,
    /// the front buffer otherwise.
    pub fn save_screen(&mut self, rect: Rect) -> Result<RgbaImage, SurfaceError> {
        if !self.gl_initialized {
            return Err(SurfaceError::NotInitialized);
        }
        self.context.make_current()?;
        self.events.before_render()?;
        self.events.render()?;

        let source = if self.effective_double_buffer {
            ReadBuffer::Back
        } else {
            ReadBuffer::Front
        };
        let pixels = self.context.read_pixels(rect, source)?;
        RgbaImage::from_raw(rect.width, rect.height, pixels).ok_or_else(|| {
            SurfaceError::Capture(format!(
                "driver returned wrong pixel count for {}x{} read-back",
                rect.width, rect.height
            ))
        })
    }

    /// Look up a named component in the most recently loaded design
    ///
    /// With `required` a miss is a [`DesignError::ComponentNotFound`];
    /// otherwise a miss (or no design loaded at all) is `Ok(None)`.
    pub fn designed_component(
        &self,
        name: &str,
        required: bool,
    ) -> Result<Option<&DesignComponent>, DesignError> {
        match self.design.as_ref().and_then(|design| design.find(name)) {
            Some(component) => Ok(Some(component)),
            None if required => Err(DesignError::ComponentNotFound {
                name: name.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Load a design from `url`, replacing any currently loaded design
    ///
    /// Load failures follow the control's [`LoadPolicy`]: `Strict`
    /// re-raises them, `WarnAndSkip` logs a warning and leaves no design
    /// loaded. A missing loader is a configuration error and always fails.
    pub fn load_design(&mut self, url: &str) -> Result<(), SurfaceError> {
        self.unload_design();
        let loader = self.loader.as_mut().ok_or(DesignError::NoLoader)?;
        match loader.load(url) {
            Ok(root) => {
                log::info!("Loaded design {url}");
                self.design = Some(root);
                Ok(())
            }
            Err(err) => match self.load_policy {
                LoadPolicy::Strict => Err(err.into()),
                LoadPolicy::WarnAndSkip => {
                    log::warn!("Design load abandoned: {err}");
                    Ok(())
                }
            },
        }
    }

    /// Unload the current design, if any
    ///
    /// Drops the owner scope, which transitively releases the loaded
    /// subtree; individual components are never freed one by one.
    pub fn unload_design(&mut self) {
        self.design = None;
    }

    /// The host resized the surface
    ///
    /// Updates the stored size and, when the context is open, refreshes
    /// the viewport, fires the resize event, and requests a redraw.
    pub fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), SurfaceError> {
        self.width = width;
        self.height = height;
        if self.gl_initialized {
            self.context.make_current()?;
            self.context.set_viewport(self.surface_rect())?;
            self.events.resize()?;
            self.redraw.request_redraw();
        }
        Ok(())
    }

    /// Whether every pump tick schedules a redraw of this surface
    pub fn auto_redisplay(&self) -> bool {
        self.auto_redisplay
    }

    /// Control whether every pump tick schedules a redraw
    pub fn set_auto_redisplay(&mut self, auto_redisplay: bool) {
        self.auto_redisplay = auto_redisplay;
    }

    /// Context requirements for this surface
    pub fn requirements(&self) -> &ContextRequirements {
        &self.requirements
    }

    /// Mutable context requirements
    ///
    /// Edits after `initialize_context` do not affect the live context.
    pub fn requirements_mut(&mut self) -> &mut ContextRequirements {
        &mut self.requirements
    }

    /// Design URL auto-loaded during `initialize_context`
    pub fn set_design_url(&mut self, url: impl Into<String>) {
        self.design_url = Some(url.into());
    }

    /// Error policy for design load attempts
    pub fn set_load_policy(&mut self, policy: LoadPolicy) {
        self.load_policy = policy;
    }

    /// Current surface size in pixels
    pub fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Direct driver access, e.g. for GPU object helpers
    ///
    /// The caller is responsible for having made this context current.
    pub fn driver_mut(&mut self) -> &mut dyn ContextDriver {
        self.context.driver_mut()
    }

    /// The process-wide runtime this control is registered with
    pub fn runtime(&self) -> &Rc<GlRuntime> {
        &self.runtime
    }

    fn surface_rect(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

impl Drop for GlControl {
    fn drop(&mut self) {
        self.finalize_context();
        self.runtime.unregister_control(self.id);
    }
}

/// Builder for [`GlControl`]
///
/// Every collaborator has a neutral default: events and redraws are
/// dropped, no design loader is attached, the surface is 0x0 until the
/// host reports a size.
pub struct GlControlBuilder {
    runtime: Rc<GlRuntime>,
    requirements: ContextRequirements,
    events: Box<dyn SurfaceEvents>,
    redraw: Box<dyn RedrawScheduler>,
    loader: Option<Box<dyn DesignLoader>>,
    design_url: Option<String>,
    load_policy: LoadPolicy,
    swap_viewport_workaround: bool,
    width: u32,
    height: u32,
}

impl GlControlBuilder {
    fn new(runtime: Rc<GlRuntime>) -> Self {
        Self {
            runtime,
            requirements: ContextRequirements::default(),
            events: Box::new(NullEvents),
            redraw: Box::new(NullRedraw),
            loader: None,
            design_url: None,
            load_policy: LoadPolicy::default(),
            swap_viewport_workaround: false,
            width: 0,
            height: 0,
        }
    }

    /// Desired context capabilities
    pub fn requirements(mut self, requirements: ContextRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    /// Lifecycle event sink
    pub fn events(mut self, events: Box<dyn SurfaceEvents>) -> Self {
        self.events = events;
        self
    }

    /// Redraw scheduling strategy
    pub fn redraw(mut self, redraw: Box<dyn RedrawScheduler>) -> Self {
        self.redraw = redraw;
        self
    }

    /// Design serialization collaborator
    pub fn design_loader(mut self, loader: Box<dyn DesignLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Design URL to auto-load when the context opens
    pub fn design_url(mut self, url: impl Into<String>) -> Self {
        self.design_url = Some(url.into());
        self
    }

    /// Error policy for design load attempts
    pub fn load_policy(mut self, policy: LoadPolicy) -> Self {
        self.load_policy = policy;
        self
    }

    /// Enable the viewport-reset swap workaround for affected drivers
    pub fn swap_viewport_workaround(mut self, enabled: bool) -> Self {
        self.swap_viewport_workaround = enabled;
        self
    }

    /// Initial surface size in pixels
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Build the control over the given platform driver and register it
    pub fn build(self, driver: Box<dyn ContextDriver>) -> Rc<RefCell<GlControl>> {
        let id = self.runtime.next_control_id();
        let context = PlatformContext::new(Rc::clone(&self.runtime), driver);
        let control = Rc::new(RefCell::new(GlControl {
            id,
            runtime: Rc::clone(&self.runtime),
            context,
            requirements: self.requirements,
            events: self.events,
            redraw: self.redraw,
            loader: self.loader,
            design: None,
            design_url: self.design_url,
            load_policy: self.load_policy,
            gl_initialized: false,
            auto_redisplay: true,
            effective_double_buffer: false,
            swap_viewport_workaround: self.swap_viewport_workaround,
            width: self.width,
            height: self.height,
        }));
        self.runtime.register_control(id, Rc::downgrade(&control));
        control
    }
}

#[cfg(test)]
mod tests;
