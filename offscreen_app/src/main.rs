//! Offscreen demo: drives a `GlControl` without any window system
//!
//! A headless driver renders into a CPU pixel buffer, the pump is ticked
//! by hand, and the final frame is captured to a PNG next to the binary.

use glcontrol::prelude::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

const WIDTH: u32 = 256;
const HEIGHT: u32 = 256;

/// Shared CPU framebuffer standing in for GPU memory.
type Framebuffer = Rc<RefCell<Vec<u8>>>;

/// Context driver that "renders" into main memory.
struct HeadlessDriver {
    framebuffer: Framebuffer,
}

impl ContextDriver for HeadlessDriver {
    fn create(&mut self, requirements: &ContextRequirements) -> Result<(), ContextError> {
        log::debug!("creating headless context: {requirements:?}");
        self.framebuffer
            .borrow_mut()
            .resize((WIDTH * HEIGHT * 4) as usize, 0);
        Ok(())
    }

    fn destroy(&mut self) {
        self.framebuffer.borrow_mut().clear();
    }

    fn make_current(&mut self) -> Result<(), ContextError> {
        Ok(())
    }

    fn swap_buffers(&mut self) -> Result<(), ContextError> {
        Ok(())
    }

    fn set_viewport(&mut self, rect: Rect) {
        log::debug!("viewport {}x{}", rect.width, rect.height);
    }

    fn read_pixels(&mut self, rect: Rect, source: ReadBuffer) -> Result<Vec<u8>, ContextError> {
        log::debug!("reading {source:?} buffer");
        // Clamp to the surface; a rect reaching outside it reads only the
        // overlapping pixels.
        let x0 = rect.x.clamp(0, WIDTH as i32) as u32;
        let y0 = rect.y.clamp(0, HEIGHT as i32) as u32;
        let x1 = rect.x.saturating_add(rect.width as i32).clamp(0, WIDTH as i32) as u32;
        let y1 = rect.y.saturating_add(rect.height as i32).clamp(0, HEIGHT as i32) as u32;

        let framebuffer = self.framebuffer.borrow();
        let mut pixels = Vec::with_capacity(((x1 - x0) * (y1 - y0) * 4) as usize);
        for y in y0..y1 {
            let start = ((y * WIDTH + x0) * 4) as usize;
            let end = ((y * WIDTH + x1) * 4) as usize;
            pixels.extend_from_slice(&framebuffer[start..end]);
        }
        Ok(pixels)
    }

    fn info(&self) -> GpuInfo {
        GpuInfo {
            vendor: "offscreen_app".to_string(),
            renderer: "headless CPU framebuffer".to_string(),
            version: "1.0".to_string(),
        }
    }
}

/// Renders an animated gradient into the shared framebuffer.
struct GradientScene {
    framebuffer: Framebuffer,
    frame: u32,
}

impl SurfaceEvents for GradientScene {
    fn update(&mut self) -> Result<(), EventError> {
        self.frame += 1;
        Ok(())
    }

    fn render(&mut self) -> Result<(), EventError> {
        let mut framebuffer = self.framebuffer.borrow_mut();
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let offset = ((y * WIDTH + x) * 4) as usize;
                framebuffer[offset] = (x + self.frame) as u8;
                framebuffer[offset + 1] = (y + self.frame) as u8;
                framebuffer[offset + 2] = (self.frame * 8) as u8;
                framebuffer[offset + 3] = 255;
            }
        }
        Ok(())
    }
}

/// Marks the surface dirty; the "host loop" below repaints dirty surfaces.
struct DirtyFlag(Rc<Cell<bool>>);

impl RedrawScheduler for DirtyFlag {
    fn request_redraw(&self) {
        self.0.set(true);
    }
}

/// No real timer here; main ticks the pump by hand.
struct ManualTimer;

impl TickSource for ManualTimer {
    fn enable(&self) {
        log::info!("pump enabled");
    }

    fn disable(&self) {
        log::info!("pump disabled");
    }
}

struct DemoHooks;

impl AppHooks for DemoHooks {
    fn limit_fps(&self) -> f32 {
        60.0
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    glcontrol::foundation::logging::init();

    let runtime = GlRuntime::new(Box::new(ManualTimer), RuntimeOptions::default());
    runtime.set_hooks(Rc::new(DemoHooks));

    let framebuffer: Framebuffer = Rc::new(RefCell::new(Vec::new()));
    let dirty = Rc::new(Cell::new(false));

    let control = GlControl::builder(Rc::clone(&runtime))
        .size(WIDTH, HEIGHT)
        .events(Box::new(GradientScene {
            framebuffer: Rc::clone(&framebuffer),
            frame: 0,
        }))
        .redraw(Box::new(DirtyFlag(Rc::clone(&dirty))))
        .build(Box::new(HeadlessDriver {
            framebuffer: Rc::clone(&framebuffer),
        }));

    control.borrow_mut().initialize_context()?;
    log::info!("live contexts: {}", runtime.live_contexts());

    for tick in 0..30 {
        runtime.process_tick();
        if dirty.replace(false) {
            control.borrow_mut().do_render()?;
        }
        log::debug!("tick {tick} done");
    }

    let capture = control
        .borrow_mut()
        .save_screen(Rect::new(0, 0, WIDTH, HEIGHT))?;
    capture.save("offscreen_demo.png")?;
    log::info!("wrote offscreen_demo.png");

    control.borrow_mut().finalize_context();
    Ok(())
}
