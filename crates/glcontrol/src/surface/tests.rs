use super::*;
use crate::context::{ContextResult, GpuInfo};
use crate::design::{DesignComponent, DesignError, DesignLoader, DesignRoot, LoadPolicy};
use crate::events::EventResult;
use crate::runtime::{RuntimeOptions, TickSource};
use std::cell::Cell;

type CallLog = Rc<RefCell<Vec<String>>>;

fn new_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

struct CountingTicks {
    enables: Rc<Cell<usize>>,
    disables: Rc<Cell<usize>>,
}

impl TickSource for CountingTicks {
    fn enable(&self) {
        self.enables.set(self.enables.get() + 1);
    }

    fn disable(&self) {
        self.disables.set(self.disables.get() + 1);
    }
}

fn runtime_with_counters() -> (Rc<GlRuntime>, Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let enables = Rc::new(Cell::new(0));
    let disables = Rc::new(Cell::new(0));
    let runtime = GlRuntime::new(
        Box::new(CountingTicks {
            enables: Rc::clone(&enables),
            disables: Rc::clone(&disables),
        }),
        RuntimeOptions::default(),
    );
    (runtime, enables, disables)
}

fn runtime() -> Rc<GlRuntime> {
    runtime_with_counters().0
}

struct StubDriver {
    log: CallLog,
    fail_create: bool,
}

impl StubDriver {
    fn boxed(log: &CallLog) -> Box<dyn ContextDriver> {
        Box::new(Self {
            log: Rc::clone(log),
            fail_create: false,
        })
    }

    fn failing(log: &CallLog) -> Box<dyn ContextDriver> {
        Box::new(Self {
            log: Rc::clone(log),
            fail_create: true,
        })
    }
}

const BACK_FILL: u8 = 200;
const FRONT_FILL: u8 = 100;

impl ContextDriver for StubDriver {
    fn create(&mut self, _requirements: &ContextRequirements) -> ContextResult<()> {
        if self.fail_create {
            return Err(ContextError::InitializationFailed("stub refusal".into()));
        }
        self.log.borrow_mut().push("create".into());
        Ok(())
    }

    fn destroy(&mut self) {
        self.log.borrow_mut().push("destroy".into());
    }

    fn make_current(&mut self) -> ContextResult<()> {
        self.log.borrow_mut().push("make_current".into());
        Ok(())
    }

    fn swap_buffers(&mut self) -> ContextResult<()> {
        self.log.borrow_mut().push("swap_buffers".into());
        Ok(())
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.log
            .borrow_mut()
            .push(format!("viewport {}x{}", rect.width, rect.height));
    }

    fn read_pixels(&mut self, rect: Rect, source: ReadBuffer) -> ContextResult<Vec<u8>> {
        self.log.borrow_mut().push(format!("read {source:?}"));
        let fill = match source {
            ReadBuffer::Back => BACK_FILL,
            ReadBuffer::Front => FRONT_FILL,
        };
        Ok(vec![fill; (rect.width * rect.height * 4) as usize])
    }

    fn info(&self) -> GpuInfo {
        GpuInfo {
            vendor: "StubVendor".into(),
            renderer: "StubRenderer".into(),
            version: "1.0".into(),
        }
    }
}

struct RecordingEvents {
    log: CallLog,
}

impl RecordingEvents {
    fn boxed(log: &CallLog) -> Box<dyn SurfaceEvents> {
        Box::new(Self {
            log: Rc::clone(log),
        })
    }
}

impl SurfaceEvents for RecordingEvents {
    fn adjust_context(&mut self, _requirements: &mut ContextRequirements) {
        self.log.borrow_mut().push("adjust_context".into());
    }

    fn open(&mut self, live_contexts: usize) -> EventResult {
        self.log.borrow_mut().push(format!("open({live_contexts})"));
        Ok(())
    }

    fn resize(&mut self) -> EventResult {
        self.log.borrow_mut().push("resize".into());
        Ok(())
    }

    fn before_render(&mut self) -> EventResult {
        self.log.borrow_mut().push("before_render".into());
        Ok(())
    }

    fn render(&mut self) -> EventResult {
        self.log.borrow_mut().push("render".into());
        Ok(())
    }

    fn update(&mut self) -> EventResult {
        self.log.borrow_mut().push("update".into());
        Ok(())
    }

    fn close(&mut self, live_contexts: usize) {
        self.log
            .borrow_mut()
            .push(format!("close({live_contexts})"));
    }
}

struct FailingRender;

impl SurfaceEvents for FailingRender {
    fn render(&mut self) -> EventResult {
        Err(EventError::Custom("render exploded".into()))
    }
}

struct CountingRedraw {
    count: Rc<Cell<usize>>,
}

impl RedrawScheduler for CountingRedraw {
    fn request_redraw(&self) {
        self.count.set(self.count.get() + 1);
    }
}

struct StaticLoader;

impl DesignLoader for StaticLoader {
    fn load(&mut self, url: &str) -> Result<DesignRoot, DesignError> {
        Ok(DesignRoot::new(
            url,
            DesignComponent::with_children("Root", vec![DesignComponent::new("Viewport")]),
        ))
    }
}

struct FailingLoader;

impl DesignLoader for FailingLoader {
    fn load(&mut self, url: &str) -> Result<DesignRoot, DesignError> {
        Err(DesignError::LoadFailed {
            url: url.to_string(),
            reason: "corrupt stream".to_string(),
        })
    }
}

fn simple_control(runtime: &Rc<GlRuntime>, log: &CallLog) -> Rc<RefCell<GlControl>> {
    GlControl::builder(Rc::clone(runtime))
        .size(64, 32)
        .build(StubDriver::boxed(log))
}

#[test]
fn test_initialize_context_is_idempotent() {
    let runtime = runtime();
    let log = new_log();
    let control = simple_control(&runtime, &log);
    let mut control = control.borrow_mut();

    control.initialize_context().unwrap();
    assert!(control.gl_initialized());
    control.initialize_context().unwrap();
    control.initialize_context().unwrap();
    assert!(control.gl_initialized());

    let creates = log.borrow().iter().filter(|c| *c == "create").count();
    assert_eq!(creates, 1, "context must be created exactly once");
    assert_eq!(runtime.live_contexts(), 1);
}

#[test]
fn test_finalize_context_is_idempotent() {
    let runtime = runtime();
    let log = new_log();
    let control = simple_control(&runtime, &log);
    let mut control = control.borrow_mut();

    control.initialize_context().unwrap();
    control.finalize_context();
    assert!(!control.gl_initialized());
    control.finalize_context();
    assert!(!control.gl_initialized());

    let destroys = log.borrow().iter().filter(|c| *c == "destroy").count();
    assert_eq!(destroys, 1, "context must be destroyed exactly once");
    assert_eq!(runtime.live_contexts(), 0);
}

#[test]
fn test_live_context_count_across_controls() {
    let runtime = runtime();
    let log = new_log();
    let controls: Vec<_> = (0..3).map(|_| simple_control(&runtime, &log)).collect();

    for control in &controls {
        control.borrow_mut().initialize_context().unwrap();
    }
    assert_eq!(runtime.live_contexts(), 3);

    // Finalize out of order; the counter only cares about pairing.
    controls[1].borrow_mut().finalize_context();
    controls[2].borrow_mut().finalize_context();
    controls[0].borrow_mut().finalize_context();
    assert_eq!(runtime.live_contexts(), 0);
}

#[test]
fn test_initialize_sequence_order() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .size(64, 32)
        .events(RecordingEvents::boxed(&log))
        .build(StubDriver::boxed(&log));

    control.borrow_mut().initialize_context().unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            "adjust_context",
            "create",
            "make_current",
            "viewport 64x32",
            "open(1)",
            "resize",
        ]
    );
}

#[test]
fn test_open_receives_incremented_live_count() {
    let runtime = runtime();
    let log_a = new_log();
    let log_b = new_log();
    let a = GlControl::builder(Rc::clone(&runtime))
        .events(RecordingEvents::boxed(&log_a))
        .build(StubDriver::boxed(&new_log()));
    let b = GlControl::builder(Rc::clone(&runtime))
        .events(RecordingEvents::boxed(&log_b))
        .build(StubDriver::boxed(&new_log()));

    a.borrow_mut().initialize_context().unwrap();
    b.borrow_mut().initialize_context().unwrap();
    assert!(log_a.borrow().contains(&"open(1)".to_string()));
    assert!(log_b.borrow().contains(&"open(2)".to_string()));
}

#[test]
fn test_close_receives_count_before_decrement() {
    let runtime = runtime();
    let log_a = new_log();
    let log_b = new_log();
    let a = GlControl::builder(Rc::clone(&runtime))
        .events(RecordingEvents::boxed(&log_a))
        .build(StubDriver::boxed(&new_log()));
    let b = GlControl::builder(Rc::clone(&runtime))
        .events(RecordingEvents::boxed(&log_b))
        .build(StubDriver::boxed(&new_log()));

    a.borrow_mut().initialize_context().unwrap();
    b.borrow_mut().initialize_context().unwrap();
    a.borrow_mut().finalize_context();
    b.borrow_mut().finalize_context();
    assert!(log_a.borrow().contains(&"close(2)".to_string()));
    assert!(log_b.borrow().contains(&"close(1)".to_string()));
}

#[test]
fn test_pump_enabled_and_disabled_exactly_once() {
    let (runtime, enables, disables) = runtime_with_counters();
    let log = new_log();
    let a = simple_control(&runtime, &log);
    let b = simple_control(&runtime, &log);

    a.borrow_mut().initialize_context().unwrap();
    assert_eq!(enables.get(), 1, "enabled on the 0->1 transition");
    b.borrow_mut().initialize_context().unwrap();
    assert_eq!(enables.get(), 1, "second context must not re-enable");

    a.borrow_mut().finalize_context();
    assert_eq!(disables.get(), 0, "one context still live");
    b.borrow_mut().finalize_context();
    assert_eq!(disables.get(), 1, "disabled on the 1->0 transition");
    assert!(!runtime.updating_enabled());
}

#[test]
fn test_failed_initialize_leaves_control_uninitialized() {
    let (runtime, enables, _) = runtime_with_counters();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .build(StubDriver::failing(&log));

    let result = control.borrow_mut().initialize_context();
    assert!(result.is_err());
    assert!(!control.borrow().gl_initialized());
    assert_eq!(runtime.live_contexts(), 0);
    assert_eq!(enables.get(), 0);
}

#[test]
fn test_effective_double_buffer_is_frozen_at_initialize() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .size(4, 4)
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    assert!(control.requirements().double_buffer);
    control.initialize_context().unwrap();
    // Mutating requirements after initialize must not change the capture
    // source.
    control.requirements_mut().double_buffer = false;

    control.save_screen(Rect::new(0, 0, 4, 4)).unwrap();
    assert!(log.borrow().contains(&"read Back".to_string()));
}

#[test]
fn test_save_screen_reads_back_buffer_when_double_buffered() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .size(8, 8)
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    control.initialize_context().unwrap();
    let shot = control.save_screen(Rect::new(0, 0, 8, 8)).unwrap();
    assert_eq!(shot.dimensions(), (8, 8));
    assert_eq!(shot.get_pixel(0, 0).0, [BACK_FILL; 4]);
}

#[test]
fn test_save_screen_reads_front_buffer_when_single_buffered() {
    let runtime = runtime();
    let log = new_log();
    let mut requirements = ContextRequirements::default();
    requirements.double_buffer = false;
    let control = GlControl::builder(Rc::clone(&runtime))
        .size(8, 8)
        .requirements(requirements)
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    control.initialize_context().unwrap();
    let shot = control.save_screen(Rect::new(0, 0, 8, 8)).unwrap();
    assert_eq!(shot.get_pixel(0, 0).0, [FRONT_FILL; 4]);
    assert!(log.borrow().contains(&"read Front".to_string()));
}

#[test]
fn test_save_screen_renders_before_reading() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .size(2, 2)
        .events(RecordingEvents::boxed(&log))
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    control.initialize_context().unwrap();
    log.borrow_mut().clear();
    control.save_screen(Rect::new(0, 0, 2, 2)).unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["make_current", "before_render", "render", "read Back"]
    );
}

#[test]
fn test_do_render_sequence_and_swap() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .size(16, 16)
        .events(RecordingEvents::boxed(&log))
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    control.initialize_context().unwrap();
    log.borrow_mut().clear();
    control.do_render().unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["make_current", "before_render", "render", "swap_buffers"]
    );
}

#[test]
fn test_do_render_viewport_workaround_before_swap() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .size(16, 16)
        .swap_viewport_workaround(true)
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    control.initialize_context().unwrap();
    log.borrow_mut().clear();
    control.do_render().unwrap();
    assert_eq!(*log.borrow(), vec!["make_current", "viewport 16x16", "swap_buffers"]);
}

#[test]
fn test_do_render_requires_initialized_context() {
    let runtime = runtime();
    let log = new_log();
    let control = simple_control(&runtime, &log);
    let result = control.borrow_mut().do_render();
    assert!(matches!(result, Err(SurfaceError::NotInitialized)));
}

#[test]
fn test_failed_render_does_not_swap() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .events(Box::new(FailingRender))
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    control.initialize_context().unwrap();
    assert!(control.do_render().is_err());
    assert!(!log.borrow().contains(&"swap_buffers".to_string()));
}

#[test]
fn test_do_update_requests_redraw_only_with_auto_redisplay() {
    let runtime = runtime();
    let log = new_log();
    let redraws = Rc::new(Cell::new(0));
    let control = GlControl::builder(Rc::clone(&runtime))
        .redraw(Box::new(CountingRedraw {
            count: Rc::clone(&redraws),
        }))
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    control.initialize_context().unwrap();
    let after_open = redraws.get();
    control.do_update().unwrap();
    assert_eq!(redraws.get(), after_open + 1);

    control.set_auto_redisplay(false);
    control.do_update().unwrap();
    assert_eq!(redraws.get(), after_open + 1, "no redraw without AutoRedisplay");
}

#[test]
fn test_do_update_makes_context_current_before_update_event() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .events(RecordingEvents::boxed(&log))
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    control.initialize_context().unwrap();
    log.borrow_mut().clear();
    control.do_update().unwrap();
    assert_eq!(*log.borrow(), vec!["make_current", "update"]);
}

#[test]
fn test_designed_component_lookup() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .design_loader(Box::new(StaticLoader))
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    control.load_design("file:///designs/main.design").unwrap();
    let viewport = control.designed_component("Viewport", true).unwrap();
    assert_eq!(viewport.unwrap().name(), "Viewport");
}

#[test]
fn test_designed_component_required_miss_fails() {
    let runtime = runtime();
    let log = new_log();
    let control = simple_control(&runtime, &log);
    let control = control.borrow();

    let result = control.designed_component("Missing", true);
    assert!(matches!(
        result,
        Err(DesignError::ComponentNotFound { .. })
    ));
}

#[test]
fn test_designed_component_optional_miss_returns_none() {
    let runtime = runtime();
    let log = new_log();
    let control = simple_control(&runtime, &log);
    let control = control.borrow();
    assert!(control.designed_component("Missing", false).unwrap().is_none());
}

#[test]
fn test_design_load_strict_policy_raises() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .design_loader(Box::new(FailingLoader))
        .load_policy(LoadPolicy::Strict)
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    let result = control.load_design("file:///designs/broken.design");
    assert!(matches!(
        result,
        Err(SurfaceError::Design(DesignError::LoadFailed { .. }))
    ));
    assert!(control.designed_component("Root", false).unwrap().is_none());
}

#[test]
fn test_design_load_warn_and_skip_policy_absorbs() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .design_loader(Box::new(FailingLoader))
        .load_policy(LoadPolicy::WarnAndSkip)
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    control.load_design("file:///designs/broken.design").unwrap();
    assert!(control.designed_component("Root", false).unwrap().is_none());
}

#[test]
fn test_design_url_auto_loads_on_initialize() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .design_loader(Box::new(StaticLoader))
        .design_url("file:///designs/main.design")
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    control.initialize_context().unwrap();
    assert!(control.designed_component("Root", false).unwrap().is_some());
}

#[test]
fn test_unload_design_releases_subtree() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .design_loader(Box::new(StaticLoader))
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    control.load_design("file:///designs/main.design").unwrap();
    control.unload_design();
    assert!(control.designed_component("Viewport", false).unwrap().is_none());
}

#[test]
fn test_resize_surface_updates_viewport_and_fires_event() {
    let runtime = runtime();
    let log = new_log();
    let control = GlControl::builder(Rc::clone(&runtime))
        .size(10, 10)
        .events(RecordingEvents::boxed(&log))
        .build(StubDriver::boxed(&log));
    let mut control = control.borrow_mut();

    control.initialize_context().unwrap();
    log.borrow_mut().clear();
    control.resize_surface(20, 30).unwrap();
    assert_eq!(*log.borrow(), vec!["make_current", "viewport 20x30", "resize"]);
    assert_eq!(control.surface_size(), (20, 30));
}

#[test]
fn test_drop_finalizes_and_unregisters() {
    let runtime = runtime();
    let log = new_log();
    let control = simple_control(&runtime, &log);
    control.borrow_mut().initialize_context().unwrap();
    assert_eq!(runtime.registered_controls(), 1);

    drop(control);
    assert_eq!(runtime.registered_controls(), 0);
    assert_eq!(runtime.live_contexts(), 0);
    assert!(log.borrow().contains(&"destroy".to_string()));
}

#[test]
fn test_pump_services_initialized_controls_only() {
    let runtime = runtime();
    let log_a = new_log();
    let log_b = new_log();
    let a = GlControl::builder(Rc::clone(&runtime))
        .events(RecordingEvents::boxed(&log_a))
        .build(StubDriver::boxed(&new_log()));
    let _b = GlControl::builder(Rc::clone(&runtime))
        .events(RecordingEvents::boxed(&log_b))
        .build(StubDriver::boxed(&new_log()));

    a.borrow_mut().initialize_context().unwrap();
    runtime.process_tick();
    assert!(log_a.borrow().contains(&"update".to_string()));
    assert!(!log_b.borrow().contains(&"update".to_string()));
}

/// Update handler that destroys its own control by dropping the only
/// external strong reference to it.
struct SelfDestruct {
    slot: Rc<RefCell<Option<Rc<RefCell<GlControl>>>>>,
    updates: Rc<Cell<usize>>,
}

impl SurfaceEvents for SelfDestruct {
    fn update(&mut self) -> EventResult {
        self.updates.set(self.updates.get() + 1);
        self.slot.borrow_mut().take();
        Ok(())
    }
}

#[test]
fn test_pump_survives_control_destroying_itself_mid_tick() {
    let runtime = runtime();
    let slot = Rc::new(RefCell::new(None));
    let self_updates = Rc::new(Cell::new(0));
    let other_log = new_log();

    let doomed = GlControl::builder(Rc::clone(&runtime))
        .events(Box::new(SelfDestruct {
            slot: Rc::clone(&slot),
            updates: Rc::clone(&self_updates),
        }))
        .build(StubDriver::boxed(&new_log()));
    let survivor = GlControl::builder(Rc::clone(&runtime))
        .events(RecordingEvents::boxed(&other_log))
        .build(StubDriver::boxed(&other_log));

    doomed.borrow_mut().initialize_context().unwrap();
    survivor.borrow_mut().initialize_context().unwrap();
    *slot.borrow_mut() = Some(doomed);

    runtime.process_tick();

    assert_eq!(self_updates.get(), 1, "doomed control updated exactly once");
    let survivor_updates = other_log
        .borrow()
        .iter()
        .filter(|c| *c == "update")
        .count();
    assert_eq!(survivor_updates, 1, "survivor neither skipped nor revisited");
    assert_eq!(runtime.registered_controls(), 1);
    assert_eq!(runtime.live_contexts(), 1);

    // The next tick only services the survivor.
    runtime.process_tick();
    assert_eq!(self_updates.get(), 1);
}

/// Update handler that destroys a *different* control mid-tick.
struct DestroyOther {
    victim: Rc<RefCell<Option<Rc<RefCell<GlControl>>>>>,
}

impl SurfaceEvents for DestroyOther {
    fn update(&mut self) -> EventResult {
        self.victim.borrow_mut().take();
        Ok(())
    }
}

#[test]
fn test_pump_survives_control_destroying_another_mid_tick() {
    let runtime = runtime();
    let victim_slot = Rc::new(RefCell::new(None));
    let victim_log = new_log();

    // Registered first, so the back-to-front pump visits the killer first.
    let victim = GlControl::builder(Rc::clone(&runtime))
        .events(RecordingEvents::boxed(&victim_log))
        .build(StubDriver::boxed(&victim_log));
    let killer = GlControl::builder(Rc::clone(&runtime))
        .events(Box::new(DestroyOther {
            victim: Rc::clone(&victim_slot),
        }))
        .build(StubDriver::boxed(&new_log()));

    victim.borrow_mut().initialize_context().unwrap();
    killer.borrow_mut().initialize_context().unwrap();
    *victim_slot.borrow_mut() = Some(victim);

    runtime.process_tick();

    let victim_updates = victim_log
        .borrow()
        .iter()
        .filter(|c| *c == "update")
        .count();
    assert_eq!(victim_updates, 0, "destroyed before its turn, not visited");
    assert_eq!(runtime.registered_controls(), 1);
    assert_eq!(runtime.live_contexts(), 1);
}
