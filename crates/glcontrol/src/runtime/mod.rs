//! Process-wide runtime: containers registry, shared pump, frame limiting
//!
//! One [`GlRuntime`] per process coordinates every live
//! [`GlControl`](crate::surface::GlControl): it keeps the ordered registry
//! the pump walks, the live-context counter that gates the pump, and the
//! frame-rate limiter state. Everything here assumes the single-threaded
//! cooperative model: all controls, the pump, and GPU calls run on the one
//! host UI thread, so plain `Cell`/`RefCell` state suffices and correctness
//! comes from sequencing rather than locking.

use crate::context::GpuInfo;
use crate::surface::GlControl;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

/// Strategy supplying the shared timer source that drives the pump
///
/// The embedding surface type implements this over whatever timer its
/// host toolkit provides. `enable` and `disable` are each invoked exactly
/// once per 0→1 / 1→0 live-context transition; the timer's tick handler
/// must call [`GlRuntime::process_tick`].
pub trait TickSource {
    /// Start the shared timer
    fn enable(&self);

    /// Stop the shared timer
    fn disable(&self);
}

/// Application-wide properties collaborator
///
/// Optional hooks the runtime fires alongside per-control events. All
/// methods have no-op defaults.
pub trait AppHooks {
    /// A GPU context is opening; fired before the control's own open event
    fn context_early_open(&self) {}

    /// Global per-tick update, fired after every control was serviced
    fn update(&self) {}

    /// Frames-per-second cap for the pump; 0 disables limiting
    fn limit_fps(&self) -> f32 {
        0.0
    }
}

/// Runtime behavior switches
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Skip frame-rate limiting entirely
    ///
    /// Some platform/toolkit combinations misbehave when the tick handler
    /// sleeps; embedders on such platforms opt out here instead of the
    /// runtime guessing.
    pub skip_fps_limit: bool,
}

/// Process-wide runtime shared by every control
///
/// Created once at process start and passed (as `Rc`) to every control;
/// it must outlive them all. The registry holds weak references only — the
/// runtime never owns a control's lifetime and tolerates entries dying
/// during teardown races.
pub struct GlRuntime {
    registry: RefCell<Vec<(u64, Weak<RefCell<GlControl>>)>>,
    live_contexts: Cell<usize>,
    updating_enabled: Cell<bool>,
    last_limited: Cell<Option<Instant>>,
    gpu_probed: Cell<bool>,
    next_control_id: Cell<u64>,
    tick_source: Box<dyn TickSource>,
    hooks: RefCell<Option<Rc<dyn AppHooks>>>,
    options: RuntimeOptions,
}

impl GlRuntime {
    /// Create the process-wide runtime with the given timer strategy
    pub fn new(tick_source: Box<dyn TickSource>, options: RuntimeOptions) -> Rc<Self> {
        Rc::new(Self {
            registry: RefCell::new(Vec::new()),
            live_contexts: Cell::new(0),
            updating_enabled: Cell::new(false),
            last_limited: Cell::new(None),
            gpu_probed: Cell::new(false),
            next_control_id: Cell::new(0),
            tick_source,
            hooks: RefCell::new(None),
            options,
        })
    }

    /// Install the application-wide properties collaborator
    pub fn set_hooks(&self, hooks: Rc<dyn AppHooks>) {
        *self.hooks.borrow_mut() = Some(hooks);
    }

    /// Number of currently initialized GPU contexts in the process
    pub fn live_contexts(&self) -> usize {
        self.live_contexts.get()
    }

    /// Whether the shared pump is currently enabled
    pub fn updating_enabled(&self) -> bool {
        self.updating_enabled.get()
    }

    /// Number of controls currently registered
    pub fn registered_controls(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Service one tick of the shared pump
    ///
    /// Walks the registry back-to-front so a control destroyed from inside
    /// an update handler (its own or another's) is neither skipped nor
    /// visited twice, fires the global update hook, then applies the
    /// frame-rate limiter. Handler errors are logged and do not abort the
    /// tick; a timer callback has nowhere to propagate them.
    pub fn process_tick(&self) {
        let snapshot: Vec<(u64, Weak<RefCell<GlControl>>)> = self.registry.borrow().clone();
        for (id, weak) in snapshot.iter().rev() {
            let still_registered = self
                .registry
                .borrow()
                .iter()
                .any(|(live_id, _)| live_id == id);
            if !still_registered {
                continue;
            }
            let Some(control) = weak.upgrade() else {
                continue;
            };
            let mut control = control.borrow_mut();
            if control.gl_initialized() {
                if let Err(err) = control.do_update() {
                    log::error!("Update failed for control {id}: {err}");
                }
            }
        }

        let hooks = self.hooks.borrow().clone();
        if let Some(hooks) = hooks {
            hooks.update();
        }

        if !self.options.skip_fps_limit {
            self.limit_frame_rate();
        }
    }

    fn limit_frame_rate(&self) {
        let hooks = self.hooks.borrow().clone();
        let fps_cap = hooks.map_or(0.0, |hooks| hooks.limit_fps());
        if fps_cap <= 0.0 {
            return;
        }

        let now = Instant::now();
        // No stamp yet means the first limited tick measures a huge elapsed
        // time and never sleeps: startup and stalled tick sequences are not
        // penalized, only ticks running faster than the cap.
        let elapsed = self
            .last_limited
            .get()
            .map_or(Duration::MAX, |last| now.duration_since(last));

        if let Some(sleep) = frame_rate_sleep(fps_cap, elapsed) {
            std::thread::sleep(sleep);
            self.last_limited.set(Some(Instant::now()));
        } else {
            self.last_limited.set(Some(now));
        }
    }

    pub(crate) fn next_control_id(&self) -> u64 {
        let id = self.next_control_id.get();
        self.next_control_id.set(id + 1);
        id
    }

    pub(crate) fn register_control(&self, id: u64, control: Weak<RefCell<GlControl>>) {
        self.registry.borrow_mut().push((id, control));
    }

    pub(crate) fn unregister_control(&self, id: u64) {
        self.registry
            .borrow_mut()
            .retain(|(live_id, _)| *live_id != id);
    }

    pub(crate) fn context_opened(&self) -> usize {
        let live = self.live_contexts.get() + 1;
        self.live_contexts.set(live);
        live
    }

    pub(crate) fn context_closed(&self) -> usize {
        let live = self.live_contexts.get().saturating_sub(1);
        self.live_contexts.set(live);
        live
    }

    pub(crate) fn enable_updating_once(&self) {
        if !self.updating_enabled.get() {
            self.updating_enabled.set(true);
            self.tick_source.enable();
            log::debug!("Shared pump enabled");
        }
    }

    pub(crate) fn disable_updating_if_idle(&self) {
        if self.live_contexts.get() == 0 && self.updating_enabled.get() {
            self.updating_enabled.set(false);
            self.tick_source.disable();
            log::debug!("Shared pump disabled");
        }
    }

    pub(crate) fn log_gpu_info_once(&self, info: &GpuInfo) {
        if !self.gpu_probed.get() {
            self.gpu_probed.set(true);
            log::info!(
                "GPU: {} | {} | {}",
                info.vendor,
                info.renderer,
                info.version
            );
        }
    }

    pub(crate) fn hooks(&self) -> Option<Rc<dyn AppHooks>> {
        self.hooks.borrow().clone()
    }
}

/// Compute how long a tick must sleep to respect an FPS cap
///
/// `desired interval = 1 / fps_cap`; the sleep is the part of that interval
/// not already consumed by `elapsed`, rounded down to whole milliseconds.
/// Remainders of a millisecond or less are not worth a sleep and return
/// `None`.
pub fn frame_rate_sleep(fps_cap: f32, elapsed: Duration) -> Option<Duration> {
    // Non-finite caps come straight from user hooks; a NaN would panic
    // inside Duration::from_secs_f64.
    if !fps_cap.is_finite() || fps_cap <= 0.0 {
        return None;
    }
    let desired = Duration::from_secs_f64(1.0 / f64::from(fps_cap));
    let remainder = desired.checked_sub(elapsed)?;
    if remainder <= Duration::from_millis(1) {
        return None;
    }
    let whole_millis = u64::try_from(remainder.as_millis()).unwrap_or(u64::MAX);
    Some(Duration::from_millis(whole_millis))
}
