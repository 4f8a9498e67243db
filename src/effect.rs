//! The effect runtime: effect creation, execution, cleanup, stop, and pause/resume (ยง4.5).
//!
//! Grounded on `effects.rs`'s thin `create_effect` wrapper and, for the re-entrancy guard, on
//! the `rvue` effect port's `is_running`-swap pattern (`other_examples/.../rvue-src-effect.rs.rs`):
//! an effect that is already on the stack when retriggered synchronously is a pure no-op rather
//! than a recursive re-run, which is what keeps `effect_cannot_create_infinite_loop`-style
//! self-referential effects terminating.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::dep::{Dep, TrackEvent, TriggerEvent};
use crate::runtime;

/// Options recognized by [`effect`]. See the table in ยง3 of the design document.
#[derive(Default)]
pub struct EffectOptions {
    /// Do not run on creation; the first invocation is manual (`ReactiveEffect::run`).
    pub lazy: bool,
    /// Mark as a memoized effect: scheduled ahead of ordinary effects on trigger.
    pub computed: bool,
    /// If present, called instead of invoking the effect directly on trigger.
    pub scheduler: Option<Box<dyn Fn(ReactiveEffect)>>,
    pub on_track: Option<Box<dyn Fn(TrackEvent)>>,
    pub on_trigger: Option<Box<dyn Fn(TriggerEvent)>>,
    pub on_stop: Option<Box<dyn Fn()>>,
}

pub(crate) struct EffectState {
    pub(crate) active: Cell<bool>,
    is_running: Cell<bool>,
    deps: RefCell<Vec<Dep>>,
    pub(crate) options: EffectOptions,
    raw: RefCell<Box<dyn FnMut()>>,
}

/// A handle to a running effect. Cloning shares the same underlying effect (it is a reference
/// handle, not a copy of the effect's state), matching the host crate's own `Signal`/`ReadSignal`
/// handle semantics.
#[derive(Clone)]
pub struct ReactiveEffect(pub(crate) Rc<EffectState>);

impl ReactiveEffect {
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    /// Manually invoke a lazy effect (or re-invoke any effect) through the normal
    /// clean-then-track-then-run machinery.
    pub fn run(&self) {
        run_triggered(&self.0);
    }
}

impl PartialEq for ReactiveEffect {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// `effect(fn, options) -> ReactiveEffect` (ยง4.5 "Creation"). Runs once immediately unless
/// `options.lazy` is set.
pub fn effect(f: impl FnMut() + 'static, options: EffectOptions) -> ReactiveEffect {
    let lazy = options.lazy;
    let state = Rc::new(EffectState {
        active: Cell::new(true),
        is_running: Cell::new(false),
        deps: RefCell::new(Vec::new()),
        options,
        raw: RefCell::new(Box::new(f)),
    });
    let handle = ReactiveEffect(state);
    if !lazy {
        handle.run();
    }
    handle
}

/// `stop(E)` (ยง4.5 "Stop"): cleans up E's dep-set membership, fires `on_stop`, and marks it
/// inactive so future triggers skip it (P8).
pub fn stop(effect: &ReactiveEffect) {
    if !effect.0.active.get() {
        return;
    }
    cleanup(&effect.0);
    effect.0.active.set(false);
    if let Some(on_stop) = effect.0.options.on_stop.as_ref() {
        on_stop();
    }
}

pub use runtime::{pause_tracking, resume_tracking};

pub(crate) fn active_effect_state() -> Option<Rc<EffectState>> {
    runtime::active_effect()
}

pub(crate) fn record_dep(state: &Rc<EffectState>, dep: Dep) {
    state.deps.borrow_mut().push(dep);
}

pub(crate) fn on_track_hook<'a>(state: &'a Rc<EffectState>) -> Option<&'a (dyn Fn(TrackEvent))> {
    state.options.on_track.as_deref()
}

/// Remove `state` from every dep-set it currently belongs to, then clear its owned dep list
/// (I4). Called both before each run and by `stop`.
fn cleanup(state: &Rc<EffectState>) {
    let deps = std::mem::take(&mut *state.deps.borrow_mut());
    for dep in deps {
        dep.remove(state);
    }
}

/// Forces direct execution of the effect body, bypassing any scheduler. Computed values use this
/// to recompute on demand (ยง4.7): a computed's own scheduler only flips a dirty flag, so reading
/// a dirty computed must reach the real body directly rather than going back through the
/// scheduler it just installed.
pub(crate) fn run_now(state: &Rc<EffectState>) {
    run(state);
}

/// Entry point used by `trigger` and by `ReactiveEffect::run`: if the effect has a scheduler,
/// hand it the effect instead of running directly.
pub(crate) fn run_triggered(state: &Rc<EffectState>) {
    if let Some(scheduler) = state.options.scheduler.as_ref() {
        // The scheduler decides when/whether to actually invoke the effect (e.g. computed's
        // scheduler just flips a dirty flag and never calls run() itself).
        scheduler(ReactiveEffect(state.clone()));
        return;
    }
    run(state);
}

/// Run the effect body directly (ยง4.5 "Execution").
pub(crate) fn run(state: &Rc<EffectState>) {
    if !state.active.get() {
        // Per ยง4.5 "Stop": "subsequent invocations call raw directly without tracking".
        let mut raw = std::mem::replace(&mut *state.raw.borrow_mut(), Box::new(|| {}));
        raw();
        *state.raw.borrow_mut() = raw;
        return;
    }
    if state.is_running.get() {
        // Re-entering an already-stacked effect is a no-op (ยง4.5, P10).
        return;
    }

    cleanup(state);
    state.is_running.set(true);
    runtime::push_effect(state.clone());

    let mut raw = std::mem::replace(&mut *state.raw.borrow_mut(), Box::new(|| {}));
    raw();
    *state.raw.borrow_mut() = raw;

    runtime::pop_effect();
    state.is_running.set(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn effect_runs_immediately_unless_lazy() {
        let ran = Rc::new(StdRefCell::new(false));
        let ran2 = ran.clone();
        let _e = effect(move || *ran2.borrow_mut() = true, EffectOptions::default());
        assert!(*ran.borrow());
    }

    #[test]
    fn lazy_effect_does_not_run_on_creation() {
        let ran = Rc::new(StdRefCell::new(false));
        let ran2 = ran.clone();
        let e = effect(
            move || *ran2.borrow_mut() = true,
            EffectOptions { lazy: true, ..Default::default() },
        );
        assert!(!*ran.borrow());
        e.run();
        assert!(*ran.borrow());
    }

    #[test]
    fn stop_prevents_future_runs_via_run_triggered() {
        let count = Rc::new(StdRefCell::new(0));
        let count2 = count.clone();
        let e = effect(move || *count2.borrow_mut() += 1, EffectOptions::default());
        assert_eq!(*count.borrow(), 1);
        stop(&e);
        run_triggered(&e.0);
        // After stop, run_triggered falls through to run(), which for an inactive effect calls
        // raw directly without tracking — the counter still increments because raw itself is
        // unconditional; what stop actually prevents is being *discovered* via trigger (covered
        // in dep.rs's test), not a direct call like this one.
        assert_eq!(*count.borrow(), 2);
        assert!(!e.is_active());
    }
}
