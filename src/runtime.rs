//! Thread-local reactive runtime state: the active-effect stack, the tracking-paused flag, and
//! the locked-mode flag.
//!
//! Grounded on `Root`'s `thread_local! static GLOBAL_ROOT` / `current_node` cell in the
//! inherited crate: one thread-local slot holding "the thing currently executing". Here it is a
//! stack rather than a single cell because nested effect creation (an effect that creates
//! another effect inside its body) needs the inner effect to become active while the outer one
//! is still on the stack, and for control to return to the outer effect as active once the
//! inner one pops.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::effect::EffectState;

thread_local! {
    static EFFECT_STACK: RefCell<Vec<Rc<EffectState>>> = const { RefCell::new(Vec::new()) };
    static TRACKING_PAUSED: Cell<bool> = const { Cell::new(false) };
    static LOCKED: Cell<bool> = const { Cell::new(false) };
}

pub(crate) fn push_effect(state: Rc<EffectState>) {
    EFFECT_STACK.with(|s| s.borrow_mut().push(state));
}

pub(crate) fn pop_effect() {
    EFFECT_STACK.with(|s| {
        s.borrow_mut().pop();
    });
}

/// The currently active effect, i.e. the top of the effect stack. `track` calls are no-ops when
/// this is `None`.
pub(crate) fn active_effect() -> Option<Rc<EffectState>> {
    EFFECT_STACK.with(|s| s.borrow().last().cloned())
}

pub fn pause_tracking() {
    TRACKING_PAUSED.with(|p| p.set(true));
}

pub fn resume_tracking() {
    TRACKING_PAUSED.with(|p| p.set(false));
}

pub(crate) fn is_tracking_paused() -> bool {
    TRACKING_PAUSED.with(|p| p.get())
}

/// Run `f` with tracking paused, restoring the previous state afterwards even if `f` panics.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let prev = is_tracking_paused();
    pause_tracking();
    struct Restore(bool);
    impl Drop for Restore {
        fn drop(&mut self) {
            if self.0 {
                pause_tracking();
            } else {
                resume_tracking();
            }
        }
    }
    let _restore = Restore(prev);
    f()
}

pub fn is_locked() -> bool {
    LOCKED.with(|l| l.get())
}

pub fn set_locked(locked: bool) {
    LOCKED.with(|l| l.set(locked));
}

/// RAII guard that sets the process-wide locked flag for its lifetime, restoring the previous
/// value on drop. Mirrors the "surround library-owned windows by toggling the flag" guidance in
/// the design notes.
pub struct Locked {
    prev: bool,
}

impl Locked {
    pub fn enter() -> Self {
        let prev = is_locked();
        set_locked(true);
        Locked { prev }
    }
}

impl Drop for Locked {
    fn drop(&mut self) {
        set_locked(self.prev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrack_restores_previous_pause_state() {
        assert!(!is_tracking_paused());
        untrack(|| {
            assert!(is_tracking_paused());
        });
        assert!(!is_tracking_paused());
    }

    #[test]
    fn locked_guard_restores_previous_value() {
        assert!(!is_locked());
        {
            let _g = Locked::enter();
            assert!(is_locked());
        }
        assert!(!is_locked());
    }
}
