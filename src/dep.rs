//! The dependency graph: the `target -> key -> dep-set` index and the `track`/`trigger`
//! algorithm of ยง4.4.
//!
//! Grounded on `root.rs`'s `DependencyTracker` / `mark_dependents_dirty` /
//! `propagate_node_updates` (collect a work list, then run it), generalized from a single
//! dependency-per-node-id model to the spec's keyed dep-sets.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::effect::{self, EffectState};
use crate::runtime;
use crate::value::Key;
use crate::warn::dev_warn;

/// What kind of access caused a `track` call. Only consulted for the `on_track` diagnostic hook
/// and for the ADD/DELETE iteration-key rule in `trigger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

/// A set of effects interested in one `(target, key)` pair. Membership order is preserved
/// (insertion order) since `trigger` must run effects in insertion order within a class.
#[derive(Default)]
pub struct DepInner {
    pub(crate) effects: Vec<Rc<EffectState>>,
}

#[derive(Clone)]
pub struct Dep(pub(crate) Rc<RefCell<DepInner>>);

impl Dep {
    fn new() -> Self {
        Dep(Rc::new(RefCell::new(DepInner::default())))
    }

    fn contains(&self, state: &Rc<EffectState>) -> bool {
        self.0
            .borrow()
            .effects
            .iter()
            .any(|e| Rc::ptr_eq(e, state))
    }

    pub(crate) fn remove(&self, state: &Rc<EffectState>) {
        self.0.borrow_mut().effects.retain(|e| !Rc::ptr_eq(e, state));
    }
}

impl PartialEq for Dep {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

thread_local! {
    static TARGET_MAP: RefCell<HashMap<usize, HashMap<Key, Dep>>> = RefCell::new(HashMap::new());
}

/// Record that the currently active effect (if any) depends on `(target, key)`.
///
/// No-op when tracking is paused or no effect is active, per ยง4.4.
pub fn track(target: usize, op: TrackOp, key: Key) {
    if runtime::is_tracking_paused() {
        return;
    }
    let Some(active) = effect::active_effect_state() else {
        return;
    };

    let dep = TARGET_MAP.with(|tm| {
        let mut tm = tm.borrow_mut();
        let keys = tm.entry(target).or_default();
        keys.entry(key.clone()).or_insert_with(Dep::new).clone()
    });

    if !dep.contains(&active) {
        dep.0.borrow_mut().effects.push(active.clone());
        effect::record_dep(&active, dep.clone());
    }

    if let Some(on_track) = effect::on_track_hook(&active) {
        on_track(TrackEvent { target, op, key });
    }
}

#[derive(Debug, Clone)]
pub struct TrackEvent {
    pub target: usize,
    pub op: TrackOp,
    pub key: Key,
}

#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub target: usize,
    pub op: TriggerOp,
    pub key: Option<Key>,
}

/// Collect every effect subscribed to `(target, key)` (plus, for ADD/DELETE, the iteration
/// key's dep-set, plus, for CLEAR, every dep-set under `target`), partition them into computed
/// vs. plain, and run computed effects before plain ones.
pub fn trigger(target: usize, op: TriggerOp, key: Option<Key>, iterate_key: Key) {
    let Some(key_deps) = TARGET_MAP.with(|tm| tm.borrow().get(&target).cloned_deps()) else {
        return;
    };

    let mut computed_runners: Vec<Rc<EffectState>> = Vec::new();
    let mut plain_effects: Vec<Rc<EffectState>> = Vec::new();

    let mut add_dep = |dep: &Dep| {
        // Snapshot: trigger must not observe a dep-set being mutated by an effect that runs as
        // part of this same trigger pass (ยง I6).
        let snapshot: Vec<Rc<EffectState>> = dep.0.borrow().effects.clone();
        for state in snapshot {
            if !state.active.get() {
                continue;
            }
            if state.options.computed {
                if !computed_runners.iter().any(|e| Rc::ptr_eq(e, &state)) {
                    computed_runners.push(state);
                }
            } else if !plain_effects.iter().any(|e| Rc::ptr_eq(e, &state)) {
                plain_effects.push(state);
            }
        }
    };

    match op {
        TriggerOp::Clear => {
            for dep in key_deps.values() {
                add_dep(dep);
            }
        }
        _ => {
            if let Some(ref k) = key {
                if let Some(dep) = key_deps.get(k) {
                    add_dep(dep);
                }
            }
            if matches!(op, TriggerOp::Add | TriggerOp::Delete) {
                if let Some(dep) = key_deps.get(&iterate_key) {
                    add_dep(dep);
                }
            }
        }
    }

    for state in computed_runners.into_iter().chain(plain_effects) {
        if let Some(on_trigger) = state.options.on_trigger.as_ref() {
            on_trigger(TriggerEvent { target, op, key: key.clone() });
        }
        effect::run_triggered(&state);
    }
}

/// Drop every per-key dep-set recorded for `target`. Used when a container target itself is
/// discarded from the identity registry (`mark_non_reactive` eviction) so its dep-sets do not
/// linger forever, matching the "not eagerly pruned, but not unbounded either" posture in the
/// design notes' accepted tradeoffs.
pub fn forget_target(target: usize) {
    TARGET_MAP.with(|tm| {
        tm.borrow_mut().remove(&target);
    });
    dev_warn!("reactivity: forgot target map entry for {target}");
}

trait ClonedDeps {
    fn cloned_deps(self) -> Option<HashMap<Key, Dep>>;
}
impl ClonedDeps for Option<&HashMap<Key, Dep>> {
    fn cloned_deps(self) -> Option<HashMap<Key, Dep>> {
        self.map(|m| m.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{effect, EffectOptions};
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc as StdRc;

    #[test]
    fn trigger_with_no_subscribers_is_a_no_op() {
        trigger(12345, TriggerOp::Set, Some(Key::from("x")), Key::Iterate);
    }

    #[test]
    fn track_then_trigger_reruns_effect() {
        let log = StdRc::new(StdRefCell::new(Vec::new()));
        let target = 42usize;
        let key = Key::from("a");

        let log2 = log.clone();
        let key2 = key.clone();
        let e = effect(
            move || {
                track(target, TrackOp::Get, key2.clone());
                log2.borrow_mut().push(1);
            },
            EffectOptions::default(),
        );
        assert_eq!(*log.borrow(), vec![1]);

        trigger(target, TriggerOp::Set, Some(key), Key::Iterate);
        assert_eq!(*log.borrow(), vec![1, 1]);

        effect::stop(&e);
        trigger(target, TriggerOp::Set, Some(Key::from("a")), Key::Iterate);
        assert_eq!(*log.borrow(), vec![1, 1]);
    }
}
