//! A fine-grained reactivity engine: observable wrapping, a keyed dependency graph, an effect
//! runtime with memoized (computed) effects, and a microtask-batched scheduler.
//!
//! The public surface is organized the way the underlying algorithm is: the identity registry
//! decides what an observable *is*, the dependency graph and runtime decide when something
//! re-runs, effects and computed values are the two kinds of thing that can re-run, and the
//! scheduler decides in what order and how often. [`base_handlers`] and [`collection_handlers`]
//! are the read/write interception tables for plain objects/arrays and for
//! `Map`/`Set`/`WeakMap`/`WeakSet` respectively; most callers will not need to reach into them
//! directly.

#![warn(missing_docs)]

pub mod base_handlers;
pub mod collection_handlers;
mod computed;
mod dep;
mod effect;
mod error;
mod identity;
mod refs;
mod runtime;
mod scheduler;
mod value;
mod warn;

pub use computed::{computed, computed_with, Computed};
pub use dep::{TrackEvent, TrackOp, TriggerEvent, TriggerOp};
pub use effect::{effect, stop, EffectOptions, ReactiveEffect};
pub use error::ReactivityError;
pub use identity::{
    is_observable, is_read_only, mark_non_reactive, mark_read_only, observe, raw, read_only,
    shallow_read_only, Input, Mode, Observable,
};
pub use refs::{is_ref, ref_, to_refs, FromValue, IntoValue, ObjectFieldRef, Ref};
pub use runtime::{pause_tracking, resume_tracking, set_locked, untrack, Locked};
pub use scheduler::{
    flush_jobs, flush_post_flush_cbs, next_tick, queue_job, queue_post_flush_cb, set_auto_flush,
    NextTick,
};
pub use value::{
    same_value_zero, HashableValue, Key, MapData, ObjectData, RawArray, RawMap, RawObject, RawSet,
    RawWeakMap, RawWeakSet, SetData, Value, WeakMapData, WeakSetData,
};

#[cfg(feature = "async-scheduler")]
pub use scheduler::set_async_scheduler;

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// End-to-end smoke test exercising observe -> effect -> computed -> scheduler together,
    /// since each module's own tests only exercise it in isolation.
    #[test]
    fn observe_effect_and_computed_interact_across_module_boundaries() {
        let r = ref_(1.0f64);
        let r2 = r.clone();
        let doubled = computed(move || r2.get() * 2.0);

        let log = Rc::new(RefCell::new(Vec::new()));
        let log2 = log.clone();
        let doubled2 = doubled.clone();
        let job_ran = Rc::new(RefCell::new(false));
        let job_ran2 = job_ran.clone();
        let _e = effect(
            move || {
                let v = doubled2.get();
                log2.borrow_mut().push(v);
                let job_ran3 = job_ran2.clone();
                queue_job(Rc::new(move || *job_ran3.borrow_mut() = true));
            },
            EffectOptions::default(),
        );
        assert_eq!(*log.borrow(), vec![2.0]);
        assert!(*job_ran.borrow(), "the default scheduler backend flushes synchronously");

        r.set(5.0);
        assert_eq!(*log.borrow(), vec![2.0, 10.0]);
    }
}
