//! Computed (memoized) values (ยง4.7): a cached value backed by an inner effect whose scheduler
//! only flips a dirty flag, plus a second, value-level dep-set so outer effects that read the
//! computed re-run when its cached value actually changes rather than on every dependency churn.
//!
//! Grounded on `memos.rs`'s `create_selector_with` (dirty-flag-via-scheduler-closure trick: a
//! memo's inner effect does not eagerly recompute on every trigger, it defers to the next read).
//! The computed-before-plain ordering promised by ยง4.7 is not implemented here at all — it comes
//! for free from `EffectOptions.computed` plus `dep::trigger`'s own partition in `dep.rs`.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::dep::{self, TrackOp, TriggerOp};
use crate::effect::{self, effect, EffectOptions, ReactiveEffect};
use crate::refs::{FromValue, IntoValue};
use crate::value::{Key, Value};
use crate::warn::dev_warn;

const VALUE_KEY: &str = "value";

struct Inner {
    dirty: std::cell::Cell<bool>,
    cached: RefCell<Value>,
}

/// `computed(getter) -> C` / `computed(getter, setter) -> C`.
pub struct Computed<T> {
    inner: Rc<Inner>,
    effect: ReactiveEffect,
    setter: Option<Rc<dyn Fn(Value)>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Computed {
            inner: self.inner.clone(),
            effect: self.effect.clone(),
            setter: self.setter.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Computed<T> {
    fn id(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }
}

impl<T: IntoValue> Computed<T> {
    fn build(getter: impl Fn() -> T + 'static, setter: Option<Rc<dyn Fn(Value)>>) -> Self {
        let inner = Rc::new(Inner { dirty: std::cell::Cell::new(true), cached: RefCell::new(Value::Null) });

        let compute_inner = inner.clone();
        let body = move || {
            let value = getter().into_value();
            *compute_inner.cached.borrow_mut() = value;
            compute_inner.dirty.set(false);
        };

        let id = Rc::as_ptr(&inner) as usize;
        let schedule_inner = inner.clone();
        let options = EffectOptions {
            lazy: true,
            computed: true,
            scheduler: Some(Box::new(move |_e: ReactiveEffect| {
                // Only the clean-to-dirty transition needs to notify readers: once dirty, further
                // upstream churn before the next read changes nothing observable.
                if !schedule_inner.dirty.replace(true) {
                    dep::trigger(id, TriggerOp::Set, Some(Key::from(VALUE_KEY)), Key::Iterate);
                }
            })),
            ..Default::default()
        };

        let effect = effect(body, options);
        Computed { inner, effect, setter, _marker: PhantomData }
    }

    /// `computed(getter)`: read-only.
    pub fn new(getter: impl Fn() -> T + 'static) -> Self {
        Self::build(getter, None)
    }
}

impl<T: FromValue> Computed<T> {
    /// Recomputes on demand if dirty (bypassing the scheduler, which never runs the body itself),
    /// then tracks and returns the cached value.
    pub fn get(&self) -> T {
        if self.inner.dirty.get() {
            effect::run_now(&self.effect.0);
        }
        dep::track(self.id(), TrackOp::Get, Key::from(VALUE_KEY));
        T::from_value(self.inner.cached.borrow().clone())
    }

    pub fn get_untracked(&self) -> T {
        if self.inner.dirty.get() {
            effect::run_now(&self.effect.0);
        }
        T::from_value(self.inner.cached.borrow().clone())
    }
}

impl<T: IntoValue> Computed<T> {
    /// `computed_with`'s setter half. Writing to a read-only computed is a dev warning, matching
    /// ยง4.7's "write to a read-only computed is a no-op plus a dev warning" rule.
    pub fn set(&self, value: T) {
        match &self.setter {
            Some(setter) => setter(value.into_value()),
            None => dev_warn!("reactivity: write to a read-only computed was ignored"),
        }
    }
}

/// `computed(getter) -> C`: read-only memoized value.
pub fn computed<T: IntoValue + FromValue + 'static>(getter: impl Fn() -> T + 'static) -> Computed<T> {
    Computed::new(getter)
}

/// `computed_with(get, set) -> C`: writable memoized value. The setter is handed the raw value
/// (already unwrapped of observable wrapping) and is responsible for routing it wherever the
/// underlying state actually lives.
pub fn computed_with<T>(
    getter: impl Fn() -> T + 'static,
    setter: impl Fn(Value) + 'static,
) -> Computed<T>
where
    T: IntoValue + FromValue + 'static,
{
    Computed::build(getter, Some(Rc::new(setter)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{effect as mk_effect, EffectOptions as Opts};
    use crate::refs::ref_;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc as StdRc;

    #[test]
    fn scenario_4_computed_recomputes_lazily_and_orders_before_plain_effects() {
        let count = ref_(1.0f64);
        let count2 = count.clone();
        let recomputes = StdRc::new(StdRefCell::new(0));
        let recomputes2 = recomputes.clone();
        let doubled = computed(move || {
            *recomputes2.borrow_mut() += 1;
            count2.get() * 2.0
        });

        assert_eq!(*recomputes.borrow(), 0, "computed getter is lazy: no eager run on creation");

        let seen = StdRc::new(StdRefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let doubled2 = doubled.clone();
        let _e = mk_effect(move || seen2.borrow_mut().push(doubled2.get()), Opts::default());
        assert_eq!(*recomputes.borrow(), 1);
        assert_eq!(*seen.borrow(), vec![2.0]);

        count.set(5.0);
        assert_eq!(*seen.borrow(), vec![2.0, 10.0]);
        assert_eq!(*recomputes.borrow(), 2);
    }

    #[test]
    fn p5_computed_runs_before_a_plain_effect_sharing_the_same_dependency() {
        // Both the computed's inner effect and a plain effect below read `count` directly, so
        // both land in the same ref dep-set — this is the case where trigger's computed/plain
        // partition actually has something to order, unlike doubled2.get() alone.
        let count = ref_(1.0f64);
        let count_for_computed = count.clone();
        let count_for_plain = count.clone();
        let doubled = computed(move || count_for_computed.get() * 2.0);

        let order = StdRc::new(StdRefCell::new(Vec::new()));
        let order2 = order.clone();
        let doubled2 = doubled.clone();
        let _e = mk_effect(
            move || {
                count_for_plain.get();
                order2.borrow_mut().push(("plain", doubled2.get()));
            },
            Opts::default(),
        );
        assert_eq!(*order.borrow(), vec![("plain", 2.0)]);

        count.set(10.0);
        assert_eq!(
            *order.borrow(),
            vec![("plain", 2.0), ("plain", 20.0)],
            "the plain effect must observe the recomputed value, proving the computed's inner \
             effect ran first"
        );
    }

    #[test]
    fn computed_does_not_notify_on_dirty_to_dirty_transitions() {
        let count = ref_(1.0f64);
        let count2 = count.clone();
        let notify_count = StdRc::new(StdRefCell::new(0));
        let doubled = computed(move || count2.get() * 2.0);

        let notify2 = notify_count.clone();
        let doubled2 = doubled.clone();
        let _e = mk_effect(
            move || {
                doubled2.get();
                *notify2.borrow_mut() += 1;
            },
            Opts::default(),
        );
        assert_eq!(*notify_count.borrow(), 1);

        count.set(2.0);
        count.set(3.0);
        assert_eq!(
            *notify_count.borrow(),
            2,
            "two upstream changes before any read collapse into a single re-run"
        );
    }

    #[test]
    fn writable_computed_routes_writes_through_setter() {
        let source = ref_(1.0f64);
        let source_get = source.clone();
        let source_set = source.clone();
        let c = computed_with(
            move || source_get.get() * 2.0,
            move |v| source_set.set(Value::as_number_or_nan(Some(&v)) / 2.0),
        );
        assert_eq!(c.get(), 2.0);
        c.set(20.0);
        assert_eq!(source.get(), 10.0);
        assert_eq!(c.get(), 20.0);
    }
}
