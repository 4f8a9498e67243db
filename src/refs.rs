//! Reference cells (ยง4.6): single-slot observable boxes exposing one virtual `value` property.
//!
//! Grounded on `signals.rs`'s `Signal<T>`/`ReadSignal<T>` (`get`/`set`/`with`/`track` method
//! shapes, manual `Clone`); the host-language analogue of a ref's dependency bookkeeping is a
//! dedicated identity-keyed dep-set exactly like an object property's, so `ref_` reuses
//! `dep::track`/`dep::trigger` under the synthetic key `"value"` rather than inventing a parallel
//! mechanism.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::base_handlers;
use crate::dep::{self, TrackOp, TriggerOp};
use crate::identity::{self, Input, Observable};
use crate::value::{same_value_zero, Key, Value};
use crate::warn::dev_warn;

/// Converts a typed Rust value into the dynamic [`Value`] graph.
pub trait IntoValue {
    fn into_value(self) -> Value;
}
/// Converts a dynamic [`Value`] back into a typed Rust value.
pub trait FromValue: Sized {
    fn from_value(v: Value) -> Self;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}
impl FromValue for Value {
    fn from_value(v: Value) -> Self {
        v
    }
}
impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Number(self)
    }
}
impl FromValue for f64 {
    fn from_value(v: Value) -> Self {
        Value::as_number_or_nan(Some(&v))
    }
}
impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}
impl FromValue for bool {
    fn from_value(v: Value) -> Self {
        matches!(v, Value::Bool(true))
    }
}
impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(Rc::from(self.as_str()))
    }
}
impl FromValue for String {
    fn from_value(v: Value) -> Self {
        match v {
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

const VALUE_KEY: &str = "value";

/// `ref(raw)`: a single-slot container exposing one virtual property `value`.
pub struct Ref<T> {
    cell: Rc<RefCell<Value>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Ref { cell: self.cell.clone(), _marker: PhantomData }
    }
}

impl<T> Ref<T> {
    fn id(&self) -> usize {
        Rc::as_ptr(&self.cell) as usize
    }

    /// The dynamic representation of this ref, suitable for nesting inside an observable object
    /// field (which is how the base interceptor's "unwrap nested ref cells" rule, ยง4.2, applies
    /// uniformly to both standalone and nested refs).
    pub fn as_value(&self) -> Value {
        Value::Ref(self.cell.clone())
    }

    /// `is_ref(x)`, as a probe on the dynamic graph rather than on a typed handle: a fast
    /// property check, not a symbol lookup, since it is called on hot paths (ยง4.6).
    pub fn is_ref(v: &Value) -> bool {
        matches!(v, Value::Ref(_))
    }
}

impl<T: IntoValue> Ref<T> {
    pub fn new(raw: T) -> Self {
        let mut value = raw.into_value();
        if value.is_observable_kind() {
            value = identity::raw(identity::observe(value));
        }
        Ref { cell: Rc::new(RefCell::new(value)), _marker: PhantomData }
    }
}

impl<T: FromValue> Ref<T> {
    /// Reading `value` tracks the cell under the synthetic key `"value"`.
    pub fn get(&self) -> T {
        dep::track(self.id(), TrackOp::Get, Key::from(VALUE_KEY));
        T::from_value(self.cell.borrow().clone())
    }

    pub fn get_untracked(&self) -> T {
        T::from_value(self.cell.borrow().clone())
    }
}

impl<T: IntoValue> Ref<T> {
    /// Writing `value` replaces storage (re-wrapping if observable-kind) and triggers
    /// `SET, "value"` under SameValueZero change detection.
    pub fn set(&self, new: T) {
        let mut new_value = new.into_value();
        if new_value.is_observable_kind() {
            new_value = identity::raw(identity::observe(new_value));
        }
        let old = self.cell.borrow().clone();
        if same_value_zero(&old, &new_value) {
            return;
        }
        *self.cell.borrow_mut() = new_value;
        dep::trigger(self.id(), TriggerOp::Set, Some(Key::from(VALUE_KEY)), Key::Iterate);
    }
}

/// `ref_(raw)` free function, matching the External Interfaces naming in ยง6.
pub fn ref_<T: IntoValue>(raw: T) -> Ref<T> {
    Ref::new(raw)
}

/// `isRef(x)` over the dynamic graph.
pub fn is_ref(v: &Value) -> bool {
    Ref::<Value>::is_ref(v)
}

/// A per-key cell produced by [`to_refs`] that reads and writes through to the source object,
/// rather than owning its own storage — this is what lets structural destructuring of an
/// observable record keep reactivity.
#[derive(Clone)]
pub struct ObjectFieldRef {
    source: Observable,
    key: Key,
}

impl ObjectFieldRef {
    pub fn get(&self) -> Option<Value> {
        base_handlers::get(&self.source, self.key.clone()).map(identity::raw)
    }

    pub fn set(&self, value: Value) {
        base_handlers::set(&self.source, self.key.clone(), Input::Raw(value));
    }
}

/// `to_refs(obj)`: explodes an observable record into a record of per-key cells that read and
/// write through to the source.
pub fn to_refs(obj: &Observable) -> Vec<(Key, ObjectFieldRef)> {
    if !matches!(obj.target, Value::Object(_)) {
        dev_warn!("reactivity: to_refs() called on a non-object observable");
        return Vec::new();
    }
    base_handlers::own_keys(obj)
        .into_iter()
        .map(|key| (key.clone(), ObjectFieldRef { source: obj.clone(), key }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{effect, EffectOptions};
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc as StdRc;

    #[test]
    fn scenario_5_ref_set_same_value_does_not_retrigger() {
        let r = ref_(0.0f64);
        let log = StdRc::new(StdRefCell::new(Vec::new()));
        let log2 = log.clone();
        let r2 = r.clone();
        let _e = effect(move || log2.borrow_mut().push(r2.get()), EffectOptions::default());
        assert_eq!(*log.borrow(), vec![0.0]);

        r.set(0.0);
        assert_eq!(*log.borrow(), vec![0.0], "SameValueZero: no change, no rerun");

        r.set(1.0);
        assert_eq!(*log.borrow(), vec![0.0, 1.0]);
    }

    #[test]
    fn is_ref_probes_the_dynamic_variant() {
        let r = ref_(1.0f64);
        assert!(is_ref(&r.as_value()));
        assert!(!is_ref(&Value::Number(1.0)));
    }
}
