//! The base interceptor: read/write/has/delete/own-keys interception for plain object and array
//! targets (ยง4.2), including array identity-method patching.
//!
//! There is no file in the source pack that implements proxy-style property interception (the
//! teacher's `Signal<T>` is already a single typed cell, not a record/array facade), so this
//! module is original to this crate; every primitive it calls — `track`/`trigger`, the
//! `Observable` wrapping step — is reused unchanged from `dep.rs`/`identity.rs`.

use crate::dep::{self, TrackOp, TriggerOp};
use crate::identity::{self, Input, Observable};
use crate::runtime;
use crate::value::{same_value_zero, Key, Value};
use crate::warn::dev_warn;

fn iterate_key_for(target: &Value) -> Key {
    match target {
        Value::Array(_) => Key::Length,
        _ => Key::Iterate,
    }
}

fn raw_get(target: &Value, key: &Key) -> Option<Value> {
    match (target, key) {
        (Value::Object(o), Key::Str(s)) => o.0.borrow().get(s).cloned(),
        (Value::Array(a), Key::Index(i)) => a.0.borrow().get(*i).cloned(),
        (Value::Array(a), Key::Length) => Some(Value::Number(a.0.borrow().len() as f64)),
        _ => None,
    }
}

fn raw_set(target: &Value, key: &Key, value: Value) {
    match (target, key) {
        (Value::Object(o), Key::Str(s)) => {
            let mut data = o.0.borrow_mut();
            if let Some(idx) = data.index_of(s) {
                data.entries[idx].1 = value;
            } else {
                data.entries.push((s.clone(), value));
            }
        }
        (Value::Array(a), Key::Index(i)) => {
            let mut data = a.0.borrow_mut();
            if *i < data.len() {
                data[*i] = value;
            } else {
                data.resize(*i, Value::Null);
                data.push(value);
            }
        }
        (Value::Array(a), Key::Length) => {
            if let Value::Number(n) = value {
                a.0.borrow_mut().resize(n.max(0.0) as usize, Value::Null);
            }
        }
        _ => {}
    }
}

fn raw_delete(target: &Value, key: &Key) -> bool {
    match (target, key) {
        (Value::Object(o), Key::Str(s)) => {
            let mut data = o.0.borrow_mut();
            if let Some(idx) = data.index_of(s) {
                data.entries.remove(idx);
                true
            } else {
                false
            }
        }
        (Value::Array(a), Key::Index(i)) => {
            let mut data = a.0.borrow_mut();
            if *i < data.len() {
                data.remove(*i);
                true
            } else {
                false
            }
        }
        _ => false,
    }
}

fn raw_own_keys(target: &Value) -> Vec<Key> {
    match target {
        Value::Object(o) => o.0.borrow().entries.iter().map(|(k, _)| Key::Str(k.clone())).collect(),
        Value::Array(a) => (0..a.0.borrow().len()).map(Key::Index).collect(),
        _ => Vec::new(),
    }
}

/// `Read` (ยง4.2): track, unwrap nested refs, and wrap observable-kind results (unless the view
/// is shallow).
pub fn get(view: &Observable, key: Key) -> Option<Input> {
    let value = raw_get(&view.target, &key);
    // Track unconditionally, even when the key does not (yet) exist: an effect that reads a
    // missing key today must still re-run once that key is later ADDed.
    dep::track(view.id(), TrackOp::Get, key);
    let value = value?;

    let value = match value {
        Value::Ref(cell) if !view.is_shallow() => cell.borrow().clone(),
        other => other,
    };

    if view.is_shallow() {
        return Some(Input::Raw(value));
    }

    Some(if view.is_read_only() {
        identity::read_only(value)
    } else {
        identity::observe(value)
    })
}

/// `Write` (ยง4.2): unwrap the incoming value, route through a nested ref cell if present,
/// otherwise store and trigger ADD/SET using SameValueZero change detection.
pub fn set(view: &Observable, key: Key, value: impl Into<Input>) {
    if view.is_read_only() {
        if runtime::is_locked() {
            dev_warn!("reactivity: cannot assign to read-only view property {key:?} while locked");
        }
        return;
    }

    let incoming = identity::raw(value);
    let old = raw_get(&view.target, &key);

    if let Some(Value::Ref(cell)) = &old {
        if !matches!(incoming, Value::Ref(_)) {
            let wrapped = if incoming.is_observable_kind() {
                identity::raw(identity::observe(incoming))
            } else {
                incoming
            };
            *cell.borrow_mut() = wrapped;
            return;
        }
    }

    let existed = old.is_some();
    raw_set(&view.target, &key, incoming.clone());

    if !existed {
        dep::trigger(view.id(), TriggerOp::Add, Some(key), iterate_key_for(&view.target));
    } else if !same_value_zero(old.as_ref().unwrap(), &incoming) {
        dep::trigger(view.id(), TriggerOp::Set, Some(key), iterate_key_for(&view.target));
    }
}

/// `Delete` (ยง4.2).
pub fn delete(view: &Observable, key: Key) -> bool {
    if view.is_read_only() {
        if runtime::is_locked() {
            dev_warn!("reactivity: cannot delete read-only view property {key:?} while locked");
            return false;
        }
        return false;
    }
    if raw_delete(&view.target, &key) {
        dep::trigger(view.id(), TriggerOp::Delete, Some(key), iterate_key_for(&view.target));
        true
    } else {
        false
    }
}

/// `Has-test` (ยง4.2).
pub fn has(view: &Observable, key: Key) -> bool {
    let present = raw_get(&view.target, &key).is_some();
    dep::track(view.id(), TrackOp::Has, key);
    present
}

/// `Own-keys enumeration` (ยง4.2).
pub fn own_keys(view: &Observable) -> Vec<Key> {
    dep::track(view.id(), TrackOp::Iterate, Key::Iterate);
    raw_own_keys(&view.target)
}

/// Identity-sensitive array method: `includes`. Operates on raw values so that identity checks
/// against values already unwrapped by user code still match (ยง P7).
pub fn includes(view: &Observable, needle: &Value) -> bool {
    dep::track(view.id(), TrackOp::Iterate, Key::Iterate);
    match &view.target {
        Value::Array(a) => a.0.borrow().iter().any(|v| same_value_zero(v, needle)),
        _ => false,
    }
}

pub fn index_of(view: &Observable, needle: &Value) -> Option<usize> {
    dep::track(view.id(), TrackOp::Iterate, Key::Iterate);
    match &view.target {
        Value::Array(a) => a.0.borrow().iter().position(|v| same_value_zero(v, needle)),
        _ => None,
    }
}

pub fn last_index_of(view: &Observable, needle: &Value) -> Option<usize> {
    dep::track(view.id(), TrackOp::Iterate, Key::Iterate);
    match &view.target {
        Value::Array(a) => a.0.borrow().iter().rposition(|v| same_value_zero(v, needle)),
        _ => None,
    }
}

/// `push` is not one of the spec's named identity methods, but arrays need *some* mutator;
/// grounded directly in ยง8 scenario 3 (`arr.push(4)`), it is implemented as ADD on the new
/// index plus a SET-equivalent iteration trigger on `length`.
pub fn push(view: &Observable, value: impl Into<Input>) -> usize {
    if view.is_read_only() {
        return match &view.target {
            Value::Array(a) => a.0.borrow().len(),
            _ => 0,
        };
    }
    let incoming = identity::raw(value);
    let index = match &view.target {
        Value::Array(a) => {
            let mut data = a.0.borrow_mut();
            data.push(incoming);
            data.len() - 1
        }
        _ => return 0,
    };
    dep::trigger(view.id(), TriggerOp::Add, Some(Key::Index(index)), Key::Length);
    index + 1
}

pub fn len(view: &Observable) -> usize {
    dep::track(view.id(), TrackOp::Iterate, Key::Length);
    match &view.target {
        Value::Array(a) => a.0.borrow().len(),
        Value::Object(o) => o.0.borrow().entries.len(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{effect, EffectOptions};
    use crate::value::{RawArray, RawObject};
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc as StdRc;

    fn observable_object() -> Observable {
        match identity::observe(Value::Object(RawObject::new())) {
            Input::View(o) => o,
            Input::Raw(_) => panic!("expected view"),
        }
    }

    #[test]
    fn scenario_1_add_set_and_delete_tracking() {
        let o = observable_object();
        set(&o, Key::from("a"), Input::Raw(Value::Number(1.0)));
        set(&o, Key::from("b"), Input::Raw(Value::Number(2.0)));

        let run = StdRc::new(StdRefCell::new(Vec::new()));
        let run2 = run.clone();
        let o2 = o.clone();
        let _e = effect(
            move || {
                let a = Value::as_number_or_nan(
                    get(&o2, Key::from("a")).map(identity::raw).as_ref(),
                );
                let b = Value::as_number_or_nan(
                    get(&o2, Key::from("b")).map(identity::raw).as_ref(),
                );
                run2.borrow_mut().push(a + b);
            },
            EffectOptions::default(),
        );
        assert_eq!(*run.borrow(), vec![3.0]);

        set(&o, Key::from("a"), Input::Raw(Value::Number(10.0)));
        assert_eq!(*run.borrow(), vec![3.0, 12.0]);

        set(&o, Key::from("c"), Input::Raw(Value::Number(7.0)));
        assert_eq!(*run.borrow(), vec![3.0, 12.0], "c was never read, so no re-run");

        delete(&o, Key::from("b"));
        assert!(run.borrow().last().unwrap().is_nan(), "missing key reads as NaN");
    }

    #[test]
    fn scenario_3_array_length_tracking() {
        let arr = match identity::observe(Value::Array(RawArray::from_vec(vec![
            Value::Number(1.0),
            Value::Number(2.0),
            Value::Number(3.0),
        ]))) {
            Input::View(o) => o,
            Input::Raw(_) => panic!("expected view"),
        };

        let seen = StdRc::new(StdRefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let arr2 = arr.clone();
        let _e = effect(
            move || {
                seen2.borrow_mut().push(len(&arr2));
            },
            EffectOptions::default(),
        );
        assert_eq!(*seen.borrow(), vec![3]);

        push(&arr, Input::Raw(Value::Number(4.0)));
        assert_eq!(*seen.borrow(), vec![3, 4]);
    }

    #[test]
    fn identity_method_matches_unwrapped_value() {
        let obj = Value::Object(RawObject::new());
        let arr = match identity::observe(Value::Array(RawArray::from_vec(vec![obj.clone()]))) {
            Input::View(o) => o,
            Input::Raw(_) => panic!("expected view"),
        };
        assert!(includes(&arr, &obj));
    }
}
