//! The collection interceptor: method-level interception for `Map`, `Set`, `WeakMap` and
//! `WeakSet` targets (ยง4.3).
//!
//! Containers cannot be intercepted at the property level since their operations are methods,
//! not fields; the host language has no prototype to rebind either, so this module exposes the
//! instrumented operations directly as functions over an [`Observable`]. Grounded on the same
//! `track`/`trigger` primitives as `base_handlers.rs`; no teacher file implements container
//! method interception, so the table itself is original to this crate.

use std::rc::Rc;

use crate::dep::{self, TrackOp, TriggerOp};
use crate::identity::{self, Input, Observable};
use crate::runtime;
use crate::value::{same_value_zero, Key, Value};
use crate::warn::dev_warn;

fn wrap(view: &Observable, value: Value) -> Input {
    if view.is_shallow() {
        return Input::Raw(value);
    }
    if view.is_read_only() {
        identity::read_only(value)
    } else {
        identity::observe(value)
    }
}

fn readonly_guard(view: &Observable, op: &str) -> bool {
    if view.is_read_only() {
        if runtime::is_locked() {
            dev_warn!("reactivity: cannot {op} on a read-only collection view while locked");
        }
        true
    } else {
        false
    }
}

/// `get(k)`: `track(GET, k)`.
pub fn get(view: &Observable, key: &Value) -> Option<Input> {
    let value = match &view.target {
        Value::Map(m) => m.0.borrow().entries.iter().find(|(k, _)| same_value_zero(&k.0, key)).map(|(_, v)| v.clone()),
        Value::WeakMap(m) => weak_map_get(m, key),
        _ => None,
    };
    dep::track(view.id(), TrackOp::Get, key_of(key));
    value.map(|v| wrap(view, v))
}

/// `has(k)`: `track(HAS, k)`.
pub fn has(view: &Observable, key: &Value) -> bool {
    let present = match &view.target {
        Value::Map(m) => m.0.borrow().index_of(key).is_some(),
        Value::Set(s) => s.0.borrow().index_of(key).is_some(),
        Value::WeakMap(m) => weak_map_get(m, key).is_some(),
        Value::WeakSet(s) => weak_set_contains(s, key),
        _ => false,
    };
    dep::track(view.id(), TrackOp::Has, key_of(key));
    present
}

/// `size`: `track(ITERATE, ITERATE_KEY)`.
pub fn size(view: &Observable) -> usize {
    dep::track(view.id(), TrackOp::Iterate, Key::Iterate);
    match &view.target {
        Value::Map(m) => m.0.borrow().entries.len(),
        Value::Set(s) => s.0.borrow().entries.len(),
        _ => 0,
    }
}

/// `add(v)` (set-kind): triggers `ADD, v` if absent.
pub fn add(view: &Observable, value: impl Into<Input>) -> bool {
    if readonly_guard(view, "add") {
        return false;
    }
    let value = identity::raw(value);
    let Value::Set(s) = &view.target else { return false };
    let already_present = s.0.borrow().index_of(&value).is_some();
    if already_present {
        return false;
    }
    s.0.borrow_mut().entries.push(value.clone());
    dep::trigger(view.id(), TriggerOp::Add, Some(Key::Value(crate::value::HashableValue(value))), Key::Iterate);
    true
}

/// `set(k, v)` (map-kind): `ADD, k` if absent, else `SET, k` if the value changed.
pub fn set(view: &Observable, key: impl Into<Input>, value: impl Into<Input>) {
    if readonly_guard(view, "set") {
        return;
    }
    let key = identity::raw(key);
    let value = identity::raw(value);
    match &view.target {
        Value::Map(m) => {
            let mut data = m.0.borrow_mut();
            if let Some(idx) = data.index_of(&key) {
                let old = data.entries[idx].1.clone();
                data.entries[idx].1 = value.clone();
                drop(data);
                if !same_value_zero(&old, &value) {
                    dep::trigger(view.id(), TriggerOp::Set, Some(key_of(&key)), Key::Iterate);
                }
            } else {
                data.entries.push((crate::value::HashableValue(key.clone()), value));
                drop(data);
                dep::trigger(view.id(), TriggerOp::Add, Some(key_of(&key)), Key::Iterate);
            }
        }
        Value::WeakMap(m) => {
            let Value::Object(obj) = &key else {
                dev_warn!("reactivity: WeakMap keys must be observable-kind objects");
                return;
            };
            let mut data = m.0.borrow_mut();
            let weak = Rc::downgrade(&obj.0);
            if let Some(entry) = data
                .entries
                .iter_mut()
                .find(|(k, _)| k.upgrade().is_some_and(|k| Rc::ptr_eq(&k, &obj.0)))
            {
                entry.1 = value;
            } else {
                data.entries.push((weak, value));
            }
            // WeakMap/WeakSet are not enumerable, so there is no ITERATE_KEY trigger here (ยง4.3).
            drop(data);
            dep::trigger(view.id(), TriggerOp::Set, Some(key_of(&key)), Key::Iterate);
        }
        _ => {}
    }
}

/// `delete(k)`: triggers `DELETE, k` if present.
pub fn delete(view: &Observable, key: &Value) -> bool {
    if readonly_guard(view, "delete") {
        return false;
    }
    let removed = match &view.target {
        Value::Map(m) => {
            let mut data = m.0.borrow_mut();
            match data.index_of(key) {
                Some(idx) => {
                    data.entries.remove(idx);
                    true
                }
                None => false,
            }
        }
        Value::Set(s) => {
            let mut data = s.0.borrow_mut();
            match data.index_of(key) {
                Some(idx) => {
                    data.entries.remove(idx);
                    true
                }
                None => false,
            }
        }
        Value::WeakMap(m) => {
            let mut data = m.0.borrow_mut();
            let before = data.entries.len();
            data.entries.retain(|(k, _)| !weak_matches(k, key));
            data.entries.len() != before
        }
        Value::WeakSet(s) => {
            let mut data = s.0.borrow_mut();
            let before = data.entries.len();
            data.entries.retain(|k| !weak_matches(k, key));
            data.entries.len() != before
        }
        _ => false,
    };
    if removed {
        dep::trigger(view.id(), TriggerOp::Delete, Some(key_of(key)), Key::Iterate);
    }
    removed
}

/// `clear`: triggers `CLEAR` (affects every dep-set under the target).
pub fn clear(view: &Observable) {
    if readonly_guard(view, "clear") {
        return;
    }
    let was_empty = match &view.target {
        Value::Map(m) => m.0.borrow().entries.is_empty(),
        Value::Set(s) => s.0.borrow().entries.is_empty(),
        _ => true,
    };
    match &view.target {
        Value::Map(m) => m.0.borrow_mut().entries.clear(),
        Value::Set(s) => s.0.borrow_mut().entries.clear(),
        _ => {}
    }
    if !was_empty {
        dep::trigger(view.id(), TriggerOp::Clear, None, Key::Iterate);
    }
}

/// `for_each(cb)`: `track(ITERATE, ITERATE_KEY)`, invokes `cb(value, key, view)`.
pub fn for_each(view: &Observable, mut cb: impl FnMut(Input, Input, &Observable)) {
    dep::track(view.id(), TrackOp::Iterate, Key::Iterate);
    match &view.target {
        Value::Map(m) => {
            let snapshot: Vec<(Value, Value)> =
                m.0.borrow().entries.iter().map(|(k, v)| (k.0.clone(), v.clone())).collect();
            for (k, v) in snapshot {
                cb(wrap(view, v), wrap(view, k), view);
            }
        }
        Value::Set(s) => {
            let snapshot: Vec<Value> = s.0.borrow().entries.clone();
            for v in snapshot {
                cb(wrap(view, v.clone()), wrap(view, v), view);
            }
        }
        _ => {}
    }
}

/// `keys()`: `track(ITERATE, ITERATE_KEY)`, returns a wrapped snapshot.
pub fn keys(view: &Observable) -> Vec<Input> {
    dep::track(view.id(), TrackOp::Iterate, Key::Iterate);
    match &view.target {
        Value::Map(m) => m.0.borrow().entries.iter().map(|(k, _)| wrap(view, k.0.clone())).collect(),
        Value::Set(s) => s.0.borrow().entries.iter().map(|v| wrap(view, v.clone())).collect(),
        _ => Vec::new(),
    }
}

/// `values()`.
pub fn values(view: &Observable) -> Vec<Input> {
    dep::track(view.id(), TrackOp::Iterate, Key::Iterate);
    match &view.target {
        Value::Map(m) => m.0.borrow().entries.iter().map(|(_, v)| wrap(view, v.clone())).collect(),
        Value::Set(s) => s.0.borrow().entries.iter().map(|v| wrap(view, v.clone())).collect(),
        _ => Vec::new(),
    }
}

/// `entries()` / the default iterator for map-kind containers: both elements of the yielded
/// tuple are wrapped.
pub fn entries(view: &Observable) -> Vec<(Input, Input)> {
    dep::track(view.id(), TrackOp::Iterate, Key::Iterate);
    match &view.target {
        Value::Map(m) => m
            .0
            .borrow()
            .entries
            .iter()
            .map(|(k, v)| (wrap(view, k.0.clone()), wrap(view, v.clone())))
            .collect(),
        Value::Set(s) => s.0.borrow().entries.iter().map(|v| (wrap(view, v.clone()), wrap(view, v.clone()))).collect(),
        _ => Vec::new(),
    }
}

fn key_of(v: &Value) -> Key {
    Key::Value(crate::value::HashableValue(v.clone()))
}

fn weak_map_get(m: &crate::value::RawWeakMap, key: &Value) -> Option<Value> {
    let Value::Object(obj) = key else { return None };
    m.0.borrow()
        .entries
        .iter()
        .find(|(k, _)| k.upgrade().is_some_and(|k| Rc::ptr_eq(&k, &obj.0)))
        .map(|(_, v)| v.clone())
}

fn weak_set_contains(s: &crate::value::RawWeakSet, key: &Value) -> bool {
    let Value::Object(obj) = key else { return false };
    s.0.borrow().entries.iter().any(|k| k.upgrade().is_some_and(|k| Rc::ptr_eq(&k, &obj.0)))
}

fn weak_matches(weak: &std::rc::Weak<std::cell::RefCell<crate::value::ObjectData>>, key: &Value) -> bool {
    let Value::Object(obj) = key else { return false };
    weak.upgrade().is_some_and(|k| Rc::ptr_eq(&k, &obj.0))
}

/// `add(v)` (weak-set-kind).
pub fn weak_add(view: &Observable, value: &Value) -> bool {
    if readonly_guard(view, "add") {
        return false;
    }
    let Value::Object(obj) = value else {
        dev_warn!("reactivity: WeakSet values must be observable-kind objects");
        return false;
    };
    let Value::WeakSet(s) = &view.target else { return false };
    if weak_set_contains(s, value) {
        return false;
    }
    s.0.borrow_mut().entries.push(Rc::downgrade(&obj.0));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{effect, EffectOptions};
    use crate::value::RawMap;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc as StdRc;

    fn observable_map() -> Observable {
        match identity::observe(Value::Map(RawMap::new())) {
            Input::View(o) => o,
            Input::Raw(_) => panic!("expected view"),
        }
    }

    #[test]
    fn scenario_2_map_get_set_delete_clear() {
        let m = observable_map();
        let log = StdRc::new(StdRefCell::new(Vec::new()));
        let log2 = log.clone();
        let m2 = m.clone();
        let key = Value::from("x");
        let key2 = key.clone();
        let _e = effect(
            move || {
                let v = get(&m2, &key2).map(identity::raw);
                log2.borrow_mut().push(v.map(|v| match v {
                    Value::Number(n) => n,
                    _ => f64::NAN,
                }));
            },
            EffectOptions::default(),
        );
        assert_eq!(*log.borrow(), vec![None]);

        set(&m, Input::Raw(key.clone()), Input::Raw(Value::Number(1.0)));
        assert_eq!(*log.borrow(), vec![None, Some(1.0)]);

        set(&m, Input::Raw(key.clone()), Input::Raw(Value::Number(1.0)));
        assert_eq!(log.borrow().len(), 2, "same value must not retrigger");

        delete(&m, &key);
        assert_eq!(*log.borrow(), vec![None, Some(1.0), None]);

        clear(&m);
        assert_eq!(log.borrow().len(), 3, "clearing an already-empty map must not retrigger");
    }

    fn observable_weak_map() -> Observable {
        match identity::observe(Value::WeakMap(crate::value::RawWeakMap::new())) {
            Input::View(o) => o,
            Input::Raw(_) => panic!("expected view"),
        }
    }

    fn observable_weak_set() -> Observable {
        match identity::observe(Value::WeakSet(crate::value::RawWeakSet::new())) {
            Input::View(o) => o,
            Input::Raw(_) => panic!("expected view"),
        }
    }

    #[test]
    fn weak_map_set_get_delete_round_trip() {
        let wm = observable_weak_map();
        // The Weak entry only resolves while this Rc-backed key is alive.
        let key = Value::Object(crate::value::RawObject::new());

        let log = StdRc::new(StdRefCell::new(Vec::new()));
        let log2 = log.clone();
        let wm2 = wm.clone();
        let key2 = key.clone();
        let _e = effect(
            move || {
                let v = get(&wm2, &key2).map(identity::raw);
                log2.borrow_mut().push(v.map(|v| match v {
                    Value::Number(n) => n,
                    _ => f64::NAN,
                }));
            },
            EffectOptions::default(),
        );
        assert_eq!(*log.borrow(), vec![None]);
        assert!(!has(&wm, &key));

        set(&wm, Input::Raw(key.clone()), Input::Raw(Value::Number(7.0)));
        assert_eq!(*log.borrow(), vec![None, Some(7.0)]);
        assert!(has(&wm, &key));

        delete(&wm, &key);
        assert_eq!(*log.borrow(), vec![None, Some(7.0), None]);
        assert!(!has(&wm, &key));
    }

    #[test]
    fn weak_set_add_has_delete_round_trip() {
        let ws = observable_weak_set();
        let value = Value::Object(crate::value::RawObject::new());

        assert!(!has(&ws, &value));
        assert!(weak_add(&ws, &value));
        assert!(has(&ws, &value));
        assert!(!weak_add(&ws, &value), "adding the same member twice reports no change");

        assert!(delete(&ws, &value));
        assert!(!has(&ws, &value));
        assert!(!delete(&ws, &value), "deleting an absent member reports no change");
    }
}
