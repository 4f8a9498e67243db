//! The identity registry and observable factory (ยง4.1).
//!
//! The distilled specification describes four weak-keyed maps (`raw->mutable`,
//! `mutable->raw`, `raw->readonly`, `readonly->raw`) because in a language where the view and
//! the raw are two independently-held references, the reverse direction needs its own index.
//! Here [`Observable`] owns its `target` directly, so `raw(view)` is a field read, not a map
//! lookup — the registry only needs the two forward maps. This is a legitimate simplification of
//! the same invariants (I1/I2 still hold), not a behavior change; see DESIGN.md.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::value::Value;
use crate::warn::dev_warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Mutable,
    ReadOnly { shallow: bool },
}

/// A transparent observable view over exactly one raw container value.
#[derive(Clone)]
pub struct Observable {
    pub(crate) target: Value,
    pub(crate) mode: Mode,
}

impl Observable {
    pub fn is_read_only(&self) -> bool {
        matches!(self.mode, Mode::ReadOnly { .. })
    }

    pub fn is_shallow(&self) -> bool {
        matches!(self.mode, Mode::ReadOnly { shallow: true })
    }

    pub(crate) fn id(&self) -> usize {
        self.target.identity().expect("Observable always wraps a container value")
    }
}

thread_local! {
    static RAW_TO_MUTABLE: RefCell<HashMap<usize, Observable>> = RefCell::new(HashMap::new());
    static RAW_TO_READONLY: RefCell<HashMap<usize, Observable>> = RefCell::new(HashMap::new());
    static MARKED_READONLY: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
    static MARKED_NON_REACTIVE: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// Anything that can stand in for "a value or a view of one" at the boundary of the public API.
/// `observe`/`read_only`/`raw` all accept and may be handed either a bare [`Value`] or an
/// [`Observable`]; this enum lets call sites stay ergonomic without two overloaded signatures.
pub enum Input {
    Raw(Value),
    View(Observable),
}

impl From<Value> for Input {
    fn from(v: Value) -> Self {
        Input::Raw(v)
    }
}
impl From<Observable> for Input {
    fn from(o: Observable) -> Self {
        Input::View(o)
    }
}

/// `raw(x)`: return the underlying object for any view, or `x` itself if not a view (I1).
pub fn raw(input: impl Into<Input>) -> Value {
    match input.into() {
        Input::Raw(v) => v,
        Input::View(o) => o.target,
    }
}

pub fn is_observable(input: &Observable) -> bool {
    matches!(input.mode, Mode::Mutable)
}

pub fn is_read_only(input: &Observable) -> bool {
    input.is_read_only()
}

pub fn mark_read_only(raw: &Value) {
    if let Some(id) = raw.identity() {
        MARKED_READONLY.with(|m| m.borrow_mut().insert(id));
    }
}

pub fn mark_non_reactive(raw: &Value) {
    if let Some(id) = raw.identity() {
        MARKED_NON_REACTIVE.with(|m| m.borrow_mut().insert(id));
        // Evict any cached views and their dep-set bookkeeping: a value explicitly opted out of
        // observation should not keep stale subscriptions alive.
        RAW_TO_MUTABLE.with(|m| m.borrow_mut().remove(&id));
        RAW_TO_READONLY.with(|m| m.borrow_mut().remove(&id));
        crate::dep::forget_target(id);
    }
}

fn is_marked_non_reactive(id: usize) -> bool {
    MARKED_NON_REACTIVE.with(|m| m.borrow().contains(&id))
}

fn is_marked_read_only(id: usize) -> bool {
    MARKED_READONLY.with(|m| m.borrow().contains(&id))
}

/// `observe(raw) -> O`: create or return the cached mutable view (ยง4.1 algorithm).
pub fn observe(input: impl Into<Input>) -> Input {
    create_observable(input, Mode::Mutable)
}

/// `read_only(raw) -> O`.
pub fn read_only(input: impl Into<Input>) -> Input {
    create_observable(input, Mode::ReadOnly { shallow: false })
}

/// `shallow_read_only(raw) -> O`: read-only at the top level; nested reads are not re-wrapped.
pub fn shallow_read_only(input: impl Into<Input>) -> Input {
    create_observable(input, Mode::ReadOnly { shallow: true })
}

fn create_observable(input: impl Into<Input>, requested: Mode) -> Input {
    let input = input.into();

    // Step 2: wrapping a read-only view yields itself, regardless of requested mode.
    if let Input::View(ref o) = input {
        if o.is_read_only() {
            return input;
        }
    }

    // Step 3: unwrap a mutable view to its raw before computing a read-only view of it.
    let value = raw(input);

    if !value.is_observable_kind() {
        dev_warn!("reactivity: observe() called on a non-observable value; returning it unchanged");
        return Input::Raw(value);
    }

    let id = value.identity().expect("observable kind always has an identity");

    if is_marked_non_reactive(id) {
        return Input::Raw(value);
    }
    // §4.1: an advisory markReadOnly tag forces read-only mode regardless of what was requested.
    let requested = if is_marked_read_only(id) && matches!(requested, Mode::Mutable) {
        Mode::ReadOnly { shallow: false }
    } else {
        requested
    };

    let cache = match requested {
        Mode::Mutable => &RAW_TO_MUTABLE,
        Mode::ReadOnly { .. } => &RAW_TO_READONLY,
    };

    if let Some(existing) = cache.with(|c| c.borrow().get(&id).cloned()) {
        return Input::View(existing);
    }

    let view = Observable { target: value, mode: requested };
    cache.with(|c| c.borrow_mut().insert(id, view.clone()));
    Input::View(view)
}
