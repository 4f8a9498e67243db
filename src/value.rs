//! The dynamic value graph.
//!
//! The host language has no transparent-proxy primitive, so there is no way to intercept
//! property access on an arbitrary caller-defined struct. Instead, anything that wants to be
//! observed is built out of (or converted into) this crate's own [`Value`] graph: an enum of
//! scalars, records, sequences and collection containers. Container variants are
//! `Rc<RefCell<_>>`-backed so that a raw value has one stable address for as long as anything
//! holds a strong reference to it, which is what lets the identity registry (`identity.rs`) and
//! the dependency graph (`dep.rs`) key off of pointer identity instead of a language-level weak
//! map.

use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

/// A key into an object, array, map or set.
///
/// [`Key::Iterate`] is the sentinel used to represent "subscribed to whole-container
/// enumeration" (the `ITERATE_KEY` of the distilled specification). It is a distinct enum
/// variant, not a string, so it can never collide with a key a caller legally supplies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Index(usize),
    Value(HashableValue),
    /// Sentinel for whole-container enumeration subscriptions. Never returned from real
    /// iteration and never equal to any other key.
    Iterate,
    /// Sentinel for the `length` property of arrays, used as the iteration key for array
    /// ADD/DELETE per the base interceptor rules.
    Length,
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(Rc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(Rc::from(s.as_str()))
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

/// A [`Value`] wrapped for use as a hash map key.
///
/// Implements SameValueZero-style equality for numbers: NaN equals NaN, and `+0.0` equals
/// `-0.0`. This matters for two unrelated reasons in the spec: change detection on SET must
/// treat NaN as unchanged-when-replaced-by-NaN, and map/set containers must be able to use
/// `Value::Number(f64)` as a key at all, which a bare `f64` cannot do since it is not `Eq`.
#[derive(Debug, Clone)]
pub struct HashableValue(pub Value);

impl PartialEq for HashableValue {
    fn eq(&self, other: &Self) -> bool {
        same_value_zero(&self.0, &other.0)
    }
}
impl Eq for HashableValue {}

impl std::hash::Hash for HashableValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state);
    }
}

fn hash_value<H: std::hash::Hasher>(v: &Value, state: &mut H) {
    match v {
        Value::Null => 0u8.hash(state),
        Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        Value::Number(n) => {
            2u8.hash(state);
            canonical_bits(*n).hash(state);
        }
        Value::String(s) => {
            3u8.hash(state);
            s.hash(state);
        }
        Value::Object(o) => {
            4u8.hash(state);
            (Rc::as_ptr(&o.0) as usize).hash(state);
        }
        Value::Array(a) => {
            5u8.hash(state);
            (Rc::as_ptr(&a.0) as usize).hash(state);
        }
        Value::Map(m) => {
            6u8.hash(state);
            (Rc::as_ptr(&m.0) as usize).hash(state);
        }
        Value::Set(s) => {
            7u8.hash(state);
            (Rc::as_ptr(&s.0) as usize).hash(state);
        }
        Value::WeakMap(m) => {
            8u8.hash(state);
            (Rc::as_ptr(&m.0) as usize).hash(state);
        }
        Value::WeakSet(s) => {
            9u8.hash(state);
            (Rc::as_ptr(&s.0) as usize).hash(state);
        }
        Value::Ref(r) => {
            10u8.hash(state);
            (Rc::as_ptr(r) as usize).hash(state);
        }
    }
}

/// Canonicalize the bit pattern of a float for hashing/equality: all NaNs collapse to one
/// pattern, and `-0.0` collapses to `0.0`'s pattern.
fn canonical_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}

/// SameValueZero comparison: like `==` except `NaN` is equal to `NaN` and `-0.0` is equal to
/// `0.0`. Used by the base interceptor's SET change-detection rule (ยง4.2) and by map/set key
/// lookups.
pub fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => canonical_bits(*x) == canonical_bits(*y),
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(&x.0, &y.0),
        (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(&x.0, &y.0),
        (Value::Map(x), Value::Map(y)) => Rc::ptr_eq(&x.0, &y.0),
        (Value::Set(x), Value::Set(y)) => Rc::ptr_eq(&x.0, &y.0),
        (Value::WeakMap(x), Value::WeakMap(y)) => Rc::ptr_eq(&x.0, &y.0),
        (Value::WeakSet(x), Value::WeakSet(y)) => Rc::ptr_eq(&x.0, &y.0),
        (Value::Ref(x), Value::Ref(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// A dynamic value: the crate's substitute for "any heap object the user supplies".
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    /// Numbers missing a key, per host-language convention, evaluate to `NaN` when used
    /// arithmetically; see `base_handlers` for where that convention is applied.
    Number(f64),
    String(Rc<str>),
    Object(RawObject),
    Array(RawArray),
    Map(RawMap),
    Set(RawSet),
    WeakMap(RawWeakMap),
    WeakSet(RawWeakSet),
    /// A single-slot reference cell. Both standalone `ref_()` values and refs nested inside an
    /// object field are represented by this variant; see ยง4.6.
    Ref(Rc<RefCell<Value>>),
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s.as_str()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Array(_) => write!(f, "[object Array]"),
            Value::Map(_) => write!(f, "[object Map]"),
            Value::Set(_) => write!(f, "[object Set]"),
            Value::WeakMap(_) => write!(f, "[object WeakMap]"),
            Value::WeakSet(_) => write!(f, "[object WeakSet]"),
            Value::Ref(cell) => write!(f, "{}", cell.borrow()),
        }
    }
}

impl Value {
    /// Numeric coercion used by arithmetic on a value that might be a missing-key placeholder.
    /// Missing keys are represented as `None` at the call site (see `base_handlers::get`), not
    /// as a `Value` variant; this exists purely so test code and user code can treat an
    /// `Option<Value>` read uniformly.
    pub fn as_number_or_nan(v: Option<&Value>) -> f64 {
        match v {
            Some(Value::Number(n)) => *n,
            _ => f64::NAN,
        }
    }

    pub fn is_observable_kind(&self) -> bool {
        matches!(
            self,
            Value::Object(_) | Value::Array(_) | Value::Map(_) | Value::Set(_)
                | Value::WeakMap(_) | Value::WeakSet(_)
        )
    }

    /// Stable pointer identity for container kinds, used as the target-map key. Returns `None`
    /// for scalars and refs, which are never wrapped by `observe`.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Object(o) => Some(Rc::as_ptr(&o.0) as usize),
            Value::Array(a) => Some(Rc::as_ptr(&a.0) as usize),
            Value::Map(m) => Some(Rc::as_ptr(&m.0) as usize),
            Value::Set(s) => Some(Rc::as_ptr(&s.0) as usize),
            Value::WeakMap(m) => Some(Rc::as_ptr(&m.0) as usize),
            Value::WeakSet(s) => Some(Rc::as_ptr(&s.0) as usize),
            _ => None,
        }
    }
}

/// A plain record: ordered for deterministic `own_keys` enumeration.
#[derive(Debug, Default)]
pub struct ObjectData {
    pub entries: Vec<(Rc<str>, Value)>,
}

impl ObjectData {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| &**k == key).map(|(_, v)| v)
    }
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| &**k == key)
    }
}

#[derive(Debug, Clone)]
pub struct RawObject(pub Rc<RefCell<ObjectData>>);

impl RawObject {
    pub fn new() -> Self {
        RawObject(Rc::new(RefCell::new(ObjectData::default())))
    }
}
impl Default for RawObject {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct RawArray(pub Rc<RefCell<Vec<Value>>>);

impl RawArray {
    pub fn new() -> Self {
        RawArray(Rc::new(RefCell::new(Vec::new())))
    }
    pub fn from_vec(v: Vec<Value>) -> Self {
        RawArray(Rc::new(RefCell::new(v)))
    }
}
impl Default for RawArray {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct MapData {
    pub entries: Vec<(HashableValue, Value)>,
}
impl MapData {
    pub fn index_of(&self, key: &Value) -> Option<usize> {
        self.entries.iter().position(|(k, _)| same_value_zero(&k.0, key))
    }
}

#[derive(Debug, Clone)]
pub struct RawMap(pub Rc<RefCell<MapData>>);
impl RawMap {
    pub fn new() -> Self {
        RawMap(Rc::new(RefCell::new(MapData::default())))
    }
}
impl Default for RawMap {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct SetData {
    pub entries: Vec<Value>,
}
impl SetData {
    pub fn index_of(&self, v: &Value) -> Option<usize> {
        self.entries.iter().position(|x| same_value_zero(x, v))
    }
}

#[derive(Debug, Clone)]
pub struct RawSet(pub Rc<RefCell<SetData>>);
impl RawSet {
    pub fn new() -> Self {
        RawSet(Rc::new(RefCell::new(SetData::default())))
    }
}
impl Default for RawSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Weak-keyed map: entries are dropped once the key's only other strong reference disappears.
/// Keys must be container kinds (objects/arrays/etc), matching host-language `WeakMap` key
/// restrictions.
#[derive(Debug, Default)]
pub struct WeakMapData {
    pub entries: Vec<(Weak<RefCell<ObjectData>>, Value)>,
}

#[derive(Debug, Clone)]
pub struct RawWeakMap(pub Rc<RefCell<WeakMapData>>);
impl RawWeakMap {
    pub fn new() -> Self {
        RawWeakMap(Rc::new(RefCell::new(WeakMapData::default())))
    }
}
impl Default for RawWeakMap {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct WeakSetData {
    pub entries: Vec<Weak<RefCell<ObjectData>>>,
}

#[derive(Debug, Clone)]
pub struct RawWeakSet(pub Rc<RefCell<WeakSetData>>);
impl RawWeakSet {
    pub fn new() -> Self {
        RawWeakSet(Rc::new(RefCell::new(WeakSetData::default())))
    }
}
impl Default for RawWeakSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_same_value_zero_as_nan() {
        assert!(same_value_zero(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
    }

    #[test]
    fn positive_and_negative_zero_are_same_value_zero() {
        assert!(same_value_zero(&Value::Number(0.0), &Value::Number(-0.0)));
    }

    #[test]
    fn distinct_objects_are_not_same_value_zero() {
        assert!(!same_value_zero(
            &Value::Object(RawObject::new()),
            &Value::Object(RawObject::new())
        ));
    }

    #[test]
    fn iterate_key_is_distinct_from_any_string_key() {
        assert_ne!(Key::Iterate, Key::Str(Rc::from("ITERATE_KEY")));
        assert_ne!(Key::Iterate, Key::Length);
    }
}
