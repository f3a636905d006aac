// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Values thrown or rejected by the remote SDK.
//
// An SDK can reject with anything: a string, a bare number, an `Error`, or an
// object graph that points back at itself.  `serde_json::Value` cannot hold a
// cycle, so rejections are modelled as a small JS-like value graph whose
// objects and arrays are shared references.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Number, Value};

/// Marker substituted for an object that was already visited.
pub const CIRCULAR_MARKER: &str = "[Circular]";

/// A JS-like value that may contain shared or cyclic references.
#[derive(Clone, Debug, Default)]
pub enum Thrown {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(ArrayRef),
    Object(ObjectRef),
}

/// Shared handle to an ordered property list.
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<Mutex<Vec<(String, Thrown)>>>);

/// Shared handle to an array.
#[derive(Clone, Default)]
pub struct ArrayRef(Arc<Mutex<Vec<Thrown>>>);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ObjectRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Property value, `Undefined` when absent.
    pub fn get(&self, key: &str) -> Thrown {
        lock(&self.0)
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    /// Whether the object has an own property called `key`.
    pub fn has(&self, key: &str) -> bool {
        lock(&self.0).iter().any(|(k, _)| k == key)
    }

    /// Assign a property, keeping the original insertion position on overwrite.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Thrown>) {
        let key = key.into();
        let value = value.into();
        let mut props = lock(&self.0);
        match props.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => props.push((key, value)),
        }
    }

    /// Snapshot of own properties in insertion order.
    pub fn entries(&self) -> Vec<(String, Thrown)> {
        lock(&self.0).clone()
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl std::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never recurse: the graph may be cyclic.
        let keys: Vec<String> = lock(&self.0).iter().map(|(k, _)| k.clone()).collect();
        write!(f, "Object@{:#x}{keys:?}", self.identity())
    }
}

impl ArrayRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: impl Into<Thrown>) {
        lock(&self.0).push(value.into());
    }

    pub fn items(&self) -> Vec<Thrown> {
        lock(&self.0).clone()
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl std::fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Array@{:#x}[{}]", self.identity(), lock(&self.0).len())
    }
}

impl Thrown {
    /// An `Error`-like object with `name`, `message`, and a one-line `stack`.
    pub fn error(name: &str, message: &str) -> Self {
        let object = ObjectRef::new();
        object.set("name", name);
        object.set("message", message);
        object.set("stack", format!("{name}: {message}"));
        Thrown::Object(object)
    }

    /// Build an object from key/value pairs.
    pub fn object<K, V>(props: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Thrown>,
    {
        let object = ObjectRef::new();
        for (key, value) in props {
            object.set(key, value);
        }
        Thrown::Object(object)
    }

    /// Property access, `Undefined` for anything that is not an object.
    pub fn get(&self, key: &str) -> Thrown {
        match self {
            Thrown::Object(object) => object.get(key),
            _ => Thrown::Undefined,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Thrown::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Thrown::Undefined)
    }

    /// JS truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Thrown::Undefined | Thrown::Null => false,
            Thrown::Bool(b) => *b,
            Thrown::Number(n) => *n != 0.0 && !n.is_nan(),
            Thrown::String(s) => !s.is_empty(),
            Thrown::Array(_) | Thrown::Object(_) => true,
        }
    }

    /// `String(value)` semantics.
    pub fn to_js_string(&self) -> String {
        let mut seen = HashSet::new();
        self.js_string_inner(&mut seen)
    }

    fn js_string_inner(&self, seen: &mut HashSet<usize>) -> String {
        match self {
            Thrown::Undefined => "undefined".into(),
            Thrown::Null => "null".into(),
            Thrown::Bool(b) => b.to_string(),
            Thrown::Number(n) => js_number(*n),
            Thrown::String(s) => s.clone(),
            Thrown::Object(_) => "[object Object]".into(),
            Thrown::Array(array) => {
                // Array.prototype.join renders a revisited array as "".
                if !seen.insert(array.identity()) {
                    return String::new();
                }
                let parts: Vec<String> = array
                    .items()
                    .iter()
                    .map(|item| match item {
                        Thrown::Undefined | Thrown::Null => String::new(),
                        other => other.js_string_inner(seen),
                    })
                    .collect();
                seen.remove(&array.identity());
                parts.join(",")
            }
        }
    }

    /// Convert to JSON the way `JSON.stringify` with a visited-set replacer
    /// would.
    ///
    /// Every object or array is emitted at most once per `seen` set; later
    /// visits become [`CIRCULAR_MARKER`].  Returns `None` for `undefined`,
    /// which callers drop from objects and turn into `null` inside arrays.
    pub fn to_json(&self, seen: &mut HashSet<usize>) -> Option<Value> {
        match self {
            Thrown::Undefined => None,
            Thrown::Null => Some(Value::Null),
            Thrown::Bool(b) => Some(Value::Bool(*b)),
            Thrown::Number(n) => Some(json_number(*n)),
            Thrown::String(s) => Some(Value::String(s.clone())),
            Thrown::Array(array) => {
                if !seen.insert(array.identity()) {
                    return Some(Value::String(CIRCULAR_MARKER.into()));
                }
                let items = array
                    .items()
                    .iter()
                    .map(|item| item.to_json(seen).unwrap_or(Value::Null))
                    .collect();
                Some(Value::Array(items))
            }
            Thrown::Object(object) => {
                if !seen.insert(object.identity()) {
                    return Some(Value::String(CIRCULAR_MARKER.into()));
                }
                let mut map = Map::new();
                for (key, value) in object.entries() {
                    if let Some(json) = value.to_json(seen) {
                        map.insert(key, json);
                    }
                }
                Some(Value::Object(map))
            }
        }
    }

    /// Mark this value's own identity as visited, if it has one.
    pub(crate) fn mark_seen(&self, seen: &mut HashSet<usize>) {
        match self {
            Thrown::Object(object) => {
                seen.insert(object.identity());
            }
            Thrown::Array(array) => {
                seen.insert(array.identity());
            }
            _ => {}
        }
    }
}

/// Format a number the way JS `String(n)` does for the common cases.
fn js_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".into()
        } else {
            "-Infinity".into()
        }
    } else if n == 0.0 {
        "0".into()
    } else {
        n.to_string()
    }
}

/// JSON has no NaN/Infinity; integral values stay integers.
fn json_number(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

impl From<&Value> for Thrown {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Thrown::Null,
            Value::Bool(b) => Thrown::Bool(*b),
            Value::Number(n) => Thrown::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Thrown::String(s.clone()),
            Value::Array(items) => {
                let array = ArrayRef::new();
                for item in items {
                    array.push(Thrown::from(item));
                }
                Thrown::Array(array)
            }
            Value::Object(map) => {
                Thrown::object(map.iter().map(|(k, v)| (k.clone(), Thrown::from(v))))
            }
        }
    }
}

impl From<Value> for Thrown {
    fn from(value: Value) -> Self {
        Thrown::from(&value)
    }
}

impl From<&str> for Thrown {
    fn from(s: &str) -> Self {
        Thrown::String(s.to_string())
    }
}

impl From<String> for Thrown {
    fn from(s: String) -> Self {
        Thrown::String(s)
    }
}

impl From<f64> for Thrown {
    fn from(n: f64) -> Self {
        Thrown::Number(n)
    }
}

impl From<i64> for Thrown {
    fn from(n: i64) -> Self {
        Thrown::Number(n as f64)
    }
}

impl From<bool> for Thrown {
    fn from(b: bool) -> Self {
        Thrown::Bool(b)
    }
}

impl From<ObjectRef> for Thrown {
    fn from(object: ObjectRef) -> Self {
        Thrown::Object(object)
    }
}

impl From<ArrayRef> for Thrown {
    fn from(array: ArrayRef) -> Self {
        Thrown::Array(array)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn truthiness_follows_js() {
        assert!(!Thrown::Undefined.is_truthy());
        assert!(!Thrown::Number(0.0).is_truthy());
        assert!(!Thrown::Number(f64::NAN).is_truthy());
        assert!(!Thrown::from("").is_truthy());
        assert!(Thrown::from("x").is_truthy());
        assert!(Thrown::object(Vec::<(String, Thrown)>::new()).is_truthy());
    }

    #[test]
    fn js_string_of_primitives() {
        assert_eq!(Thrown::Undefined.to_js_string(), "undefined");
        assert_eq!(Thrown::from(404i64).to_js_string(), "404");
        assert_eq!(Thrown::from(1.5).to_js_string(), "1.5");
        assert_eq!(Thrown::Number(-0.0).to_js_string(), "0");
        assert_eq!(Thrown::from(json!({"a": 1})).to_js_string(), "[object Object]");
        assert_eq!(Thrown::from(json!([1, null, "b"])).to_js_string(), "1,,b");
    }

    #[test]
    fn json_numbers_stay_integral() {
        let mut seen = HashSet::new();
        assert_eq!(Thrown::from(404i64).to_json(&mut seen), Some(json!(404)));
        assert_eq!(Thrown::Number(f64::INFINITY).to_json(&mut seen), Some(Value::Null));
    }

    #[test]
    fn self_reference_becomes_marker() {
        let object = ObjectRef::new();
        object.set("message", "loop");
        object.set("self", object.clone());

        let mut seen = HashSet::new();
        let json = Thrown::Object(object).to_json(&mut seen).unwrap();
        assert_eq!(json, json!({ "message": "loop", "self": CIRCULAR_MARKER }));
    }

    #[test]
    fn undefined_is_dropped_from_objects_and_nulled_in_arrays() {
        let array = ArrayRef::new();
        array.push(Thrown::Undefined);
        let value = Thrown::object([("a", Thrown::Undefined), ("b", Thrown::Array(array))]);

        let mut seen = HashSet::new();
        assert_eq!(value.to_json(&mut seen), Some(json!({ "b": [null] })));
    }

    #[test]
    fn json_round_trip_is_lossless_for_plain_values() {
        let original = json!({ "code": 404, "nested": { "list": [1, "two", true, null] } });
        let mut seen = HashSet::new();
        assert_eq!(Thrown::from(&original).to_json(&mut seen), Some(original));
    }

    #[test]
    fn debug_does_not_recurse_into_cycles() {
        let object = ObjectRef::new();
        object.set("self", object.clone());
        let rendered = format!("{:?}", Thrown::Object(object));
        assert!(rendered.contains("self"));
    }
}
