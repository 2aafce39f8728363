use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::RwLock;

/// Layout used when a date leaf is rendered as text.
pub const DATE_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Nesting depth past which [`Value::to_json`] stops descending.
pub const MAX_JSON_DEPTH: usize = 512;

/// A node in a record graph.
///
/// Scalars are stored inline. Objects and arrays are shared handles, so the
/// same node can be reachable from several parents (or from itself). Two
/// composite values are equal only when they are the same node.
///
/// A cycle keeps its nodes alive after the last outside handle is dropped.
/// Call [`Object::clear`] or [`Array::clear`] on a node in the cycle to
/// release it.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(NaiveDateTime),
    Object(Object),
    Array(Array),
}

/// Insertion-ordered key/value node.
#[derive(Clone, Default)]
pub struct Object(Arc<RwLock<Vec<(String, Value)>>>);

/// Ordered list node.
#[derive(Clone, Default)]
pub struct Array(Arc<RwLock<Vec<Value>>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing entry in place.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let mut entries = self.0.write();
        if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0
            .read()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.read().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Snapshot of the entries; the lock is released before returning.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0.read().clone()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Removes every entry, breaking any cycle that runs through this node.
    pub fn clear(&self) {
        let entries = std::mem::take(&mut *self.0.write());
        release(entries.into_iter().map(|(_, v)| v).collect());
    }

    /// Identity of the node, stable for its lifetime.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.write().push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.read().get(index).cloned()
    }

    /// Snapshot of the items; the lock is released before returning.
    pub fn items(&self) -> Vec<Value> {
        self.0.read().clone()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    pub fn clear(&self) {
        let items = std::mem::take(&mut *self.0.write());
        release(items);
    }

    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Object::new();
        for (k, v) in iter {
            object.insert(k, v);
        }
        object
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Array(Arc::new(RwLock::new(iter.into_iter().map(Into::into).collect())))
    }
}

// Dropping the last handle to a deep chain would otherwise recurse once per
// level. Children of uniquely owned nodes are moved onto a heap stack first.
impl Drop for Object {
    fn drop(&mut self) {
        if let Some(lock) = Arc::get_mut(&mut self.0) {
            let entries = std::mem::take(lock.get_mut());
            release(entries.into_iter().map(|(_, v)| v).collect());
        }
    }
}

impl Drop for Array {
    fn drop(&mut self) {
        if let Some(lock) = Arc::get_mut(&mut self.0) {
            release(std::mem::take(lock.get_mut()));
        }
    }
}

fn release(mut stack: Vec<Value>) {
    while let Some(value) = stack.pop() {
        match value {
            Value::Object(mut object) => {
                if let Some(lock) = Arc::get_mut(&mut object.0) {
                    stack.extend(std::mem::take(lock.get_mut()).into_iter().map(|(_, v)| v));
                }
            }
            Value::Array(mut array) => {
                if let Some(lock) = Arc::get_mut(&mut array.0) {
                    stack.append(lock.get_mut());
                }
            }
            _ => {}
        }
    }
}

// Composite nodes may be cyclic, so Debug never descends into them.
impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object(#{:x}, {} keys)", self.id(), self.len())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array(#{:x}, {} items)", self.id(), self.len())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Date(d) => write!(f, "Date({d})"),
            Value::Object(o) => o.fmt(f),
            Value::Array(a) => a.fmt(f),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.id() == b.id(),
            (Value::Array(a), Value::Array(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    /// Identity of a composite node, `None` for scalars.
    pub fn node_id(&self) -> Option<usize> {
        match self {
            Value::Object(o) => Some(o.id()),
            Value::Array(a) => Some(a.id()),
            _ => None,
        }
    }

    /// String form of a scalar leaf.
    ///
    /// `None` for null and for composites; callers that want a composite's
    /// contents traverse it instead.
    pub fn text(&self) -> Option<String> {
        match self {
            Value::Null | Value::Object(_) | Value::Array(_) => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(number_text(*n)),
            Value::String(s) => Some(s.clone()),
            Value::Date(d) => Some(d.format(DATE_TEXT_FORMAT).to_string()),
        }
    }

    /// Follows a dotted path such as `user.address.city`.
    ///
    /// Numeric segments index into arrays. Returns `None` when any segment is
    /// missing, which is distinct from reaching an explicit `Null`. An empty
    /// path resolves to the value itself.
    pub fn resolve_path(&self, path: &str) -> Option<Value> {
        if path.is_empty() {
            return Some(self.clone());
        }
        let mut current = self.clone();
        for segment in path.split('.') {
            current = match &current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Converts the graph to plain JSON.
    ///
    /// A node that refers back to one of its own ancestors is written as the
    /// string `"[Circular]"`, and a composite nested deeper than
    /// [`MAX_JSON_DEPTH`] as `"[Truncated]"`. Shared but acyclic nodes are
    /// written out at every place they occur.
    pub fn to_json(&self) -> serde_json::Value {
        let mut ancestors = Vec::new();
        to_json_inner(self, &mut ancestors)
    }
}

fn to_json_inner(value: &Value, ancestors: &mut Vec<usize>) -> serde_json::Value {
    use serde_json::Value as Json;

    if let Some(id) = value.node_id() {
        if ancestors.contains(&id) {
            return Json::String("[Circular]".into());
        }
        if ancestors.len() >= MAX_JSON_DEPTH {
            return Json::String("[Truncated]".into());
        }
        ancestors.push(id);
    }
    let out = match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => number_json(*n),
        Value::String(s) => Json::String(s.clone()),
        Value::Date(d) => Json::String(d.format(DATE_TEXT_FORMAT).to_string()),
        Value::Object(map) => Json::Object(
            map.entries()
                .into_iter()
                .map(|(k, v)| (k, to_json_inner(&v, ancestors)))
                .collect(),
        ),
        Value::Array(arr) => Json::Array(
            arr.items()
                .iter()
                .map(|v| to_json_inner(v, ancestors))
                .collect(),
        ),
    };
    if value.is_composite() {
        ancestors.pop();
    }
    out
}

fn number_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Renders a number the way a user typed it: no trailing `.0`, no `-0`.
pub fn number_text(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n == 0.0 {
        "0".into()
    } else {
        n.to_string()
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().collect()),
            Json::Object(map) => Value::Object(map.into_iter().collect()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::Date(d)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}
