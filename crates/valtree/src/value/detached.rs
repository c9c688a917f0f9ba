//! Controller-free value trees
//!
//! A [`DetachedValue`] is what `extract` hands back and what `adopt` takes.
//! It owns its storage outright and has no controller, so it is the form a
//! transport serializes when a value crosses a process boundary. Node ids
//! ride along in memory, which lets live wrappers find their nodes again
//! after a move into another domain. They are never serialized.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{NodeId, ValueType};

/// An owned value tree with no controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DetachedValue {
    /// Explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit float
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Byte buffer
    Binary(DetachedBinary),
    /// Nested dictionary
    Dictionary(DetachedDictionary),
    /// Nested list
    List(DetachedList),
}

/// A detached byte buffer.
#[derive(Debug, Serialize, Deserialize)]
pub struct DetachedBinary {
    #[serde(skip, default = "NodeId::fresh")]
    pub(crate) id: NodeId,
    pub(crate) data: Vec<u8>,
}

/// A detached dictionary. Entries keep insertion order.
#[derive(Debug, Serialize, Deserialize)]
pub struct DetachedDictionary {
    #[serde(skip, default = "NodeId::fresh")]
    pub(crate) id: NodeId,
    pub(crate) entries: IndexMap<String, DetachedValue>,
}

/// A detached list.
#[derive(Debug, Serialize, Deserialize)]
pub struct DetachedList {
    #[serde(skip, default = "NodeId::fresh")]
    pub(crate) id: NodeId,
    pub(crate) items: Vec<DetachedValue>,
}

/// The kinds that can own a controller domain.
#[derive(Debug)]
pub(crate) enum RootValue {
    Binary(DetachedBinary),
    Dictionary(DetachedDictionary),
    List(DetachedList),
}

impl RootValue {
    pub(crate) fn value_type(&self) -> ValueType {
        match self {
            RootValue::Binary(_) => ValueType::Binary,
            RootValue::Dictionary(_) => ValueType::Dictionary,
            RootValue::List(_) => ValueType::List,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// DetachedValue
// ═══════════════════════════════════════════════════════════════════

impl DetachedValue {
    /// The kind of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            DetachedValue::Null => ValueType::Null,
            DetachedValue::Bool(_) => ValueType::Bool,
            DetachedValue::Int(_) => ValueType::Int,
            DetachedValue::Double(_) => ValueType::Double,
            DetachedValue::String(_) => ValueType::String,
            DetachedValue::Binary(_) => ValueType::Binary,
            DetachedValue::Dictionary(_) => ValueType::Dictionary,
            DetachedValue::List(_) => ValueType::List,
        }
    }

    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        DetachedValue::String(s.into())
    }

    /// True for an empty dictionary or list.
    pub fn is_empty_container(&self) -> bool {
        match self {
            DetachedValue::Dictionary(d) => d.is_empty(),
            DetachedValue::List(l) => l.is_empty(),
            _ => false,
        }
    }

    pub(crate) fn into_root(self) -> Option<RootValue> {
        match self {
            DetachedValue::Binary(b) => Some(RootValue::Binary(b)),
            DetachedValue::Dictionary(d) => Some(RootValue::Dictionary(d)),
            DetachedValue::List(l) => Some(RootValue::List(l)),
            _ => None,
        }
    }

    pub(crate) fn prune_empty_children(&mut self) {
        match self {
            DetachedValue::Dictionary(d) => d.prune_empty_children(),
            DetachedValue::List(l) => l.prune_empty_children(),
            _ => {}
        }
    }
}

impl From<bool> for DetachedValue {
    fn from(b: bool) -> Self {
        DetachedValue::Bool(b)
    }
}

impl From<i32> for DetachedValue {
    fn from(n: i32) -> Self {
        DetachedValue::Int(n)
    }
}

impl From<f64> for DetachedValue {
    fn from(n: f64) -> Self {
        DetachedValue::Double(n)
    }
}

impl From<&str> for DetachedValue {
    fn from(s: &str) -> Self {
        DetachedValue::String(s.to_string())
    }
}

impl From<String> for DetachedValue {
    fn from(s: String) -> Self {
        DetachedValue::String(s)
    }
}

impl From<DetachedBinary> for DetachedValue {
    fn from(b: DetachedBinary) -> Self {
        DetachedValue::Binary(b)
    }
}

impl From<DetachedDictionary> for DetachedValue {
    fn from(d: DetachedDictionary) -> Self {
        DetachedValue::Dictionary(d)
    }
}

impl From<DetachedList> for DetachedValue {
    fn from(l: DetachedList) -> Self {
        DetachedValue::List(l)
    }
}

impl From<RootValue> for DetachedValue {
    fn from(root: RootValue) -> Self {
        match root {
            RootValue::Binary(b) => DetachedValue::Binary(b),
            RootValue::Dictionary(d) => DetachedValue::Dictionary(d),
            RootValue::List(l) => DetachedValue::List(l),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Binary
// ═══════════════════════════════════════════════════════════════════

impl DetachedBinary {
    /// Create a buffer holding `data`.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            id: NodeId::fresh(),
            data: data.into(),
        }
    }

    /// The bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume into the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

// ═══════════════════════════════════════════════════════════════════
// Dictionary
// ═══════════════════════════════════════════════════════════════════

impl Default for DetachedDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl DetachedDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self {
            id: NodeId::fresh(),
            entries: IndexMap::new(),
        }
    }

    /// Add an entry (builder pattern)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<DetachedValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace an entry, returning the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<DetachedValue>,
    ) -> Option<DetachedValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<&DetachedValue> {
        self.entries.get(key)
    }

    /// Remove an entry, keeping the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<DetachedValue> {
        self.entries.shift_remove(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DetachedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Drop nested dictionaries and lists that are empty, recursively.
    pub fn prune_empty_children(&mut self) {
        for value in self.entries.values_mut() {
            value.prune_empty_children();
        }
        self.entries.retain(|_, value| !value.is_empty_container());
    }
}

// ═══════════════════════════════════════════════════════════════════
// List
// ═══════════════════════════════════════════════════════════════════

impl Default for DetachedList {
    fn default() -> Self {
        Self::new()
    }
}

impl DetachedList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            id: NodeId::fresh(),
            items: Vec::new(),
        }
    }

    /// Append an item (builder pattern)
    pub fn with(mut self, value: impl Into<DetachedValue>) -> Self {
        self.push(value);
        self
    }

    /// Append an item.
    pub fn push(&mut self, value: impl Into<DetachedValue>) {
        self.items.push(value.into());
    }

    /// Item at `index`.
    pub fn get(&self, index: usize) -> Option<&DetachedValue> {
        self.items.get(index)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if there are no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in order.
    pub fn iter(&self) -> impl Iterator<Item = &DetachedValue> {
        self.items.iter()
    }

    /// Drop nested dictionaries and lists that are empty, recursively.
    pub fn prune_empty_children(&mut self) {
        for value in &mut self.items {
            value.prune_empty_children();
        }
        self.items.retain(|value| !value.is_empty_container());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Identity-free Clone and PartialEq
// ═══════════════════════════════════════════════════════════════════

// A clone is a new tree, so it gets new node ids. Sharing ids would let
// two copies claim the same wrappers.

impl Clone for DetachedBinary {
    fn clone(&self) -> Self {
        Self::new(self.data.clone())
    }
}

impl Clone for DetachedDictionary {
    fn clone(&self) -> Self {
        Self {
            id: NodeId::fresh(),
            entries: self.entries.clone(),
        }
    }
}

impl Clone for DetachedList {
    fn clone(&self) -> Self {
        Self {
            id: NodeId::fresh(),
            items: self.items.clone(),
        }
    }
}

impl PartialEq for DetachedBinary {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl PartialEq for DetachedDictionary {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl PartialEq for DetachedList {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_gets_fresh_ids() {
        let dict = DetachedDictionary::new().with("a", 1);
        let copy = dict.clone();
        assert_ne!(dict.id, copy.id);
        assert_eq!(dict, copy);
    }

    #[test]
    fn test_prune_empty_children_is_recursive() {
        let mut dict = DetachedDictionary::new()
            .with("keep", 1)
            .with("empty", DetachedDictionary::new())
            .with(
                "nested",
                DetachedDictionary::new().with("inner", DetachedList::new()),
            )
            .with("list", DetachedList::new().with(DetachedList::new()).with(2));

        dict.prune_empty_children();

        let keys: Vec<_> = dict.keys().collect();
        assert_eq!(keys, vec!["keep", "list"]);
        match dict.get("list") {
            Some(DetachedValue::List(list)) => assert_eq!(list.len(), 1),
            other => panic!("Expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_serde_skips_ids() {
        let dict = DetachedDictionary::new().with("n", 5);
        let json = serde_json::to_string(&DetachedValue::from(dict)).unwrap();
        assert!(!json.contains("id"));
        let back: DetachedValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value_type(), ValueType::Dictionary);
    }
}
