//! String-keyed containers

use std::sync::Arc;

use super::{
    check_key, BinaryValue, DetachedDictionary, DetachedValue, Entry, ListValue, NodeId,
    OwnerMode, RootValue, TrackedValue, ValueType,
};
use crate::context::ValueContext;
use crate::controller::{ControllerState, LockPolicy, ThreadSafe, ValueController};
use crate::error::{Result, ValueError};

/// A handle to a dictionary node.
///
/// Keys are non-empty strings and keep insertion order. Nested binaries,
/// dictionaries and lists are returned as reference handles that share
/// this dictionary's controller; they stop working as soon as the entry
/// they point at is removed, replaced or cleared.
///
/// # Example
///
/// ```
/// use valtree::DictionaryValue;
///
/// let root = DictionaryValue::create();
/// root.set_dictionary("child", &DictionaryValue::create()).unwrap();
///
/// let child = root.get_dictionary("child").unwrap();
/// child.set_string("name", "leaf").unwrap();
///
/// root.remove("child").unwrap();
/// assert!(!child.is_valid());
/// ```
pub struct DictionaryValue<L: LockPolicy = ThreadSafe> {
    tracked: Arc<TrackedValue<L>>,
}

impl DictionaryValue<ThreadSafe> {
    /// Create an empty, writable dictionary in a new thread-safe domain.
    pub fn create() -> Self {
        Self::new_root()
    }

    /// Build a dictionary from a JSON object.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        Self::from_json_with(json, ValueContext::default())
    }
}

impl<L: LockPolicy> DictionaryValue<L> {
    /// Create an empty, writable dictionary in a new domain.
    pub fn new_root() -> Self {
        Self::from_tracked(TrackedValue::bootstrap(
            RootValue::Dictionary(DetachedDictionary::new()),
            OwnerMode::WillDelete,
            false,
            ValueContext::default(),
        ))
    }

    /// Take ownership of a detached dictionary, either in `controller` or
    /// in a new domain.
    pub fn adopt(
        value: DetachedDictionary,
        controller: Option<Arc<ValueController<L>>>,
        mode: OwnerMode,
        read_only: bool,
    ) -> Result<Self> {
        TrackedValue::root(RootValue::Dictionary(value), controller, mode, read_only)
            .map(Self::from_tracked)
    }

    /// Build a dictionary from a JSON object in a domain configured by
    /// `context`.
    pub fn from_json_with(json: &serde_json::Value, context: ValueContext) -> Result<Self> {
        match DetachedValue::from_json(json, &context)? {
            DetachedValue::Dictionary(dict) => Ok(Self::from_tracked(TrackedValue::bootstrap(
                RootValue::Dictionary(dict),
                OwnerMode::WillDelete,
                false,
                context,
            ))),
            other => Err(ValueError::type_mismatch(
                ValueType::Dictionary,
                other.value_type(),
            )),
        }
    }

    pub(crate) fn from_tracked(tracked: Arc<TrackedValue<L>>) -> Self {
        Self { tracked }
    }

    fn id(&self) -> NodeId {
        self.tracked.node_id()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Handle state
    // ═══════════════════════════════════════════════════════════════════

    /// The wrapper behind this handle.
    pub fn tracked(&self) -> &TrackedValue<L> {
        &self.tracked
    }

    /// True while the dictionary can be accessed.
    pub fn is_valid(&self) -> bool {
        self.tracked.is_valid()
    }

    /// True unless this handle is a reference into a container.
    pub fn is_owned(&self) -> bool {
        !self.tracked.is_reference()
    }

    /// True if mutation through this handle is refused.
    pub fn is_read_only(&self) -> bool {
        self.tracked.is_read_only()
    }

    /// True if both handles address the same live dictionary.
    pub fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id() && !self.tracked.is_detached() && !other.tracked.is_detached()
    }

    /// Deep content equality. Key order is ignored.
    pub fn is_equal(&self, other: &Self) -> Result<bool> {
        self.tracked.is_equal(&other.tracked)
    }

    /// The controller currently responsible for this dictionary.
    pub fn controller(&self) -> Option<Arc<ValueController<L>>> {
        self.tracked.controller()
    }

    /// A writable deep copy in a new domain. With `exclude_empty_children`,
    /// nested dictionaries and lists that are empty are left out.
    pub fn copy(&self, exclude_empty_children: bool) -> Result<Self> {
        self.tracked
            .copy_root(false, exclude_empty_children)
            .map(Self::from_tracked)
    }

    /// Give up this handle.
    ///
    /// A reference simply stops being tracked and `None` is returned; its
    /// entry stays in the parent. An owner given a `successor` controller
    /// moves there together with every live reference into its tree, and
    /// the returned handle is the successor's new owner. An owner that
    /// will delete must name a successor; one that does not delete may
    /// pass `None`, which tears down its references and leaves the storage
    /// in place.
    pub fn detach(&self, successor: Option<&Arc<ValueController<L>>>) -> Result<Option<Self>> {
        Ok(self.tracked.detach(successor)?.map(Self::from_tracked))
    }

    /// Move an owner's contents out of its domain, for transport or for
    /// [`adopt`](Self::adopt) elsewhere. Live references are torn down.
    pub fn extract(&self) -> Result<DetachedDictionary> {
        match self.tracked.extract()? {
            DetachedValue::Dictionary(dict) => Ok(dict),
            other => Err(ValueError::type_mismatch(
                ValueType::Dictionary,
                other.value_type(),
            )),
        }
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.tracked.to_json()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════

    /// Number of entries.
    pub fn size(&self) -> Result<usize> {
        let id = self.id();
        self.tracked
            .access(false, |_, state| Ok(state.dictionary(id)?.len()))
    }

    /// True if `key` has an entry.
    pub fn has_key(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        let id = self.id();
        self.tracked
            .access(false, |_, state| Ok(state.dictionary(id)?.contains_key(key)))
    }

    /// All keys in insertion order.
    pub fn keys(&self) -> Result<Vec<String>> {
        let id = self.id();
        self.tracked
            .access(false, |_, state| Ok(state.dictionary(id)?.keys().cloned().collect()))
    }

    /// The kind stored at `key`, or [`ValueType::Invalid`] if absent.
    pub fn get_type(&self, key: &str) -> Result<ValueType> {
        check_key(key)?;
        let id = self.id();
        self.tracked.access(false, |_, state| {
            Ok(state
                .dictionary(id)?
                .get(key)
                .map_or(ValueType::Invalid, Entry::value_type))
        })
    }

    fn read<R>(&self, key: &str, f: impl FnOnce(&Entry) -> Result<R>) -> Result<R> {
        check_key(key)?;
        let id = self.id();
        self.tracked.access(false, |_, state| {
            let entry = state
                .dictionary(id)?
                .get(key)
                .ok_or_else(|| ValueError::NotFound(format!("key {key:?}")))?;
            f(entry)
        })
    }

    /// The bool at `key`.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.read(key, Entry::as_bool)
    }

    /// The int at `key`.
    pub fn get_int(&self, key: &str) -> Result<i32> {
        self.read(key, Entry::as_int)
    }

    /// The double at `key`. An int entry is converted.
    pub fn get_double(&self, key: &str) -> Result<f64> {
        self.read(key, Entry::as_double)
    }

    /// The string at `key`.
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.read(key, Entry::as_string)
    }

    fn child(&self, key: &str, kind: ValueType, read_only: bool) -> Result<Arc<TrackedValue<L>>> {
        check_key(key)?;
        let id = self.id();
        self.tracked.access(false, |controller, state| {
            let child = state
                .dictionary(id)?
                .get(key)
                .ok_or_else(|| ValueError::NotFound(format!("key {key:?}")))?
                .expect_node(kind)?;
            TrackedValue::get_or_create_ref(controller, state, child, kind, id, read_only)
        })
    }

    /// A reference to the binary at `key`.
    pub fn get_binary(&self, key: &str) -> Result<BinaryValue<L>> {
        self.child(key, ValueType::Binary, true)
            .map(BinaryValue::from_tracked)
    }

    /// A reference to the dictionary at `key`. It inherits this handle's
    /// read-only flag.
    pub fn get_dictionary(&self, key: &str) -> Result<DictionaryValue<L>> {
        self.child(key, ValueType::Dictionary, self.is_read_only())
            .map(DictionaryValue::from_tracked)
    }

    /// A reference to the list at `key`. It inherits this handle's
    /// read-only flag.
    pub fn get_list(&self, key: &str) -> Result<ListValue<L>> {
        self.child(key, ValueType::List, self.is_read_only())
            .map(ListValue::from_tracked)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Mutation
    // ═══════════════════════════════════════════════════════════════════

    /// Remove every entry. Handles into the removed entries become invalid.
    pub fn clear(&self) -> Result<()> {
        let id = self.id();
        self.tracked.access(true, |_, state| {
            state.remove_dependencies(id);
            let entries = std::mem::take(state.dictionary_mut(id)?);
            for (_, entry) in entries {
                state.release(id, entry);
            }
            Ok(())
        })
    }

    /// Remove the entry at `key`. Returns false if there was none.
    pub fn remove(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        let id = self.id();
        self.tracked
            .access(true, |_, state| remove_entry(state, id, key))
    }

    fn set_entry(&self, key: &str, entry: Entry) -> Result<()> {
        check_key(key)?;
        let id = self.id();
        self.tracked
            .access(true, |_, state| store_entry(state, id, key, entry))
    }

    fn set_node(&self, key: &str, source: &TrackedValue<L>) -> Result<()> {
        check_key(key)?;
        let id = self.id();
        self.tracked
            .insert_with(source, |state, entry| store_entry(state, id, key, entry))
    }

    /// Store null at `key`.
    pub fn set_null(&self, key: &str) -> Result<()> {
        self.set_entry(key, Entry::Null)
    }

    /// Store a bool at `key`.
    pub fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_entry(key, Entry::Bool(value))
    }

    /// Store an int at `key`.
    pub fn set_int(&self, key: &str, value: i32) -> Result<()> {
        self.set_entry(key, Entry::Int(value))
    }

    /// Store a double at `key`.
    pub fn set_double(&self, key: &str, value: f64) -> Result<()> {
        self.set_entry(key, Entry::Double(value))
    }

    /// Store a string at `key`.
    pub fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.set_entry(key, Entry::String(value.to_string()))
    }

    /// Store a binary at `key`.
    ///
    /// An owner that will delete is moved in and `value` becomes invalid;
    /// anything else is copied. The same rule applies to
    /// [`set_dictionary`](Self::set_dictionary) and
    /// [`set_list`](Self::set_list).
    pub fn set_binary(&self, key: &str, value: &BinaryValue<L>) -> Result<()> {
        self.set_node(key, value.tracked())
    }

    /// Store a dictionary at `key`.
    pub fn set_dictionary(&self, key: &str, value: &DictionaryValue<L>) -> Result<()> {
        self.set_node(key, value.tracked())
    }

    /// Store a list at `key`.
    pub fn set_list(&self, key: &str, value: &ListValue<L>) -> Result<()> {
        self.set_node(key, value.tracked())
    }
}

/// Take the entry at `key` out of dictionary `id` and release it.
fn remove_entry<L: LockPolicy>(
    state: &mut ControllerState<L>,
    id: NodeId,
    key: &str,
) -> Result<bool> {
    let Some(old) = state.dictionary_mut(id)?.shift_remove(key) else {
        return Ok(false);
    };
    state.release(id, old);
    Ok(true)
}

/// Store `entry` at `key`, releasing whatever it replaces. A replaced key
/// keeps its position.
fn store_entry<L: LockPolicy>(
    state: &mut ControllerState<L>,
    id: NodeId,
    key: &str,
    entry: Entry,
) -> Result<()> {
    if let Some(old) = state.dictionary_mut(id)?.insert(key.to_string(), entry) {
        state.release(id, old);
    }
    Ok(())
}

impl<L: LockPolicy> Clone for DictionaryValue<L> {
    fn clone(&self) -> Self {
        Self {
            tracked: Arc::clone(&self.tracked),
        }
    }
}
