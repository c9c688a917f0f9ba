//! Index-addressed containers

use std::sync::Arc;

use super::{
    BinaryValue, DetachedList, DetachedValue, DictionaryValue, Entry, NodeId, OwnerMode,
    RootValue, TrackedValue, ValueType,
};
use crate::context::ValueContext;
use crate::controller::{ControllerState, LockPolicy, ThreadSafe, ValueController};
use crate::error::{Result, ValueError};

/// A handle to a list node.
///
/// Setting past the end pads the list with nulls. Removing an item shifts
/// the ones after it down by one, and any reference handle to the removed
/// item stops working.
pub struct ListValue<L: LockPolicy = ThreadSafe> {
    tracked: Arc<TrackedValue<L>>,
}

impl ListValue<ThreadSafe> {
    /// Create an empty, writable list in a new thread-safe domain.
    pub fn create() -> Self {
        Self::new_root()
    }

    /// Build a list from a JSON array.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        Self::from_json_with(json, ValueContext::default())
    }
}

impl<L: LockPolicy> ListValue<L> {
    /// Create an empty, writable list in a new domain.
    pub fn new_root() -> Self {
        Self::from_tracked(TrackedValue::bootstrap(
            RootValue::List(DetachedList::new()),
            OwnerMode::WillDelete,
            false,
            ValueContext::default(),
        ))
    }

    /// Take ownership of a detached list, either in `controller` or in a
    /// new domain.
    pub fn adopt(
        value: DetachedList,
        controller: Option<Arc<ValueController<L>>>,
        mode: OwnerMode,
        read_only: bool,
    ) -> Result<Self> {
        TrackedValue::root(RootValue::List(value), controller, mode, read_only)
            .map(Self::from_tracked)
    }

    /// Build a list from a JSON array in a domain configured by `context`.
    pub fn from_json_with(json: &serde_json::Value, context: ValueContext) -> Result<Self> {
        match DetachedValue::from_json(json, &context)? {
            DetachedValue::List(list) => Ok(Self::from_tracked(TrackedValue::bootstrap(
                RootValue::List(list),
                OwnerMode::WillDelete,
                false,
                context,
            ))),
            other => Err(ValueError::type_mismatch(
                ValueType::List,
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

    /// True while the list can be accessed.
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

    /// True if both handles address the same live list.
    pub fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id() && !self.tracked.is_detached() && !other.tracked.is_detached()
    }

    /// Deep content equality.
    pub fn is_equal(&self, other: &Self) -> Result<bool> {
        self.tracked.is_equal(&other.tracked)
    }

    /// The controller currently responsible for this list.
    pub fn controller(&self) -> Option<Arc<ValueController<L>>> {
        self.tracked.controller()
    }

    /// A writable deep copy in a new domain.
    pub fn copy(&self) -> Result<Self> {
        self.tracked.copy_root(false, false).map(Self::from_tracked)
    }

    /// Give up this handle.
    ///
    /// See [`DictionaryValue::detach`].
    pub fn detach(&self, successor: Option<&Arc<ValueController<L>>>) -> Result<Option<Self>> {
        Ok(self.tracked.detach(successor)?.map(Self::from_tracked))
    }

    /// Move an owner's contents out of its domain.
    pub fn extract(&self) -> Result<DetachedList> {
        match self.tracked.extract()? {
            DetachedValue::List(list) => Ok(list),
            other => Err(ValueError::type_mismatch(
                ValueType::List,
                other.value_type(),
            )),
        }
    }

    /// Render as a JSON array.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.tracked.to_json()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════

    /// Number of items.
    pub fn size(&self) -> Result<usize> {
        let id = self.id();
        self.tracked
            .access(false, |_, state| Ok(state.list(id)?.len()))
    }

    /// The kind stored at `index`, or [`ValueType::Invalid`] past the end.
    pub fn get_type(&self, index: usize) -> Result<ValueType> {
        let id = self.id();
        self.tracked.access(false, |_, state| {
            Ok(state
                .list(id)?
                .get(index)
                .map_or(ValueType::Invalid, Entry::value_type))
        })
    }

    fn read<R>(&self, index: usize, f: impl FnOnce(&Entry) -> Result<R>) -> Result<R> {
        let id = self.id();
        self.tracked.access(false, |_, state| {
            let entry = state
                .list(id)?
                .get(index)
                .ok_or_else(|| ValueError::NotFound(format!("index {index}")))?;
            f(entry)
        })
    }

    /// The bool at `index`.
    pub fn get_bool(&self, index: usize) -> Result<bool> {
        self.read(index, Entry::as_bool)
    }

    /// The int at `index`.
    pub fn get_int(&self, index: usize) -> Result<i32> {
        self.read(index, Entry::as_int)
    }

    /// The double at `index`. An int item is converted.
    pub fn get_double(&self, index: usize) -> Result<f64> {
        self.read(index, Entry::as_double)
    }

    /// The string at `index`.
    pub fn get_string(&self, index: usize) -> Result<String> {
        self.read(index, Entry::as_string)
    }

    fn child(&self, index: usize, kind: ValueType, read_only: bool) -> Result<Arc<TrackedValue<L>>> {
        let id = self.id();
        self.tracked.access(false, |controller, state| {
            let child = state
                .list(id)?
                .get(index)
                .ok_or_else(|| ValueError::NotFound(format!("index {index}")))?
                .expect_node(kind)?;
            TrackedValue::get_or_create_ref(controller, state, child, kind, id, read_only)
        })
    }

    /// A reference to the binary at `index`.
    pub fn get_binary(&self, index: usize) -> Result<BinaryValue<L>> {
        self.child(index, ValueType::Binary, true)
            .map(BinaryValue::from_tracked)
    }

    /// A reference to the dictionary at `index`. It inherits this handle's
    /// read-only flag.
    pub fn get_dictionary(&self, index: usize) -> Result<DictionaryValue<L>> {
        self.child(index, ValueType::Dictionary, self.is_read_only())
            .map(DictionaryValue::from_tracked)
    }

    /// A reference to the list at `index`. It inherits this handle's
    /// read-only flag.
    pub fn get_list(&self, index: usize) -> Result<ListValue<L>> {
        self.child(index, ValueType::List, self.is_read_only())
            .map(ListValue::from_tracked)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Mutation
    // ═══════════════════════════════════════════════════════════════════

    /// Truncate or pad with nulls to exactly `size` items. Handles into
    /// truncated items become invalid.
    pub fn set_size(&self, size: usize) -> Result<()> {
        let id = self.id();
        self.tracked.access(true, |_, state| {
            let len = state.list(id)?.len();
            if size < len {
                let removed = state.list_mut(id)?.split_off(size);
                for entry in removed.into_iter().rev() {
                    state.release(id, entry);
                }
            } else {
                state.list_mut(id)?.resize(size, Entry::Null);
            }
            Ok(())
        })
    }

    /// Remove every item. Handles into the removed items become invalid.
    pub fn clear(&self) -> Result<()> {
        let id = self.id();
        self.tracked.access(true, |_, state| {
            state.remove_dependencies(id);
            let items = std::mem::take(state.list_mut(id)?);
            for entry in items {
                state.release(id, entry);
            }
            Ok(())
        })
    }

    /// Remove the item at `index`, shifting later items down. Returns false
    /// if `index` is past the end.
    pub fn remove(&self, index: usize) -> Result<bool> {
        let id = self.id();
        self.tracked.access(true, |_, state| {
            let items = state.list_mut(id)?;
            if index >= items.len() {
                return Ok(false);
            }
            let old = items.remove(index);
            state.release(id, old);
            Ok(true)
        })
    }

    fn set_entry(&self, index: usize, entry: Entry) -> Result<()> {
        let id = self.id();
        self.tracked
            .access(true, |_, state| store_entry(state, id, index, entry))
    }

    fn set_node(&self, index: usize, source: &TrackedValue<L>) -> Result<()> {
        let id = self.id();
        self.tracked
            .insert_with(source, |state, entry| store_entry(state, id, index, entry))
    }

    /// Store null at `index`.
    pub fn set_null(&self, index: usize) -> Result<()> {
        self.set_entry(index, Entry::Null)
    }

    /// Store a bool at `index`.
    pub fn set_bool(&self, index: usize, value: bool) -> Result<()> {
        self.set_entry(index, Entry::Bool(value))
    }

    /// Store an int at `index`.
    pub fn set_int(&self, index: usize, value: i32) -> Result<()> {
        self.set_entry(index, Entry::Int(value))
    }

    /// Store a double at `index`.
    pub fn set_double(&self, index: usize, value: f64) -> Result<()> {
        self.set_entry(index, Entry::Double(value))
    }

    /// Store a string at `index`.
    pub fn set_string(&self, index: usize, value: &str) -> Result<()> {
        self.set_entry(index, Entry::String(value.to_string()))
    }

    /// Store a binary at `index`. Moves or copies like
    /// [`DictionaryValue::set_binary`].
    pub fn set_binary(&self, index: usize, value: &BinaryValue<L>) -> Result<()> {
        self.set_node(index, value.tracked())
    }

    /// Store a dictionary at `index`.
    pub fn set_dictionary(&self, index: usize, value: &DictionaryValue<L>) -> Result<()> {
        self.set_node(index, value.tracked())
    }

    /// Store a list at `index`.
    pub fn set_list(&self, index: usize, value: &ListValue<L>) -> Result<()> {
        self.set_node(index, value.tracked())
    }
}

/// Store `entry` at `index`, releasing whatever it replaces and padding
/// with nulls when `index` is past the end.
fn store_entry<L: LockPolicy>(
    state: &mut ControllerState<L>,
    id: NodeId,
    index: usize,
    entry: Entry,
) -> Result<()> {
    let items = state.list_mut(id)?;
    if index < items.len() {
        let old = std::mem::replace(&mut items[index], entry);
        state.release(id, old);
    } else {
        items.resize(index, Entry::Null);
        items.push(entry);
    }
    Ok(())
}

impl<L: LockPolicy> Clone for ListValue<L> {
    fn clone(&self) -> Self {
        Self {
            tracked: Arc::clone(&self.tracked),
        }
    }
}
