//! Node storage for a controller domain

use indexmap::IndexMap;
use tracing::trace;

use super::{ControllerState, LockPolicy};
use crate::error::{Result, ValueError};
use crate::value::{
    DetachedBinary, DetachedDictionary, DetachedList, DetachedValue, Entry, Node, NodeId,
    RootValue, ValueType,
};

impl<L: LockPolicy> ControllerState<L> {
    // ═══════════════════════════════════════════════════════════════════
    // Insertion
    // ═══════════════════════════════════════════════════════════════════

    /// Keep a detached tree's id unless this arena already uses it.
    fn claim(&self, id: NodeId) -> NodeId {
        if self.nodes.contains_key(&id) {
            let fresh = NodeId::fresh();
            trace!(domain = self.domain(), old = %id, new = %fresh, "node id reassigned");
            fresh
        } else {
            id
        }
    }

    pub(crate) fn insert_binary(&mut self, binary: DetachedBinary) -> NodeId {
        let id = self.claim(binary.id);
        self.nodes.insert(id, Node::Binary(binary.data));
        id
    }

    pub(crate) fn insert_dictionary(&mut self, dict: DetachedDictionary) -> NodeId {
        let id = self.claim(dict.id);
        let mut entries = IndexMap::with_capacity(dict.entries.len());
        for (key, value) in dict.entries {
            let entry = self.insert_detached(value);
            entries.insert(key, entry);
        }
        self.nodes.insert(id, Node::Dictionary(entries));
        id
    }

    pub(crate) fn insert_list(&mut self, list: DetachedList) -> NodeId {
        let id = self.claim(list.id);
        let items = list
            .items
            .into_iter()
            .map(|value| self.insert_detached(value))
            .collect();
        self.nodes.insert(id, Node::List(items));
        id
    }

    pub(crate) fn insert_root(&mut self, root: RootValue) -> NodeId {
        match root {
            RootValue::Binary(b) => self.insert_binary(b),
            RootValue::Dictionary(d) => self.insert_dictionary(d),
            RootValue::List(l) => self.insert_list(l),
        }
    }

    /// Store a detached value and return the entry that refers to it.
    pub(crate) fn insert_detached(&mut self, value: DetachedValue) -> Entry {
        match value {
            DetachedValue::Null => Entry::Null,
            DetachedValue::Bool(b) => Entry::Bool(b),
            DetachedValue::Int(n) => Entry::Int(n),
            DetachedValue::Double(n) => Entry::Double(n),
            DetachedValue::String(s) => Entry::String(s),
            DetachedValue::Binary(b) => Entry::Binary(self.insert_binary(b)),
            DetachedValue::Dictionary(d) => Entry::Dictionary(self.insert_dictionary(d)),
            DetachedValue::List(l) => Entry::List(self.insert_list(l)),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Lookup
    // ═══════════════════════════════════════════════════════════════════

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(ValueError::Detached)
    }

    pub(crate) fn binary(&self, id: NodeId) -> Result<&[u8]> {
        match self.node(id)? {
            Node::Binary(data) => Ok(data),
            other => Err(ValueError::type_mismatch(
                ValueType::Binary,
                other.value_type(),
            )),
        }
    }

    pub(crate) fn dictionary(&self, id: NodeId) -> Result<&IndexMap<String, Entry>> {
        match self.node(id)? {
            Node::Dictionary(entries) => Ok(entries),
            other => Err(ValueError::type_mismatch(
                ValueType::Dictionary,
                other.value_type(),
            )),
        }
    }

    pub(crate) fn dictionary_mut(&mut self, id: NodeId) -> Result<&mut IndexMap<String, Entry>> {
        match self.nodes.get_mut(&id) {
            Some(Node::Dictionary(entries)) => Ok(entries),
            Some(other) => Err(ValueError::type_mismatch(
                ValueType::Dictionary,
                other.value_type(),
            )),
            None => Err(ValueError::Detached),
        }
    }

    pub(crate) fn list(&self, id: NodeId) -> Result<&Vec<Entry>> {
        match self.node(id)? {
            Node::List(items) => Ok(items),
            other => Err(ValueError::type_mismatch(
                ValueType::List,
                other.value_type(),
            )),
        }
    }

    pub(crate) fn list_mut(&mut self, id: NodeId) -> Result<&mut Vec<Entry>> {
        match self.nodes.get_mut(&id) {
            Some(Node::List(items)) => Ok(items),
            Some(other) => Err(ValueError::type_mismatch(
                ValueType::List,
                other.value_type(),
            )),
            None => Err(ValueError::Detached),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Copy, extraction and release
    // ═══════════════════════════════════════════════════════════════════

    /// Deep-copy the value behind `entry`. With `fresh_ids` the copy gets
    /// new node identities and can live beside the original.
    pub(crate) fn snapshot(&self, entry: &Entry, fresh_ids: bool) -> Result<DetachedValue> {
        let next_id = |id: NodeId| if fresh_ids { NodeId::fresh() } else { id };
        Ok(match entry {
            Entry::Null => DetachedValue::Null,
            Entry::Bool(b) => DetachedValue::Bool(*b),
            Entry::Int(n) => DetachedValue::Int(*n),
            Entry::Double(n) => DetachedValue::Double(*n),
            Entry::String(s) => DetachedValue::String(s.clone()),
            Entry::Binary(id) => DetachedValue::Binary(DetachedBinary {
                id: next_id(*id),
                data: self.binary(*id)?.to_vec(),
            }),
            Entry::Dictionary(id) => {
                let source = self.dictionary(*id)?;
                let mut entries = IndexMap::with_capacity(source.len());
                for (key, child) in source {
                    entries.insert(key.clone(), self.snapshot(child, fresh_ids)?);
                }
                DetachedValue::Dictionary(DetachedDictionary {
                    id: next_id(*id),
                    entries,
                })
            }
            Entry::List(id) => {
                let items = self
                    .list(*id)?
                    .iter()
                    .map(|child| self.snapshot(child, fresh_ids))
                    .collect::<Result<Vec<_>>>()?;
                DetachedValue::List(DetachedList {
                    id: next_id(*id),
                    items,
                })
            }
        })
    }

    /// Move the value behind `entry` out of the arena, keeping node ids.
    pub(crate) fn extract(&mut self, entry: &Entry) -> Result<DetachedValue> {
        let Some(id) = entry.node_id() else {
            return self.snapshot(entry, false);
        };
        let node = self.nodes.remove(&id).ok_or(ValueError::Detached)?;
        if node.value_type() != entry.value_type() {
            let got = node.value_type();
            self.nodes.insert(id, node);
            return Err(ValueError::type_mismatch(entry.value_type(), got));
        }
        Ok(match node {
            Node::Binary(data) => DetachedValue::Binary(DetachedBinary { id, data }),
            Node::Dictionary(source) => {
                let mut entries = IndexMap::with_capacity(source.len());
                for (key, child) in source {
                    entries.insert(key, self.extract(&child)?);
                }
                DetachedValue::Dictionary(DetachedDictionary { id, entries })
            }
            Node::List(source) => {
                let items = source
                    .iter()
                    .map(|child| self.extract(child))
                    .collect::<Result<Vec<_>>>()?;
                DetachedValue::List(DetachedList { id, items })
            }
        })
    }

    /// Drop the storage behind `entry` without touching registrations.
    pub(crate) fn free(&mut self, entry: &Entry) {
        let Some(id) = entry.node_id() else {
            return;
        };
        match self.nodes.remove(&id) {
            Some(Node::Dictionary(entries)) => {
                for child in entries.values() {
                    self.free(child);
                }
            }
            Some(Node::List(items)) => {
                for child in &items {
                    self.free(child);
                }
            }
            Some(Node::Binary(_)) | None => {}
        }
    }

    /// Tear down an entry that was just taken out of `parent`: invalidate
    /// its wrapper, cascade through its dependents, forget the edge from
    /// `parent`, then free the storage.
    pub(crate) fn release(&mut self, parent: NodeId, entry: Entry) {
        if let Some(id) = entry.node_id() {
            self.remove(id, None, true);
            if entry.value_type().is_container() {
                self.remove_dependencies(id);
            }
            self.prune_dependency(parent, id);
        }
        self.free(&entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ThreadSafe;

    fn sample() -> DetachedDictionary {
        DetachedDictionary::new()
            .with("n", 1)
            .with("bin", DetachedBinary::new(vec![1u8, 2, 3]))
            .with(
                "list",
                DetachedList::new().with(DetachedDictionary::new().with("deep", true)),
            )
    }

    #[test]
    fn test_insert_and_extract_keep_ids() {
        let mut state = ControllerState::<ThreadSafe>::new(0);
        let dict = sample();
        let original_id = dict.id;
        let id = state.insert_dictionary(dict);
        assert_eq!(id, original_id);
        assert_eq!(state.nodes.len(), 4);

        let out = state.extract(&Entry::Dictionary(id)).unwrap();
        assert!(state.nodes.is_empty());
        match out {
            DetachedValue::Dictionary(d) => {
                assert_eq!(d.id, original_id);
                assert_eq!(d, sample());
            }
            other => panic!("Expected dictionary, got {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_with_fresh_ids() {
        let mut state = ControllerState::<ThreadSafe>::new(0);
        let id = state.insert_dictionary(sample());
        let copy = state.snapshot(&Entry::Dictionary(id), true).unwrap();
        match &copy {
            DetachedValue::Dictionary(d) => assert_ne!(d.id, id),
            other => panic!("Expected dictionary, got {:?}", other),
        }
        // Re-inserting the copy must not collide with the original.
        state.insert_detached(copy);
        assert_eq!(state.nodes.len(), 8);
    }

    #[test]
    fn test_colliding_id_is_reassigned() {
        let mut state = ControllerState::<ThreadSafe>::new(0);
        let dict = DetachedDictionary::new();
        let id = dict.id;
        state.insert_dictionary(dict);
        let again = DetachedDictionary { id, entries: IndexMap::new() };
        let second = state.insert_dictionary(again);
        assert_ne!(second, id);
    }

    #[test]
    fn test_free_removes_subtree() {
        let mut state = ControllerState::<ThreadSafe>::new(0);
        let id = state.insert_dictionary(sample());
        state.free(&Entry::Dictionary(id));
        assert!(state.nodes.is_empty());
    }

    #[test]
    fn test_lookup_reports_kind_mismatch() {
        let mut state = ControllerState::<ThreadSafe>::new(0);
        let id = state.insert_list(DetachedList::new());
        assert_eq!(
            state.dictionary(id).err(),
            Some(ValueError::type_mismatch(ValueType::Dictionary, ValueType::List))
        );
        assert_eq!(state.binary(NodeId::fresh()).err(), Some(ValueError::Detached));
    }
}
