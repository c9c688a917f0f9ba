//! Value kinds and their storage representation

mod binary;
mod detached;
mod dictionary;
mod display;
mod json;
mod list;
mod tracked;

pub use binary::BinaryValue;
pub use detached::{DetachedBinary, DetachedDictionary, DetachedList, DetachedValue};
pub use dictionary::DictionaryValue;
pub use list::ListValue;
pub use tracked::TrackedValue;

pub(crate) use detached::RootValue;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::error::{Result, ValueError};

/// The kind of a value, as reported by `get_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// No value (missing entry or detached container)
    Invalid,
    /// Explicit null
    Null,
    /// Boolean
    Bool,
    /// 32-bit signed integer
    Int,
    /// 64-bit float
    Double,
    /// UTF-8 string
    String,
    /// Immutable byte buffer
    Binary,
    /// String-keyed container
    Dictionary,
    /// Index-addressed container
    List,
}

impl ValueType {
    /// True for kinds that are stored as arena nodes and can be wrapped.
    pub fn is_node(self) -> bool {
        matches!(
            self,
            ValueType::Binary | ValueType::Dictionary | ValueType::List
        )
    }

    /// True for kinds that can hold other values.
    pub fn is_container(self) -> bool {
        matches!(self, ValueType::Dictionary | ValueType::List)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Invalid => "invalid",
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::Binary => "binary",
            ValueType::Dictionary => "dictionary",
            ValueType::List => "list",
        };
        f.write_str(name)
    }
}

/// Stable identity of a binary, dictionary or list node.
///
/// Ids are unique for the life of the process and survive moves between
/// controllers, so wrappers keep addressing the same node after a detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    /// Allocate a new, never used id.
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a wrapper relates to its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMode {
    /// Points at a node owned by a container in the same domain. Can be
    /// detached, but its storage is never handed out; copy it instead.
    Reference,

    /// Owns its domain and frees the storage when deleted. Can only be
    /// detached into another controller.
    OwnerWillDelete,

    /// Owns its domain but leaves the storage in the controller when
    /// deleted. Meant for scope-limited values that are explicitly
    /// detached once the scope ends.
    OwnerNoDelete,
}

/// The owning subset of [`ValueMode`], used when adopting a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerMode {
    /// See [`ValueMode::OwnerWillDelete`]
    WillDelete,
    /// See [`ValueMode::OwnerNoDelete`]
    NoDelete,
}

impl From<OwnerMode> for ValueMode {
    fn from(mode: OwnerMode) -> Self {
        match mode {
            OwnerMode::WillDelete => ValueMode::OwnerWillDelete,
            OwnerMode::NoDelete => ValueMode::OwnerNoDelete,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Arena storage
// ═══════════════════════════════════════════════════════════════════

/// A slot inside a dictionary or list. Scalars live inline; nested
/// binaries and containers are arena nodes addressed by id.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Entry {
    Null,
    Bool(bool),
    Int(i32),
    Double(f64),
    String(String),
    Binary(NodeId),
    Dictionary(NodeId),
    List(NodeId),
}

impl Entry {
    pub(crate) fn value_type(&self) -> ValueType {
        match self {
            Entry::Null => ValueType::Null,
            Entry::Bool(_) => ValueType::Bool,
            Entry::Int(_) => ValueType::Int,
            Entry::Double(_) => ValueType::Double,
            Entry::String(_) => ValueType::String,
            Entry::Binary(_) => ValueType::Binary,
            Entry::Dictionary(_) => ValueType::Dictionary,
            Entry::List(_) => ValueType::List,
        }
    }

    pub(crate) fn node_id(&self) -> Option<NodeId> {
        match self {
            Entry::Binary(id) | Entry::Dictionary(id) | Entry::List(id) => Some(*id),
            _ => None,
        }
    }

    pub(crate) fn node(kind: ValueType, id: NodeId) -> Option<Self> {
        match kind {
            ValueType::Binary => Some(Entry::Binary(id)),
            ValueType::Dictionary => Some(Entry::Dictionary(id)),
            ValueType::List => Some(Entry::List(id)),
            _ => None,
        }
    }

    pub(crate) fn as_bool(&self) -> Result<bool> {
        match self {
            Entry::Bool(b) => Ok(*b),
            other => Err(ValueError::type_mismatch(ValueType::Bool, other.value_type())),
        }
    }

    pub(crate) fn as_int(&self) -> Result<i32> {
        match self {
            Entry::Int(n) => Ok(*n),
            other => Err(ValueError::type_mismatch(ValueType::Int, other.value_type())),
        }
    }

    /// Ints read as doubles.
    pub(crate) fn as_double(&self) -> Result<f64> {
        match self {
            Entry::Double(n) => Ok(*n),
            Entry::Int(n) => Ok(f64::from(*n)),
            other => Err(ValueError::type_mismatch(
                ValueType::Double,
                other.value_type(),
            )),
        }
    }

    pub(crate) fn as_string(&self) -> Result<String> {
        match self {
            Entry::String(s) => Ok(s.clone()),
            other => Err(ValueError::type_mismatch(
                ValueType::String,
                other.value_type(),
            )),
        }
    }

    /// The node id, provided the entry is of kind `expected`.
    pub(crate) fn expect_node(&self, expected: ValueType) -> Result<NodeId> {
        match self.node_id() {
            Some(id) if self.value_type() == expected => Ok(id),
            _ => Err(ValueError::type_mismatch(expected, self.value_type())),
        }
    }
}

/// Storage for one binary, dictionary or list.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    Binary(Vec<u8>),
    Dictionary(IndexMap<String, Entry>),
    List(Vec<Entry>),
}

impl Node {
    pub(crate) fn value_type(&self) -> ValueType {
        match self {
            Node::Binary(_) => ValueType::Binary,
            Node::Dictionary(_) => ValueType::Dictionary,
            Node::List(_) => ValueType::List,
        }
    }
}

/// Reject empty dictionary keys.
pub(crate) fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        tracing::warn!("empty dictionary key");
        return Err(ValueError::invalid("dictionary key must not be empty"));
    }
    Ok(())
}
