//! Display and Debug implementations for values

use std::fmt;

use super::*;
use crate::controller::LockPolicy;

impl fmt::Display for DetachedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetachedValue::Null => write!(f, "null"),
            DetachedValue::Bool(b) => write!(f, "{}", b),
            DetachedValue::Int(n) => write!(f, "{}", n),
            DetachedValue::Double(n) => write!(f, "{:?}", n), // Always shows a decimal point
            DetachedValue::String(s) => write!(f, "{:?}", s),
            DetachedValue::Binary(b) => write!(f, "{}", b),
            DetachedValue::Dictionary(d) => write!(f, "{}", d),
            DetachedValue::List(l) => write!(f, "{}", l),
        }
    }
}

impl fmt::Display for DetachedBinary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{:?}", self.data)
    }
}

impl fmt::Display for DetachedDictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for DetachedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        write!(f, "]")
    }
}

// ═══════════════════════════════════════════════════════════════════
// Handles
// ═══════════════════════════════════════════════════════════════════

// Handles print their node, their mode and, while valid, a snapshot of
// the contents. Formatting takes the controller lock.

fn fmt_handle<L: LockPolicy>(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    tracked: &TrackedValue<L>,
) -> fmt::Result {
    write!(f, "{}({}, {:?}) ", name, tracked.node_id(), tracked.mode())?;
    if !tracked.is_valid() {
        return write!(f, "<detached>");
    }
    match tracked.snapshot() {
        Ok(value) => write!(f, "{}", value),
        Err(_) => write!(f, "<detached>"),
    }
}

impl<L: LockPolicy> fmt::Debug for BinaryValue<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_handle(f, "BinaryValue", self.tracked())
    }
}

impl<L: LockPolicy> fmt::Debug for DictionaryValue<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_handle(f, "DictionaryValue", self.tracked())
    }
}

impl<L: LockPolicy> fmt::Debug for ListValue<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_handle(f, "ListValue", self.tracked())
    }
}
