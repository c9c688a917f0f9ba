//! Immutable byte buffers

use std::sync::Arc;

use super::{DetachedBinary, DetachedValue, OwnerMode, RootValue, TrackedValue, ValueType};
use crate::controller::{LockPolicy, ThreadSafe, ValueController};
use crate::error::{Result, ValueError};

/// A handle to an immutable byte buffer.
///
/// Binaries are always read-only; the only way to change one is to build
/// a new buffer and store it in place of the old one.
pub struct BinaryValue<L: LockPolicy = ThreadSafe> {
    tracked: Arc<TrackedValue<L>>,
}

impl BinaryValue<ThreadSafe> {
    /// Create a buffer holding a copy of `data` in a new thread-safe
    /// domain. Fails on empty input.
    pub fn create(data: &[u8]) -> Result<Self> {
        Self::new_root(data)
    }
}

impl<L: LockPolicy> BinaryValue<L> {
    /// Create a buffer holding a copy of `data` in a new domain.
    pub fn new_root(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(ValueError::invalid("binary data must not be empty"));
        }
        Self::adopt(DetachedBinary::new(data), None, OwnerMode::WillDelete)
    }

    /// Take ownership of a detached buffer, either in `controller` or in a
    /// new domain.
    pub fn adopt(
        value: DetachedBinary,
        controller: Option<Arc<ValueController<L>>>,
        mode: OwnerMode,
    ) -> Result<Self> {
        TrackedValue::root(RootValue::Binary(value), controller, mode, true).map(Self::from_tracked)
    }

    pub(crate) fn from_tracked(tracked: Arc<TrackedValue<L>>) -> Self {
        Self { tracked }
    }

    /// The wrapper behind this handle.
    pub fn tracked(&self) -> &TrackedValue<L> {
        &self.tracked
    }

    /// True while the buffer can be accessed.
    pub fn is_valid(&self) -> bool {
        self.tracked.is_valid()
    }

    /// True unless this handle is a reference into a container.
    pub fn is_owned(&self) -> bool {
        !self.tracked.is_reference()
    }

    /// Always true.
    pub fn is_read_only(&self) -> bool {
        true
    }

    /// True if both handles address the same live buffer.
    pub fn is_same(&self, other: &Self) -> bool {
        self.tracked.node_id() == other.tracked.node_id()
            && !self.tracked.is_detached()
            && !other.tracked.is_detached()
    }

    /// True if both buffers hold the same bytes.
    pub fn is_equal(&self, other: &Self) -> Result<bool> {
        self.tracked.is_equal(&other.tracked)
    }

    /// An independent copy in a new domain.
    pub fn copy(&self) -> Result<Self> {
        self.tracked.copy_root(true, false).map(Self::from_tracked)
    }

    /// Number of bytes.
    pub fn size(&self) -> Result<usize> {
        let id = self.tracked.node_id();
        self.tracked
            .access(false, |_, state| Ok(state.binary(id)?.len()))
    }

    /// Copy bytes starting at `offset` into `buffer` and return how many
    /// were copied. An offset at or past the end copies nothing.
    pub fn get_data(&self, buffer: &mut [u8], offset: usize) -> Result<usize> {
        if buffer.is_empty() {
            return Err(ValueError::invalid("destination buffer must not be empty"));
        }
        let id = self.tracked.node_id();
        self.tracked.access(false, |_, state| {
            let data = state.binary(id)?;
            if offset >= data.len() {
                return Ok(0);
            }
            let count = buffer.len().min(data.len() - offset);
            buffer[..count].copy_from_slice(&data[offset..offset + count]);
            Ok(count)
        })
    }

    /// All bytes.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let id = self.tracked.node_id();
        self.tracked
            .access(false, |_, state| Ok(state.binary(id)?.to_vec()))
    }

    /// Give up this handle.
    ///
    /// See [`DictionaryValue::detach`](crate::DictionaryValue::detach).
    pub fn detach(&self, successor: Option<&Arc<ValueController<L>>>) -> Result<Option<Self>> {
        Ok(self.tracked.detach(successor)?.map(Self::from_tracked))
    }

    /// Move an owner's bytes out of its domain.
    pub fn extract(&self) -> Result<DetachedBinary> {
        match self.tracked.extract()? {
            DetachedValue::Binary(binary) => Ok(binary),
            other => Err(ValueError::type_mismatch(
                ValueType::Binary,
                other.value_type(),
            )),
        }
    }

    /// Binaries have no JSON form; this always reports
    /// [`ValueError::Unsupported`] for a valid buffer.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.tracked.to_json()
    }

    /// The controller currently responsible for this buffer.
    pub fn controller(&self) -> Option<Arc<ValueController<L>>> {
        self.tracked.controller()
    }
}

impl<L: LockPolicy> Clone for BinaryValue<L> {
    fn clone(&self) -> Self {
        Self {
            tracked: Arc::clone(&self.tracked),
        }
    }
}
