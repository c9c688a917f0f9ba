//! The controller-gated wrapper shared by every value kind

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{DetachedValue, Entry, NodeId, OwnerMode, RootValue, ValueMode, ValueType};
use crate::context::ValueContext;
use crate::controller::{ControllerState, LockPolicy, ValueController};
use crate::error::{ControllerError, Result, ValueError};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Wrappers rebound by a transfer. Held until every lock is released.
pub(crate) type Rebound<L> = Vec<Arc<TrackedValue<L>>>;

/// A handle to one binary, dictionary or list node.
///
/// The wrapper never trusts itself: each access goes through its
/// controller, which is locked and asked whether this wrapper is still the
/// registered one for its node. A wrapper whose node was torn down, or
/// that was detached, answers every access with [`ValueError::Detached`].
pub struct TrackedValue<L: LockPolicy> {
    id: NodeId,
    kind: ValueType,
    mode: ValueMode,
    read_only: bool,
    generation: u64,
    binding: RwLock<Option<Arc<ValueController<L>>>>,
}

impl<L: LockPolicy> TrackedValue<L> {
    /// A wrapper that is not yet bound to any controller.
    pub(crate) fn unbound(
        id: NodeId,
        kind: ValueType,
        mode: ValueMode,
        read_only: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind,
            mode,
            read_only,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            binding: RwLock::new(None),
        })
    }

    // ═══════════════════════════════════════════════════════════════════
    // Construction
    // ═══════════════════════════════════════════════════════════════════

    /// Start a new domain owned by `root`. Cannot fail: the controller is
    /// built around the already registered owner.
    pub(crate) fn bootstrap(
        root: RootValue,
        mode: OwnerMode,
        read_only: bool,
        context: ValueContext,
    ) -> Arc<Self> {
        let kind = root.value_type();
        let mut state = ControllerState::new(ValueController::<L>::next_id());
        let id = state.insert_root(root);
        let object = Self::unbound(id, kind, mode.into(), read_only);
        let registered = state.set_owner(id, &object);
        debug_assert!(registered.is_ok(), "a fresh controller has no owner");
        let controller = ValueController::from_state(state, context);
        object.rebind(&controller);
        object
    }

    /// Adopt `root` as the owner of an existing controller's domain.
    pub(crate) fn adopt(
        root: RootValue,
        controller: Arc<ValueController<L>>,
        mode: OwnerMode,
        read_only: bool,
    ) -> Result<Arc<Self>> {
        let kind = root.value_type();
        let mut state = controller.lock()?;
        let id = state.insert_root(root);
        let object = Self::unbound(id, kind, mode.into(), read_only);
        if let Err(err) = state.set_owner(id, &object) {
            if let Some(entry) = Entry::node(kind, id) {
                state.free(&entry);
            }
            return Err(err.into());
        }
        object.rebind(&controller);
        Ok(object)
    }

    /// Reuse the live wrapper for `id`, or register a new reference to it
    /// hanging off `parent`.
    pub(crate) fn get_or_create_ref(
        controller: &Arc<ValueController<L>>,
        state: &mut ControllerState<L>,
        id: NodeId,
        kind: ValueType,
        parent: NodeId,
        read_only: bool,
    ) -> Result<Arc<Self>> {
        if let Some(existing) = state.get(id) {
            return Ok(existing);
        }
        let object = Self::unbound(id, kind, ValueMode::Reference, read_only);
        state.add_reference(id, &object)?;
        state.add_dependency(parent, id);
        object.rebind(controller);
        Ok(object)
    }

    // ═══════════════════════════════════════════════════════════════════
    // State
    // ═══════════════════════════════════════════════════════════════════

    /// The node this wrapper addresses.
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    /// The kind of the node.
    pub fn kind(&self) -> ValueType {
        self.kind
    }

    /// How this wrapper relates to its node.
    pub fn mode(&self) -> ValueMode {
        self.mode
    }

    /// True for a non-owning wrapper.
    pub fn is_reference(&self) -> bool {
        self.mode == ValueMode::Reference
    }

    /// True if deleting this wrapper frees the storage.
    pub fn will_delete(&self) -> bool {
        self.mode == ValueMode::OwnerWillDelete
    }

    /// True if mutation is refused.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// True once the wrapper is no longer bound to a controller.
    pub fn is_detached(&self) -> bool {
        self.binding.read().is_none()
    }

    /// True while this wrapper is the registered handle for its node.
    pub fn is_valid(&self) -> bool {
        let Some(controller) = self.controller() else {
            return false;
        };
        let Ok(state) = controller.lock() else {
            return false;
        };
        self.is_bound_to(&controller) && state.is_registered(self.id, self.generation)
    }

    /// The controller currently responsible for this wrapper.
    pub fn controller(&self) -> Option<Arc<ValueController<L>>> {
        self.binding.read().clone()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn entry(&self) -> Entry {
        // `kind` is always a node kind; see the constructors.
        Entry::node(self.kind, self.id).unwrap_or(Entry::Null)
    }

    pub(crate) fn rebind(&self, controller: &Arc<ValueController<L>>) {
        *self.binding.write() = Some(Arc::clone(controller));
    }

    fn is_bound_to(&self, controller: &Arc<ValueController<L>>) -> bool {
        self.binding
            .read()
            .as_ref()
            .is_some_and(|bound| Arc::ptr_eq(bound, controller))
    }

    /// Controller callback: the node was torn down by its owner.
    pub(crate) fn on_control_removed(&self) {
        if !self.is_reference() {
            warn!(node = %self.id, mode = ?self.mode, "owner notified of removal");
        }
        *self.binding.write() = None;
    }

    // ═══════════════════════════════════════════════════════════════════
    // Access
    // ═══════════════════════════════════════════════════════════════════

    fn verify_attached(&self) -> Result<Arc<ValueController<L>>> {
        self.controller().ok_or_else(|| {
            warn!(node = %self.id, kind = %self.kind, "value accessed after being detached");
            ValueError::Detached
        })
    }

    fn verify_access(&self, modify: bool) -> Result<()> {
        if modify && self.read_only {
            warn!(node = %self.id, kind = %self.kind, "mutation attempted on read-only value");
            return Err(ValueError::ReadOnly);
        }
        Ok(())
    }

    /// Run `f` with the controller locked, after checking that this
    /// wrapper is attached, still registered and allowed to `modify`.
    pub(crate) fn access<R>(
        &self,
        modify: bool,
        f: impl FnOnce(&Arc<ValueController<L>>, &mut ControllerState<L>) -> Result<R>,
    ) -> Result<R> {
        loop {
            let controller = self.verify_attached()?;
            let mut state = controller.lock()?;
            if !self.is_bound_to(&controller) {
                // Moved to another controller while we waited.
                continue;
            }
            if !state.is_registered(self.id, self.generation) {
                warn!(node = %self.id, "value accessed after being detached");
                return Err(ValueError::Detached);
            }
            debug_assert!(controller.locked(), "controller must be locked");
            self.verify_access(modify)?;
            return f(&controller, &mut *state);
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Delete, detach, copy
    // ═══════════════════════════════════════════════════════════════════

    /// Unregister this wrapper. An owner that will delete also tears down
    /// its dependents and frees the storage.
    pub fn delete(&self) {
        loop {
            let Some(controller) = self.controller() else {
                return;
            };
            let Ok(mut state) = controller.lock() else {
                return;
            };
            if !self.is_bound_to(&controller) {
                continue;
            }
            state.remove(self.id, Some(self.generation), false);
            if self.will_delete() {
                state.remove_dependencies(self.id);
                state.free(&self.entry());
            }
            *self.binding.write() = None;
            return;
        }
    }

    /// Run `f` with this wrapper's controller and a second, distinct
    /// controller both locked. The locks are taken in domain id order, so
    /// two threads moving values in opposite directions cannot deadlock.
    fn access_pair<R>(
        &self,
        other: Counterpart<'_, L>,
        modify: bool,
        f: impl FnOnce(
            &Arc<ValueController<L>>,
            &mut ControllerState<L>,
            &Arc<ValueController<L>>,
            &mut ControllerState<L>,
        ) -> Result<R>,
    ) -> Result<R> {
        loop {
            let controller = self.verify_attached()?;
            let other_controller = match other {
                Counterpart::Controller(next) => Arc::clone(next),
                Counterpart::Value(value) => value.verify_attached()?,
            };
            if Arc::ptr_eq(&controller, &other_controller) {
                return Err(ValueError::invalid(
                    "an owning value cannot be moved within its own domain",
                ));
            }
            let (mut state, mut other_state) = controller.lock_pair(&other_controller)?;
            if !self.is_bound_to(&controller) {
                continue;
            }
            if let Counterpart::Value(value) = other {
                if !value.is_bound_to(&other_controller) {
                    continue;
                }
                if !other_state.is_registered(value.id, value.generation) {
                    warn!(node = %value.id, "value accessed after being detached");
                    return Err(ValueError::Detached);
                }
            }
            if !state.is_registered(self.id, self.generation) {
                warn!(node = %self.id, "value accessed after being detached");
                return Err(ValueError::Detached);
            }
            self.verify_access(modify)?;
            return f(&controller, &mut *state, &other_controller, &mut *other_state);
        }
    }

    /// Move this owner's storage, live references and dependency edges out
    /// of `state` and into `next_state`. The storage comes back as a tree
    /// that keeps its node ids; the caller stores it in `next_state` before
    /// releasing either lock, so every moved reference finds its node.
    fn hand_over(
        &self,
        state: &mut ControllerState<L>,
        next: &Arc<ValueController<L>>,
        next_state: &mut ControllerState<L>,
        rebound: &mut Rebound<L>,
    ) -> Result<DetachedValue> {
        let value = state.extract(&self.entry())?;
        rebound.extend(next_state.take_from(state, next));
        state.remove(self.id, Some(self.generation), false);
        *self.binding.write() = None;
        debug!(
            node = %self.id,
            kind = %self.kind,
            from = state.domain(),
            to = next.id(),
            label = next.context().label_or_default(),
            "value moved"
        );
        Ok(value)
    }

    /// Give up this wrapper.
    ///
    /// A reference only drops its registration; its storage stays in its
    /// container and `None` is returned. An owner with a `successor` moves
    /// its storage, live references and dependency edges there and comes
    /// back as the successor's new owner. An owner that will delete
    /// requires a successor. An owner that does not delete may go without
    /// one; its references are torn down and the storage stays behind.
    pub(crate) fn detach(
        &self,
        successor: Option<&Arc<ValueController<L>>>,
    ) -> Result<Option<Arc<Self>>> {
        let Some(next) = successor else {
            if self.will_delete() {
                warn!(node = %self.id, "owning value detached without a successor controller");
                return Err(ValueError::invalid(
                    "a successor controller is required to detach an owning value",
                ));
            }
            return self.access(false, |controller, state| {
                state.remove(self.id, Some(self.generation), false);
                *self.binding.write() = None;
                debug!(
                    node = %self.id,
                    kind = %self.kind,
                    from = controller.id(),
                    label = controller.context().label_or_default(),
                    "value detached"
                );
                Ok(None)
            });
        };
        if self.is_reference() {
            return self.detach(None);
        }

        let mut rebound = Rebound::new();
        let moved = self.access_pair(
            Counterpart::Controller(next),
            false,
            |_, state, _, next_state| {
                if next_state.has_owner() {
                    warn!(domain = next.id(), node = %self.id, "successor already has an owner");
                    return Err(ControllerError::DuplicateOwner.into());
                }
                let root = self
                    .hand_over(state, next, next_state, &mut rebound)?
                    .into_root()
                    .ok_or(ValueError::Detached)?;
                let id = next_state.insert_root(root);
                let object = Self::unbound(id, self.kind, self.mode, self.read_only);
                next_state.set_owner(id, &object)?;
                object.rebind(next);
                Ok(Some(object))
            },
        );
        drop(rebound);
        moved
    }

    /// Move an owner's tree out of its domain. Live references into it are
    /// torn down; use [`detach`](Self::detach) to keep them.
    pub(crate) fn extract(&self) -> Result<DetachedValue> {
        if self.is_reference() {
            return Err(ValueError::invalid(
                "only an owning value can hand out its storage",
            ));
        }
        self.access(false, |controller, state| {
            let value = state.extract(&self.entry())?;
            state.remove(self.id, Some(self.generation), false);
            *self.binding.write() = None;
            debug!(
                node = %self.id,
                kind = %self.kind,
                from = controller.id(),
                "value extracted"
            );
            Ok(value)
        })
    }

    /// Deep copy of the node with fresh identities.
    pub(crate) fn snapshot(&self) -> Result<DetachedValue> {
        self.access(false, |_, state| state.snapshot(&self.entry(), true))
    }
}

/// The second party of a two-controller operation.
enum Counterpart<'a, L: LockPolicy> {
    /// A controller that receives values.
    Controller(&'a Arc<ValueController<L>>),
    /// A wrapper whose controller gives values up.
    Value(&'a TrackedValue<L>),
}

impl<L: LockPolicy> Clone for Counterpart<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L: LockPolicy> Copy for Counterpart<'_, L> {}

impl<L: LockPolicy> TrackedValue<L> {
    // ═══════════════════════════════════════════════════════════════════
    // Helpers shared by the value kinds
    // ═══════════════════════════════════════════════════════════════════

    /// Own `root`, either in `controller` or in a fresh domain.
    pub(crate) fn root(
        root: RootValue,
        controller: Option<Arc<ValueController<L>>>,
        mode: OwnerMode,
        read_only: bool,
    ) -> Result<Arc<Self>> {
        match controller {
            Some(controller) => Self::adopt(root, controller, mode, read_only),
            None => Ok(Self::bootstrap(
                root,
                mode,
                read_only,
                ValueContext::default(),
            )),
        }
    }

    /// A deep copy that owns a fresh domain configured like this one.
    pub(crate) fn copy_root(&self, read_only: bool, exclude_empty_children: bool) -> Result<Arc<Self>> {
        let (mut value, context) = self.access(false, |controller, state| {
            Ok((
                state.snapshot(&self.entry(), true)?,
                controller.context().clone(),
            ))
        })?;
        if exclude_empty_children {
            value.prune_empty_children();
        }
        let root = value.into_root().ok_or(ValueError::Detached)?;
        Ok(Self::bootstrap(root, OwnerMode::WillDelete, read_only, context))
    }

    /// Deep content equality.
    pub(crate) fn is_equal(&self, other: &Self) -> Result<bool> {
        Ok(self.snapshot()? == other.snapshot()?)
    }

    /// JSON rendering limited by the controller's context.
    pub(crate) fn to_json(&self) -> Result<serde_json::Value> {
        let (value, context) = self.access(false, |controller, state| {
            Ok((
                state.snapshot(&self.entry(), false)?,
                controller.context().clone(),
            ))
        })?;
        value.to_json(&context)
    }

    /// Copy or move `source` into this container, then let `place` store
    /// the resulting entry.
    ///
    /// Anything that is not an owner that will delete is deep-copied
    /// before this container is locked, so no two domains alias the same
    /// storage. An owner that will delete is moved instead: its storage
    /// and live references join this container's domain.
    pub(crate) fn insert_with<R>(
        &self,
        source: &TrackedValue<L>,
        place: impl FnOnce(&mut ControllerState<L>, Entry) -> Result<R>,
    ) -> Result<R> {
        if !source.will_delete() {
            let value = source.snapshot()?;
            return self.access(true, |_, state| {
                let entry = state.insert_detached(value);
                store(state, self.id, entry, place)
            });
        }

        let mut rebound = Rebound::new();
        let result = self.access_pair(
            Counterpart::Value(source),
            true,
            |controller, state, _, source_state| {
                let value = source.hand_over(source_state, controller, state, &mut rebound)?;
                let entry = state.insert_detached(value);
                store(state, self.id, entry, place)
            },
        );
        drop(rebound);
        result
    }
}

/// Run `place`, tearing the new entry down again if it fails.
fn store<L: LockPolicy, R>(
    state: &mut ControllerState<L>,
    parent: NodeId,
    entry: Entry,
    place: impl FnOnce(&mut ControllerState<L>, Entry) -> Result<R>,
) -> Result<R> {
    match place(state, entry.clone()) {
        Ok(out) => Ok(out),
        Err(err) => {
            state.release(parent, entry);
            Err(err)
        }
    }
}

impl<L: LockPolicy> Drop for TrackedValue<L> {
    fn drop(&mut self) {
        self.delete();
    }
}

impl<L: LockPolicy> std::fmt::Debug for TrackedValue<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedValue")
            .field("node", &self.id)
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("read_only", &self.read_only)
            .field("domain", &self.controller().map(|c| c.id()))
            .finish()
    }
}
