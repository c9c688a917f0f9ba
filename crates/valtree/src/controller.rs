//! Ownership domains: liveness, ownership and dependency bookkeeping

mod arena;
mod lock;

pub use lock::{LockPolicy, ThreadConfined, ThreadSafe, ThreadSafeGuard};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, trace, warn};

use crate::context::ValueContext;
use crate::error::{ControllerError, Result, ValueError};
use crate::value::{Node, NodeId, TrackedValue};

static NEXT_DOMAIN_ID: AtomicU64 = AtomicU64::new(1);

/// The authority for one ownership domain.
///
/// A controller knows which node is the owner of its domain, which wrappers
/// are live references into it and which containers those references hang
/// off. It also stores the nodes themselves, so it doubles as the arena for
/// the domain's value tree.
///
/// # Example
///
/// ```
/// use valtree::{DictionaryValue, ValueType};
///
/// let root = DictionaryValue::create();
/// root.set_int("a", 5).unwrap();
///
/// let controller = root.controller().unwrap();
/// assert!(controller.has_owner().unwrap());
/// assert_eq!(root.get_type("a").unwrap(), ValueType::Int);
/// ```
pub struct ValueController<L: LockPolicy = ThreadSafe> {
    id: u64,
    context: ValueContext,
    lock: L,
}

impl ValueController<ThreadSafe> {
    /// Create a thread-safe controller with default settings.
    pub fn new() -> Arc<Self> {
        Self::create()
    }
}

impl<L: LockPolicy> ValueController<L> {
    /// Create a controller with default settings.
    pub fn create() -> Arc<Self> {
        Self::with_context(ValueContext::default())
    }

    /// Create a controller with explicit settings.
    pub fn with_context(context: ValueContext) -> Arc<Self> {
        Self::from_state(ControllerState::new(Self::next_id()), context)
    }

    pub(crate) fn from_state(state: ControllerState<L>, context: ValueContext) -> Arc<Self> {
        Arc::new(Self {
            id: state.domain,
            context,
            lock: L::wrap(state),
        })
    }

    pub(crate) fn next_id() -> u64 {
        NEXT_DOMAIN_ID.fetch_add(1, Ordering::Relaxed)
    }

    /// Process-unique id of this domain.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The settings this controller was built with.
    pub fn context(&self) -> &ValueContext {
        &self.context
    }

    /// True if any thread may access this domain.
    pub fn is_thread_safe(&self) -> bool {
        self.lock.is_thread_safe()
    }

    /// True if the calling thread may access this domain.
    pub fn on_correct_thread(&self) -> bool {
        self.lock.on_correct_thread()
    }

    /// True if the calling thread currently holds the lock.
    pub fn locked(&self) -> bool {
        self.lock.locked()
    }

    /// Verify the thread and acquire the lock.
    pub(crate) fn lock(&self) -> Result<L::Guard<'_>> {
        if !self.is_thread_safe() && !self.on_correct_thread() {
            warn!(
                domain = self.id,
                label = self.context.label_or_default(),
                "controller accessed from incorrect thread"
            );
            return Err(ValueError::ThreadViolation);
        }
        Ok(self.lock.lock())
    }

    /// Lock this controller and `other` in domain id order. The guards
    /// come back in argument order.
    pub(crate) fn lock_pair<'a>(&'a self, other: &'a Self) -> Result<(L::Guard<'a>, L::Guard<'a>)> {
        if self.id == other.id {
            return Err(ValueError::invalid("a controller cannot be locked twice"));
        }
        if self.id < other.id {
            let first = self.lock()?;
            let second = other.lock()?;
            Ok((first, second))
        } else {
            let second = other.lock()?;
            let first = self.lock()?;
            Ok((first, second))
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Introspection
    // ═══════════════════════════════════════════════════════════════════

    /// True if an owner is registered.
    pub fn has_owner(&self) -> Result<bool> {
        Ok(self.lock()?.has_owner())
    }

    /// Number of registered reference wrappers.
    pub fn reference_count(&self) -> Result<usize> {
        Ok(self.lock()?.references.len())
    }

    /// Number of parent nodes with recorded dependency edges.
    pub fn dependency_count(&self) -> Result<usize> {
        Ok(self.lock()?.dependencies.len())
    }

    /// Number of nodes stored in this domain.
    pub fn node_count(&self) -> Result<usize> {
        Ok(self.lock()?.nodes.len())
    }

    /// True when no owner, references, dependencies or nodes remain.
    pub fn is_empty(&self) -> Result<bool> {
        let state = self.lock()?;
        Ok(state.owner.is_none()
            && state.references.is_empty()
            && state.dependencies.is_empty()
            && state.nodes.is_empty())
    }
}

impl<L: LockPolicy> fmt::Debug for ValueController<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueController")
            .field("id", &self.id)
            .field("thread_safe", &self.is_thread_safe())
            .field("label", &self.context.label)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════
// Controller state
// ═══════════════════════════════════════════════════════════════════

/// A registered wrapper. The generation tells apart two wrappers that were
/// created for the same node at different times.
pub(crate) struct Registration<L: LockPolicy> {
    generation: u64,
    object: Weak<TrackedValue<L>>,
}

impl<L: LockPolicy> Registration<L> {
    fn new(object: &Arc<TrackedValue<L>>) -> Self {
        Self {
            generation: object.generation(),
            object: Arc::downgrade(object),
        }
    }

    fn is_live(&self) -> bool {
        self.object.strong_count() > 0
    }

    fn matches(&self, generation: Option<u64>) -> bool {
        generation.map_or(true, |g| g == self.generation)
    }

    /// Invalidate the wrapper, if it is still alive.
    fn notify(&self) {
        if let Some(object) = self.object.upgrade() {
            // The binding is cleared first, so dropping `object` here can
            // never re-enter the controller.
            object.on_control_removed();
        }
    }
}

/// The lock-protected state of a [`ValueController`].
///
/// Every method assumes the caller holds the controller's lock, which is
/// the only way to reach this type.
pub struct ControllerState<L: LockPolicy> {
    domain: u64,
    owner: Option<(NodeId, Registration<L>)>,
    references: HashMap<NodeId, Registration<L>>,
    dependencies: HashMap<NodeId, HashSet<NodeId>>,
    pub(crate) nodes: HashMap<NodeId, Node>,
}

impl<L: LockPolicy> ControllerState<L> {
    pub(crate) fn new(domain: u64) -> Self {
        Self {
            domain,
            owner: None,
            references: HashMap::new(),
            dependencies: HashMap::new(),
            nodes: HashMap::new(),
        }
    }

    /// Register the unique owner of this domain.
    pub(crate) fn set_owner(
        &mut self,
        value: NodeId,
        object: &Arc<TrackedValue<L>>,
    ) -> std::result::Result<(), ControllerError> {
        if self.owner.is_some() {
            warn!(domain = self.domain, node = %value, "controller already has an owner");
            return Err(ControllerError::DuplicateOwner);
        }
        self.owner = Some((value, Registration::new(object)));
        Ok(())
    }

    /// Register a non-owning wrapper.
    pub(crate) fn add_reference(
        &mut self,
        value: NodeId,
        object: &Arc<TrackedValue<L>>,
    ) -> std::result::Result<(), ControllerError> {
        match &self.owner {
            None => {
                warn!(domain = self.domain, node = %value, "reference added without owner");
                return Err(ControllerError::MissingOwner);
            }
            Some((owner, _)) if *owner == value => {
                return Err(ControllerError::OwnerAsReference);
            }
            Some(_) => {}
        }
        if let Some(existing) = self.references.get(&value) {
            // A wrapper that is mid-drop may still be listed; replacing it is
            // safe because its removal is keyed by generation.
            if existing.is_live() {
                return Err(ControllerError::AlreadyRegistered(value.get()));
            }
        }
        trace!(domain = self.domain, node = %value, "reference added");
        self.references.insert(value, Registration::new(object));
        Ok(())
    }

    /// Remove a registration.
    ///
    /// Removing the owner tears down the whole domain: every reference is
    /// notified and every dependency edge is dropped. Removing a reference
    /// only drops that entry, notifying it if `notify` is set. When
    /// `generation` is given, only a registration from that wrapper matches.
    pub(crate) fn remove(&mut self, value: NodeId, generation: Option<u64>, notify: bool) {
        let is_owner = matches!(
            &self.owner,
            Some((owner, reg)) if *owner == value && reg.matches(generation)
        );
        if is_owner {
            self.owner = None;
            trace!(
                domain = self.domain,
                node = %value,
                references = self.references.len(),
                "owner removed"
            );
            for (_, reg) in self.references.drain() {
                reg.notify();
            }
            self.dependencies.clear();
            return;
        }

        let matches = self
            .references
            .get(&value)
            .is_some_and(|reg| reg.matches(generation));
        if matches {
            if let Some(reg) = self.references.remove(&value) {
                if notify {
                    reg.notify();
                }
            }
        }
    }

    /// True if an owner is registered.
    pub(crate) fn has_owner(&self) -> bool {
        self.owner.is_some()
    }

    /// The live wrapper registered for `value`, if any.
    pub(crate) fn get(&self, value: NodeId) -> Option<Arc<TrackedValue<L>>> {
        if let Some((owner, reg)) = &self.owner {
            if *owner == value {
                return reg.object.upgrade();
            }
        }
        self.references.get(&value).and_then(|reg| reg.object.upgrade())
    }

    /// True if `generation` is the current registration for `value`.
    pub(crate) fn is_registered(&self, value: NodeId, generation: u64) -> bool {
        if let Some((owner, reg)) = &self.owner {
            if *owner == value {
                return reg.generation == generation;
            }
        }
        self.references
            .get(&value)
            .is_some_and(|reg| reg.generation == generation)
    }

    /// Record that tearing down `parent` must also tear down `child`.
    pub(crate) fn add_dependency(&mut self, parent: NodeId, child: NodeId) {
        self.dependencies.entry(parent).or_default().insert(child);
    }

    /// Forget a single edge, dropping the parent's set once empty.
    pub(crate) fn prune_dependency(&mut self, parent: NodeId, child: NodeId) {
        if let Some(children) = self.dependencies.get_mut(&parent) {
            children.remove(&child);
            if children.is_empty() {
                self.dependencies.remove(&parent);
            }
        }
    }

    /// Tear down everything reachable from `value` through dependency
    /// edges: each descendant with a live wrapper is notified and removed,
    /// and the edges themselves are purged. `value`'s own registration is
    /// left alone.
    pub(crate) fn remove_dependencies(&mut self, value: NodeId) {
        let owner = self.owner.as_ref().map(|(id, _)| *id);
        let mut pending = vec![value];
        let mut removed = 0usize;
        while let Some(current) = pending.pop() {
            let Some(children) = self.dependencies.remove(&current) else {
                continue;
            };
            for child in children {
                if Some(child) == owner {
                    continue;
                }
                if self.references.contains_key(&child) {
                    removed += 1;
                }
                self.remove(child, None, true);
                pending.push(child);
            }
        }
        if removed > 0 {
            trace!(domain = self.domain, node = %value, removed, "dependencies removed");
        }
    }

    /// Move every reference and dependency edge out of `other` into this
    /// state, rebinding the moved wrappers to `controller` (which must be
    /// the controller guarding `self`). `other` is left with empty maps.
    ///
    /// The returned wrappers must be dropped only after both locks are
    /// released.
    #[must_use = "rebound wrappers must outlive the held locks"]
    pub(crate) fn take_from(
        &mut self,
        other: &mut ControllerState<L>,
        controller: &Arc<ValueController<L>>,
    ) -> Vec<Arc<TrackedValue<L>>> {
        let mut rebound = Vec::with_capacity(other.references.len());
        for (value, reg) in other.references.drain() {
            if let Some(object) = reg.object.upgrade() {
                object.rebind(controller);
                rebound.push(object);
                self.references.insert(value, reg);
            }
        }
        for (parent, children) in other.dependencies.drain() {
            self.dependencies.entry(parent).or_default().extend(children);
        }
        debug!(
            from = other.domain,
            to = self.domain,
            references = rebound.len(),
            "references transferred"
        );
        rebound
    }

    pub(crate) fn domain(&self) -> u64 {
        self.domain
    }
}
