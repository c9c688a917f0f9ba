//! Locking policies for controller state
//!
//! A controller is generic over how its state is guarded. The policy is
//! picked at compile time:
//!
//! - [`ThreadSafe`] wraps the state in a real mutex, so any thread may
//!   touch the value tree and accesses are serialized.
//! - [`ThreadConfined`] wraps the state in a `RefCell` bound to the
//!   creating thread. Locking costs nothing, and the type is `!Sync`, so
//!   the compiler refuses to share it across threads.

use std::cell::{RefCell, RefMut};
use std::ops::{Deref, DerefMut};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, MutexGuard};

use super::ControllerState;

/// Strategy for guarding a controller's state.
pub trait LockPolicy: Sized + 'static {
    /// Guard returned by [`LockPolicy::lock`]; the lock is released on drop.
    type Guard<'a>: DerefMut<Target = ControllerState<Self>>
    where
        Self: 'a;

    /// Wrap freshly built state.
    fn wrap(state: ControllerState<Self>) -> Self;

    /// True if any thread may lock this policy.
    fn is_thread_safe(&self) -> bool;

    /// True if the calling thread is allowed to access the state.
    fn on_correct_thread(&self) -> bool;

    /// Acquire the lock.
    fn lock(&self) -> Self::Guard<'_>;

    /// True if the state is locked by the calling thread.
    fn locked(&self) -> bool;
}

// ═══════════════════════════════════════════════════════════════════
// Thread-safe policy
// ═══════════════════════════════════════════════════════════════════

/// Mutex-backed policy. Records the holding thread so `locked()` only
/// answers true for the thread that owns the lock.
pub struct ThreadSafe {
    state: Mutex<ControllerState<ThreadSafe>>,
    holder: Mutex<Option<ThreadId>>,
}

/// Guard for [`ThreadSafe`].
pub struct ThreadSafeGuard<'a> {
    guard: MutexGuard<'a, ControllerState<ThreadSafe>>,
    holder: &'a Mutex<Option<ThreadId>>,
}

impl LockPolicy for ThreadSafe {
    type Guard<'a> = ThreadSafeGuard<'a>;

    fn wrap(state: ControllerState<Self>) -> Self {
        Self {
            state: Mutex::new(state),
            holder: Mutex::new(None),
        }
    }

    fn is_thread_safe(&self) -> bool {
        true
    }

    fn on_correct_thread(&self) -> bool {
        true
    }

    fn lock(&self) -> Self::Guard<'_> {
        let guard = self.state.lock();
        *self.holder.lock() = Some(thread::current().id());
        ThreadSafeGuard {
            guard,
            holder: &self.holder,
        }
    }

    fn locked(&self) -> bool {
        *self.holder.lock() == Some(thread::current().id())
    }
}

impl Deref for ThreadSafeGuard<'_> {
    type Target = ControllerState<ThreadSafe>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for ThreadSafeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl Drop for ThreadSafeGuard<'_> {
    fn drop(&mut self) {
        // Runs before `guard` releases the state mutex.
        *self.holder.lock() = None;
    }
}

// ═══════════════════════════════════════════════════════════════════
// Thread-confined policy
// ═══════════════════════════════════════════════════════════════════

/// Single-thread policy. No real lock; access is only valid on the thread
/// that built the controller.
pub struct ThreadConfined {
    state: RefCell<ControllerState<ThreadConfined>>,
    thread: ThreadId,
}

impl LockPolicy for ThreadConfined {
    type Guard<'a> = RefMut<'a, ControllerState<ThreadConfined>>;

    fn wrap(state: ControllerState<Self>) -> Self {
        Self {
            state: RefCell::new(state),
            thread: thread::current().id(),
        }
    }

    fn is_thread_safe(&self) -> bool {
        false
    }

    fn on_correct_thread(&self) -> bool {
        self.thread == thread::current().id()
    }

    fn lock(&self) -> Self::Guard<'_> {
        self.state.borrow_mut()
    }

    fn locked(&self) -> bool {
        self.on_correct_thread()
    }
}
