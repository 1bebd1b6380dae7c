//! Intrusive ownership counter stored inside every node block.

use std::{
    fmt,
    process,
    sync::atomic::{self, AtomicUsize, Ordering},
};

/// Counts above this are treated as a leak of handles and abort the process
/// before the counter can wrap around.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// An atomic count of the owners of a node.
///
/// A fresh counter starts at one: whoever creates the node is its first
/// owner. The counter itself never frees anything; the owner that observes
/// [`RefCount::decrement`] return `true` is responsible for destroying the
/// node exactly once.
///
/// Increments use relaxed ordering, since a new owner can only be created
/// from an existing one. Decrements use release ordering, and the final
/// decrement is followed by an acquire fence so that the destroying thread
/// sees every access made through the other owners.
pub struct RefCount(AtomicUsize);

impl RefCount {
    /// Create a counter with a single owner.
    pub const fn new() -> Self {
        RefCount(AtomicUsize::new(1))
    }

    /// Register one more owner.
    ///
    /// # Aborts
    ///  - Aborts the process if the count would exceed `isize::MAX`.
    #[inline]
    pub fn increment(&self) {
        let old = self.0.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            process::abort();
        }
    }

    /// Release one owner, returning `true` if it was the last one.
    ///
    /// # Aborts
    ///  - Aborts the process if the count was already zero. That can only
    ///    happen after a double release, and continuing would mean freeing a
    ///    node twice.
    #[inline]
    #[must_use = "the last owner must destroy the node"]
    pub fn decrement(&self) -> bool {
        let old = self.0.fetch_sub(1, Ordering::Release);
        if old == 0 {
            process::abort();
        }
        if old != 1 {
            return false;
        }

        atomic::fence(Ordering::Acquire);
        true
    }

    /// Current number of owners.
    #[inline]
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    /// Returns `true` if there is exactly one owner.
    ///
    /// The acquire load pairs with the release decrement of any owner that
    /// has since been dropped, so the remaining owner may take exclusive
    /// access afterwards.
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.get() == 1
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefCount").field(&self.get()).finish()
    }
}
