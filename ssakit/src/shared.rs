//! Shared ownership helpers for the IR graph.
//!
//! The graph is a tree of [crate::ir::Region]s, [crate::ir::Block]s, and
//! [crate::ir::Operation]s in which parents and children point at each other.
//! The tree edges are the only strong references ([Shared]); every back link
//! (parent pointers, use lists, successor references) is a [WeakShared] so
//! that dropping the root drops the whole graph.

use parking_lot::RwLock;
use parking_lot::RwLockReadGuard;
use parking_lot::RwLockWriteGuard;
use std::sync::Arc;
use std::sync::Weak;

/// A convenience type alias for [`Arc<RwLock<T>>`].
pub type Shared<T> = Arc<RwLock<T>>;

/// A non-owning reference to a [Shared] node.
pub type WeakShared<T> = Weak<RwLock<T>>;

/// Convenience accessors around [RwLock].
///
/// Rewriting is single-threaded and cooperative, so a lock that cannot be
/// taken immediately means a guard is still alive higher up the call stack.
/// Crashing there is preferable to hanging, hence `try_*` under the hood.
pub trait SharedExt<T: ?Sized> {
    /// Take a read guard, panicking if a writer is active.
    fn rd(&self) -> RwLockReadGuard<'_, T>;
    /// Take a write guard, panicking if any guard is active.
    fn wr(&self) -> RwLockWriteGuard<'_, T>;
}

impl<T: ?Sized> SharedExt<T> for Shared<T> {
    fn rd(&self) -> RwLockReadGuard<'_, T> {
        self.try_read().expect("read lock while a writer is active")
    }
    fn wr(&self) -> RwLockWriteGuard<'_, T> {
        self.try_write().expect("write lock while a guard is active")
    }
}

/// Downgrade a [Shared] node to a back link.
pub fn weak<T>(shared: &Shared<T>) -> WeakShared<T> {
    Arc::downgrade(shared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_and_write() {
        let lock = Shared::new(42.into());
        assert_eq!(*lock.rd(), 42);
        *lock.wr() += 1;
        assert_eq!(*lock.rd(), 43);
    }

    #[test]
    fn weak_upgrade() {
        let lock = Shared::new("x".to_string().into());
        let back = weak(&lock);
        assert!(back.upgrade().is_some());
        drop(lock);
        assert!(back.upgrade().is_none());
    }
}
