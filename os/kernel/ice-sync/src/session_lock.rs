use core::{
    cell::UnsafeCell,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};

/// Process-wide "a session is active" flag with the session-owned state behind it.
pub struct SessionLock<T> {
    /// * `false`: the monitored image is executing
    /// * `true`: a session owns `inner`
    active: AtomicBool,
    inner: UnsafeCell<T>,
}

// Safety: mutual exclusion; only T: Send may cross CPUs.
unsafe impl<T: Send> Sync for SessionLock<T> {}

impl<T> SessionLock<T> {
    pub const fn new(inner: T) -> Self {
        Self {
            active: AtomicBool::new(false),
            inner: UnsafeCell::new(inner),
        }
    }

    /// Single compare-and-swap. `None` means another context owns the session.
    #[inline]
    pub fn try_enter(&self) -> Option<SessionGuard<'_, T>> {
        if self
            .active
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SessionGuard { lock: self })
        } else {
            None
        }
    }

    /// Whether a session currently holds the guard.
    ///
    /// Only a snapshot; the trap path uses it to pick the in-session branch
    /// when it interrupted the debugger itself.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mutable access when you have `&mut self` (no contention possible).
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

pub struct SessionGuard<'a, T> {
    lock: &'a SessionLock<T>,
}

impl<T> Deref for SessionGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.inner.get() }
    }
}

impl<T> DerefMut for SessionGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.inner.get() }
    }
}

impl<T> Drop for SessionGuard<'_, T> {
    fn drop(&mut self) {
        // Release publishes everything the session wrote.
        self.lock.active.store(false, Ordering::Release);
    }
}
