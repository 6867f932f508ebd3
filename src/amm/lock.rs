//! Per-pool reentrancy protection.
//!
//! Every mutating pool entry point holds a [`LockGuard`] for its whole
//! duration. A flash borrower's callback runs while the guard is held, so any
//! attempt to re-enter the pool from inside the callback fails with
//! [`PoolError::Reentrant`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::error::PoolError;

/// The lock flag of one pool.
#[derive(Debug, Clone, Default)]
pub struct ReentrancyLock {
    /// Whether an operation is in progress
    locked: Arc<AtomicBool>,
}

impl ReentrancyLock {
    /// Creates an unlocked lock
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock, returning a guard that releases it on drop.
    ///
    /// # Errors
    /// Returns [`PoolError::Reentrant`] if the lock is already held
    pub fn acquire(&self) -> Result<LockGuard, PoolError> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| PoolError::Reentrant)?;
        Ok(LockGuard {
            locked: Arc::clone(&self.locked),
        })
    }

    /// Whether an operation currently holds the lock
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

/// Releases the pool lock when dropped, on success, error and unwind alike.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    /// The flag to clear on drop
    locked: Arc<AtomicBool>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_reentrant() {
        let lock = ReentrancyLock::new();
        let guard = lock.acquire().unwrap();
        assert!(lock.is_locked());
        assert_eq!(lock.acquire().err(), Some(PoolError::Reentrant));
        drop(guard);
        assert!(!lock.is_locked());
        assert!(lock.acquire().is_ok());
    }

    #[test]
    fn test_released_on_error_path() {
        fn failing(lock: &ReentrancyLock) -> Result<(), PoolError> {
            let _guard = lock.acquire()?;
            Err(PoolError::InvalidAmounts)
        }

        let lock = ReentrancyLock::new();
        assert_eq!(failing(&lock), Err(PoolError::InvalidAmounts));
        assert!(!lock.is_locked());
    }
}
