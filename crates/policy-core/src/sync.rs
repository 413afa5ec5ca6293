//! Lock helpers.

use std::sync::{Mutex, MutexGuard};

/// Extension trait for `Mutex` that recovers from poisoning.
pub trait IgnoreLock<T> {
    /// Locks the mutex, taking the guard out of a poison error if a holder panicked.
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T>;
}

impl<T> IgnoreLock<T> for Mutex<T> {
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T> {
        match self.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
