//! Lock helpers.
//!
//! Lock order across the engine: registry maps -> task -> workers (ascending id)
//! -> allocation book. Never take a registry map lock while holding a task or
//! worker lock.
//!
//! Poisoned locks are recovered: every critical section validates before it
//! writes, so a panic never leaves a record half-updated.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
