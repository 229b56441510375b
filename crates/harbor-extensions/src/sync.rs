use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a table, recovering the data if a previous holder panicked.
/// Host tables stay usable after a failed call.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
