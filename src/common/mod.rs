pub mod traits;
pub mod types;

pub use traits::{BalanceStore, HistoryRecorder};
pub use types::{Amount, GameHistoryRecord, LedgerEntry, Multiplier, TransactionKind, User};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if a previous holder panicked.
/// Room and store state stays structurally valid across a panic, so one
/// failed tick must not wedge the room forever.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
