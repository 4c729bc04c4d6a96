//! Poison-tolerant shard locking.
//!
//! A panic while a shard is held can at worst leave one stale entry behind,
//! so the guard is recovered and the event is logged rather than propagated.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn rw_read<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| recover(poisoned, op, "read"))
}

pub(crate) fn rw_write<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    lock.write()
        .unwrap_or_else(|poisoned| recover(poisoned, op, "write"))
}

fn recover<G>(poisoned: PoisonError<G>, op: &'static str, mode: &'static str) -> G {
    warn!(
        cache = "response",
        op,
        lock_kind = mode,
        result = "poisoned_recovered",
        "recovered poisoned cache shard lock"
    );
    poisoned.into_inner()
}
