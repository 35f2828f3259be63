//! Process-wide open-handle registries.
//!
//! Each serial port name or socket address has at most one owner. A
//! transport that opens a key already held by another transport first
//! closes the other transport's handle. Handles live in a shared
//! [`HandleSlot`]; the registry only keeps weak references to the slots, so
//! a dropped transport never keeps its handle alive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// A transport's live handle, or `None` while disconnected.
pub(crate) type HandleSlot<H> = Arc<Mutex<Option<H>>>;

pub(crate) fn new_slot<H>() -> HandleSlot<H> {
    Arc::new(Mutex::new(None))
}

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct HandleRegistry<H> {
    kind: &'static str,
    owners: Mutex<HashMap<String, Weak<Mutex<Option<H>>>>>,
}

impl<H> HandleRegistry<H> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            owners: Mutex::new(HashMap::new()),
        }
    }

    /// Makes `slot` the owner of `key`, closing the previous owner's handle.
    ///
    /// Call before opening the new handle so the old one is released first.
    pub(crate) fn claim(&self, key: &str, slot: &HandleSlot<H>) {
        let previous = lock(&self.owners).insert(key.to_string(), Arc::downgrade(slot));
        let Some(previous) = previous.and_then(|weak| weak.upgrade()) else {
            return;
        };
        if Arc::ptr_eq(&previous, slot) {
            return;
        }
        if lock(&previous).take().is_some() {
            tracing::debug!(kind = self.kind, key, "closed previous owner");
        }
    }

    /// Drops the entry for `key` if `slot` still owns it.
    pub(crate) fn release(&self, key: &str, slot: &HandleSlot<H>) {
        let mut owners = lock(&self.owners);
        let owned = owners
            .get(key)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(slot)));
        if owned {
            owners.remove(key);
        }
    }

    /// Keys whose owner is still alive, sorted.
    pub(crate) fn keys(&self) -> Vec<String> {
        let mut owners = lock(&self.owners);
        owners.retain(|_, weak| weak.strong_count() > 0);
        let mut keys: Vec<String> = owners.keys().cloned().collect();
        keys.sort();
        keys
    }
}
