//! Sequence-guarded value cell shared by the sync components.
//!
//! Each request reserves a sequence number before it is issued; its result
//! is applied only if nothing issued later has been applied first.

use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Versioned<T> {
    value: T,
    issued: u64,
    applied: u64,
}

#[derive(Debug)]
pub(crate) struct Slot<T> {
    inner: Mutex<Versioned<T>>,
}

impl<T> Slot<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Versioned {
                value,
                issued: 0,
                applied: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Versioned<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve the sequence number of a request about to be issued.
    pub(crate) fn issue(&self) -> u64 {
        let mut inner = self.lock();
        inner.issued += 1;
        inner.issued
    }

    /// Store `value` unless a response issued later was already applied.
    pub(crate) fn apply(&self, seq: u64, value: T) -> bool {
        let mut inner = self.lock();
        if seq <= inner.applied {
            return false;
        }
        inner.applied = seq;
        inner.value = value;
        true
    }

    /// Like [`Slot::apply`], letting `merge` carry local state from the held
    /// value into `value` first.
    pub(crate) fn apply_merged(
        &self,
        seq: u64,
        mut value: T,
        merge: impl FnOnce(&T, &mut T),
    ) -> bool {
        let mut inner = self.lock();
        if seq <= inner.applied {
            return false;
        }
        merge(&inner.value, &mut value);
        inner.applied = seq;
        inner.value = value;
        true
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock().value)
    }

    /// Local edit that does not consume a sequence number.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock().value)
    }

    /// Local edit that wins over every request issued before it.
    pub(crate) fn supersede<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut inner = self.lock();
        inner.issued += 1;
        inner.applied = inner.issued;
        f(&mut inner.value)
    }
}

impl<T: Clone> Slot<T> {
    pub(crate) fn get(&self) -> T {
        self.lock().value.clone()
    }
}
