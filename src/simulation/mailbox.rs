//! Single-slot mailbox pacing the step rate to the sensor frame rate
//!
//! At most one item is pending. A producer that finds the slot full has its
//! item dropped, and the producer is never blocked. The consumer's `take`
//! blocks with no timeout until an item arrives.
//!
//! The unbounded wait means a sensor that stops publishing stalls the
//! consumer forever.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Slot<T> {
    item: Mutex<Option<T>>,
    filled: Condvar,
}

/// Cloneable handle to a shared single-item slot
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Slot {
                item: Mutex::new(None),
                filled: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.item.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offer an item without blocking. Returns `false` and drops the item
    /// when one is already pending.
    pub fn put_latest(&self, item: T) -> bool {
        let mut slot = self.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(item);
        self.slot.filled.notify_one();
        true
    }

    /// Block until an item is available and take it
    pub fn take(&self) -> T {
        let mut slot = self.lock();
        loop {
            if let Some(item) = slot.take() {
                return item;
            }
            slot = self
                .slot
                .filled
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn try_take(&self) -> Option<T> {
        self.lock().take()
    }

    /// Discard any pending item
    pub fn drain(&self) -> bool {
        self.try_take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }
}
