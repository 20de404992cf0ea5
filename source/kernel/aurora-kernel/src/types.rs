// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Result codes and handle bookkeeping shared across the core.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::sync::KSynchronizationObject;

/// Result codes surfaced by guest-kernel operations.
///
/// These are routine guest-visible outcomes, not host failures: the guest
/// observes them as syscall return codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum KernelError {
    /// A wait deadline elapsed before any object was signaled.
    #[error("the wait deadline elapsed")]
    TimedOut,
    /// The thread's synchronization-cancel flag was observed.
    #[error("the wait was cancelled")]
    Cancelled,
    /// The waiting thread has a pending termination request.
    #[error("the waiting thread is terminating")]
    ThreadTerminating,
    /// Every tier of the page heap came back empty.
    #[error("out of memory")]
    OutOfMemory,
    /// The caller passed an argument the core cannot act on.
    #[error("invalid argument")]
    InvalidArgument,
}

/// Result alias carrying a [`KernelError`] code.
pub type KResult<T = ()> = Result<T, KernelError>;

/// Opaque identifier for a kernel object in a process handle table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    /// Raw wire value of the handle.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Slot-reusing table mapping handles to synchronization objects.
///
/// Guarded by its own lock, never by the critical section.
pub struct HandleTable {
    slots: Mutex<Vec<Option<Arc<dyn KSynchronizationObject>>>>,
}

impl HandleTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self { slots: Mutex::new(Vec::new()) }
    }

    /// Registers an object and returns its handle. Freed slots are reused.
    pub fn insert(&self, object: Arc<dyn KSynchronizationObject>) -> Handle {
        let mut slots = self.slots.lock();
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(object);
                return Handle(index as u32 + 1);
            }
        }
        slots.push(Some(object));
        Handle(slots.len() as u32)
    }

    /// Resolves a handle to its object.
    pub fn get(&self, handle: Handle) -> Option<Arc<dyn KSynchronizationObject>> {
        let index = handle.0.checked_sub(1)? as usize;
        self.slots.lock().get(index).and_then(|slot| slot.clone())
    }

    /// Removes a handle, returning the object it referenced.
    pub fn remove(&self, handle: Handle) -> Option<Arc<dyn KSynchronizationObject>> {
        let index = handle.0.checked_sub(1)? as usize;
        self.slots.lock().get_mut(index).and_then(|slot| slot.take())
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
