// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Process-wide recursive gate whose outermost release is the scheduling
//! point.
//!
//! The inner lock is reentrant on its own; the critical section counts
//! enter/leave pairs separately so that code holding the raw lock (the
//! time-manager worker guarding its list) can still nest a full
//! enter/leave and have the leave run the scheduling pass.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

use crate::sched::SchedulerGate;
use crate::thread::current_thread;

struct LockState {
    owner: Option<ThreadId>,
    depth: u32,
}

/// Reentrant host mutex with explicit acquire/release, so a lock section
/// can span function boundaries.
pub struct RecursiveLock {
    state: Mutex<LockState>,
    available: Condvar,
}

impl RecursiveLock {
    /// Creates an unowned lock.
    pub fn new() -> Self {
        Self { state: Mutex::new(LockState { owner: None, depth: 0 }), available: Condvar::new() }
    }

    /// Acquires the lock, recursing when the caller already owns it.
    pub fn acquire(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    return;
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    return;
                }
                Some(_) => self.available.wait(&mut state),
            }
        }
    }

    /// Releases one acquisition level.
    pub fn release(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        assert_eq!(state.owner, Some(me), "recursive lock released by a non-owner");
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.available.notify_one();
        }
    }

    /// Runs `f` with the lock held.
    pub fn lock<R>(&self, f: impl FnOnce() -> R) -> R {
        self.acquire();
        let result = f();
        self.release();
        result
    }
}

impl Default for RecursiveLock {
    fn default() -> Self {
        Self::new()
    }
}

/// The kernel's global critical section.
///
/// Inside it the world is effectively single-threaded. The recursion depth
/// is mutated only by the holding host thread; `leave` at depth one runs
/// the scheduler selection under the lock, drops the lock, then applies
/// the selection, possibly parking the calling host thread on its wake
/// event.
pub struct CriticalSection {
    lock: RecursiveLock,
    recursion_count: AtomicU32,
    scheduler: Arc<dyn SchedulerGate>,
}

impl CriticalSection {
    /// Creates the section around the injected scheduler hook.
    pub fn new(scheduler: Arc<dyn SchedulerGate>) -> Self {
        Self { lock: RecursiveLock::new(), recursion_count: AtomicU32::new(0), scheduler }
    }

    /// Enters the critical section, recursively if already held.
    pub fn enter(&self) {
        self.lock.acquire();
        self.recursion_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Leaves the critical section; the outermost leave reschedules.
    pub fn leave(&self) {
        if self.recursion_count.load(Ordering::Relaxed) == 0 {
            return;
        }
        if self.recursion_count.fetch_sub(1, Ordering::Relaxed) != 1 {
            self.lock.release();
            return;
        }

        let scheduled_cores_mask = self.scheduler.select_threads();
        self.lock.release();

        let current = current_thread();
        let current_schedulable = current.as_ref().is_some_and(|thread| thread.is_schedulable());
        if current_schedulable {
            self.scheduler.enable_scheduling(scheduled_cores_mask);
        } else {
            self.scheduler.enable_scheduling_from_foreign_thread(scheduled_cores_mask);
            if let Some(thread) = current {
                if !thread.is_schedulable() && thread.host_context_running() {
                    thread.wait_until_selected();
                }
            }
        }
    }

    /// The inner lock, for guarding shared lists without entering the
    /// scheduling path.
    pub fn inner_lock(&self) -> &RecursiveLock {
        &self.lock
    }
}
