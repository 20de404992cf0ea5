// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scheduling gate behind the critical section.
//!
//! Guest threads execute on parallel host threads, one simulated core
//! each, so selection reduces to: a thread is selected exactly while its
//! schedule state is Running. Transitions recorded under the critical
//! section are staged here and the affected wake gates are flipped only
//! once the inner lock has been dropped; threads outside the scheduler's
//! control have their gates flipped directly at the transition.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::thread::{current_thread, KThread};

/// Hook invoked by the critical section on its outermost release.
pub trait SchedulerGate: Send + Sync {
    /// Computes the set of cores whose selected thread changed. Called
    /// with the critical section's inner lock still held.
    fn select_threads(&self) -> u64;

    /// Applies the selection on behalf of a scheduled guest thread; the
    /// caller yields its core until it is selected again.
    fn enable_scheduling(&self, scheduled_cores_mask: u64);

    /// Applies the selection on behalf of a host thread the scheduler
    /// does not drive (service threads, the time-manager worker).
    fn enable_scheduling_from_foreign_thread(&self, scheduled_cores_mask: u64);
}

/// Cooperative scheduler for HLE guest threads.
pub struct HleScheduler {
    pending: Mutex<Vec<Arc<KThread>>>,
    staged: Mutex<Vec<Arc<KThread>>>,
}

impl HleScheduler {
    /// Creates a scheduler with no tracked transitions.
    pub fn new() -> Self {
        Self { pending: Mutex::new(Vec::new()), staged: Mutex::new(Vec::new()) }
    }

    /// Records a run-state transition for a schedulable thread. The caller
    /// holds the critical section.
    pub(crate) fn note_transition(&self, thread: &Arc<KThread>) {
        self.pending.lock().push(Arc::clone(thread));
    }

    /// Flips the wake gates of every staged thread to match its current
    /// run state. Transition order does not matter: the gate always
    /// follows the state the thread holds now.
    fn apply_staged(&self) {
        let staged: Vec<_> = std::mem::take(&mut *self.staged.lock());
        for thread in staged {
            thread.apply_wake_state();
        }
    }
}

impl Default for HleScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerGate for HleScheduler {
    fn select_threads(&self) -> u64 {
        let mut pending = self.pending.lock();
        let mut staged = self.staged.lock();
        let mut mask = 0u64;
        for thread in pending.drain(..) {
            mask |= 1u64 << thread.core();
            staged.push(thread);
        }
        mask
    }

    fn enable_scheduling(&self, _scheduled_cores_mask: u64) {
        self.apply_staged();
        if let Some(current) = current_thread() {
            if current.host_context_running() {
                current.wait_until_selected();
            }
        }
    }

    fn enable_scheduling_from_foreign_thread(&self, _scheduled_cores_mask: u64) {
        self.apply_staged();
    }
}
