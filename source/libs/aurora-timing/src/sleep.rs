// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deadline-capable sleep primitive and the per-thread wake gate.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::convert::host_ticks_to_milliseconds;
use crate::counter::PerformanceCounter;

/// Deadline sleep primitive used by the time manager.
///
/// `sleep_until` returns `true` when the primitive handled the wait on its
/// own; `false` tells the caller to finish with a spin-wait. `signal` is
/// level-triggered: it is remembered until the next sleep consumes it.
pub trait PreciseSleepEvent: Send + Sync {
    /// Sleeps until `deadline_ticks` or until signaled.
    fn sleep_until(&self, deadline_ticks: i64) -> bool;

    /// Blocks until [`signal`](Self::signal) is called.
    fn sleep(&self);

    /// Wakes the sleeper, or marks the event so the next sleep returns.
    fn signal(&self);

    /// Lets the primitive round a deadline to its own granularity.
    fn adjust_time_point(&self, deadline_ticks: i64, _timeout_ns: i64) -> i64 {
        deadline_ticks
    }
}

/// Creates the portable sleep primitive for this host.
pub fn create_sleep_event() -> Box<dyn PreciseSleepEvent> {
    Box::new(SleepEvent::new())
}

/// Portable [`PreciseSleepEvent`] over a condition variable.
///
/// Whole milliseconds are slept on the condvar; with less than a millisecond
/// remaining the caller is told to spin instead.
pub struct SleepEvent {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl SleepEvent {
    /// Creates an unsignaled event.
    pub fn new() -> Self {
        Self { signaled: Mutex::new(false), cond: Condvar::new() }
    }
}

impl Default for SleepEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl PreciseSleepEvent for SleepEvent {
    fn sleep_until(&self, deadline_ticks: i64) -> bool {
        let now = PerformanceCounter::elapsed_ticks();
        let ms = host_ticks_to_milliseconds(deadline_ticks.saturating_sub(now));
        if ms > 0 {
            let mut signaled = self.signaled.lock();
            if !*signaled {
                let _ = self.cond.wait_for(&mut signaled, Duration::from_millis(ms as u64));
            }
            *signaled = false;
            true
        } else {
            false
        }
    }

    fn sleep(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.cond.wait(&mut signaled);
        }
        *signaled = false;
    }

    fn signal(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.cond.notify_one();
    }
}

/// Per-thread parking gate driven by the scheduler.
///
/// The gate is open while its thread is selected to run: `wait` passes
/// immediately, no matter how often it is called. `signal` opens the gate and
/// is remembered while nobody waits, so a wakeup that races the park is never
/// lost; `reset` closes it again when the thread is descheduled.
pub struct WakeEvent {
    open: Mutex<bool>,
    cond: Condvar,
}

impl WakeEvent {
    /// Creates a gate in the given state.
    pub fn new(initially_open: bool) -> Self {
        Self { open: Mutex::new(initially_open), cond: Condvar::new() }
    }

    /// Blocks the caller until the gate is open.
    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
    }

    /// Opens the gate and wakes any parked thread.
    pub fn signal(&self) {
        let mut open = self.open.lock();
        *open = true;
        self.cond.notify_all();
    }

    /// Closes the gate; subsequent waits park until the next signal.
    pub fn reset(&self) {
        *self.open.lock() = false;
    }
}
