// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Orders future wake-ups on the host's monotonic clock.
//!
//! One worker host thread sleeps toward the earliest pending deadline with
//! the precise-sleep primitive and finishes sub-millisecond tails with a
//! spin-wait. The entry list is guarded by the critical section's inner
//! lock; `time_up` callbacks therefore run with that lock held and nest
//! their own enter/leave inside it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::debug;
use parking_lot::Mutex;

use aurora_timing::{
    create_sleep_event, nanoseconds_to_host_ticks, PerformanceCounter, PreciseSleepEvent,
};

use crate::sync::critical_section::CriticalSection;

/// Object whose wait deadline is driven by the time manager.
pub trait FutureScheduledObject: Send + Sync {
    /// Invoked once the deadline has passed, under the inner lock.
    fn time_up(&self);
}

/// Schedules below this timeout force waiting spinners to re-evaluate.
const SPIN_WAIT_THRESHOLD_NS: i64 = 1_000_000;

struct WaitingObject {
    object: Arc<dyn FutureScheduledObject>,
    time_point: i64,
}

struct TimeManagerInner {
    critical_section: Arc<CriticalSection>,
    waiting_objects: Mutex<Vec<WaitingObject>>,
    sleep_event: Box<dyn PreciseSleepEvent>,
    keep_running: AtomicBool,
    enforce_wakeup_from_spin_wait: AtomicBool,
}

/// Deadline list plus its worker thread.
pub struct KTimeManager {
    inner: Arc<TimeManagerInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl KTimeManager {
    /// Starts the wake-up worker.
    pub(crate) fn new(critical_section: Arc<CriticalSection>) -> Self {
        let inner = Arc::new(TimeManagerInner {
            critical_section,
            waiting_objects: Mutex::new(Vec::new()),
            sleep_event: create_sleep_event(),
            keep_running: AtomicBool::new(true),
            enforce_wakeup_from_spin_wait: AtomicBool::new(false),
        });
        let worker = {
            let inner = Arc::clone(&inner);
            std::thread::Builder::new()
                .name("aurora.time".to_owned())
                .spawn(move || inner.run())
                .expect("spawn time-manager worker")
        };
        Self { inner, worker: Mutex::new(Some(worker)) }
    }

    /// Arms a wake-up for `object` after `timeout_ns` nanoseconds.
    pub fn schedule_future_invocation(
        &self,
        object: Arc<dyn FutureScheduledObject>,
        timeout_ns: i64,
    ) {
        let time_point = PerformanceCounter::elapsed_ticks()
            .saturating_add(nanoseconds_to_host_ticks(timeout_ns));
        let time_point = self.inner.sleep_event.adjust_time_point(time_point, timeout_ns);
        self.inner.critical_section.inner_lock().lock(|| {
            self.inner.waiting_objects.lock().push(WaitingObject { object, time_point });
            if timeout_ns < SPIN_WAIT_THRESHOLD_NS {
                self.inner.enforce_wakeup_from_spin_wait.store(true, Ordering::Release);
            }
        });
        self.inner.sleep_event.signal();
    }

    /// Disarms every wake-up registered for `object`. Idempotent.
    pub fn unschedule_future_invocation(&self, object: &Arc<dyn FutureScheduledObject>) {
        self.inner.critical_section.inner_lock().lock(|| {
            let mut list = self.inner.waiting_objects.lock();
            for index in (0..list.len()).rev() {
                if same_scheduled_object(&list[index].object, object) {
                    list.remove(index);
                }
            }
        });
    }

    /// Stops and joins the worker. Safe to call more than once.
    pub fn shutdown(&self) {
        self.inner.keep_running.store(false, Ordering::Release);
        self.inner.sleep_event.signal();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

impl Drop for KTimeManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl TimeManagerInner {
    fn run(&self) {
        debug!(target: "time", "wake-up worker running");
        while self.keep_running.load(Ordering::Acquire) {
            let next = self.critical_section.inner_lock().lock(|| {
                self.enforce_wakeup_from_spin_wait.store(false, Ordering::Release);
                self.next_waiting_object()
            });

            let Some(next) = next else {
                self.sleep_event.sleep();
                continue;
            };

            if next.time_point > PerformanceCounter::elapsed_ticks()
                && !self.sleep_event.sleep_until(next.time_point)
            {
                // Finish the sub-millisecond tail by spinning; a fresh
                // short-deadline schedule breaks the spin early.
                while PerformanceCounter::elapsed_ticks() < next.time_point {
                    if self.enforce_wakeup_from_spin_wait.load(Ordering::Acquire) {
                        break;
                    }
                    std::hint::spin_loop();
                }
            }

            if next.time_point <= PerformanceCounter::elapsed_ticks() {
                self.critical_section.inner_lock().lock(|| {
                    let due = {
                        let mut list = self.waiting_objects.lock();
                        let position = list.iter().position(|entry| {
                            entry.time_point == next.time_point
                                && same_scheduled_object(&entry.object, &next.object)
                        });
                        position.map(|index| list.remove(index).object)
                    };
                    if let Some(object) = due {
                        object.time_up();
                    }
                });
            }
        }
        debug!(target: "time", "wake-up worker stopped");
    }

    /// Entry with the smallest deadline. The scan runs last-to-first and
    /// takes entries at `<=` the running minimum, so among equal deadlines
    /// the earliest-inserted entry wins.
    fn next_waiting_object(&self) -> Option<WaitingObject> {
        let list = self.waiting_objects.lock();
        let mut selected: Option<&WaitingObject> = None;
        let mut lowest_time_point = i64::MAX;
        for entry in list.iter().rev() {
            if entry.time_point <= lowest_time_point {
                lowest_time_point = entry.time_point;
                selected = Some(entry);
            }
        }
        selected.map(|entry| WaitingObject {
            object: Arc::clone(&entry.object),
            time_point: entry.time_point,
        })
    }
}

fn same_scheduled_object(
    a: &Arc<dyn FutureScheduledObject>,
    b: &Arc<dyn FutureScheduledObject>,
) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
