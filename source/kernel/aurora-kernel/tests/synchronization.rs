// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Scenario tests for timers, waits and signals
//! OWNERS: @kernel-team
//! NOTE: Tests only; timing bounds are generous so loaded hosts stay green.
//!
//! TEST_SCOPE:
//!   - Time-manager invocation ordering and deadline accuracy
//!   - Multi-object waits: broadcast wakeups, pre-signaled fast path,
//!     timeout, cancellation, termination
//!
//! TEST_SCENARIOS:
//!   - timer_invocations_fire_in_deadline_order(): B(+5ms) A(+10ms) C(+20ms)
//!   - signal_wakes_every_waiter_with_success(): broadcast semantics
//!   - presignaled_object_completes_without_parking(): index 1 immediately
//!   - wait_times_out() / cancel_resumes_waiter() / termination_wins()

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use aurora_kernel::context::{KernelConfig, KernelContext};
use aurora_kernel::sync::{FutureScheduledObject, KEvent, KSynchronizationObject};
use aurora_kernel::thread::KThread;
use aurora_kernel::types::KernelError;
use aurora_timing::{nanoseconds_to_host_ticks, PerformanceCounter};

const MS: i64 = 1_000_000;

struct Recorder {
    label: &'static str,
    log: Arc<Mutex<Vec<(&'static str, i64)>>>,
}

impl FutureScheduledObject for Recorder {
    fn time_up(&self) {
        self.log.lock().push((self.label, PerformanceCounter::elapsed_ticks()));
    }
}

#[test]
fn timer_invocations_fire_in_deadline_order() {
    let context = KernelContext::new(KernelConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let recorder = |label| {
        Arc::new(Recorder { label, log: Arc::clone(&log) }) as Arc<dyn FutureScheduledObject>
    };

    let base = PerformanceCounter::elapsed_ticks();
    context.time_manager().schedule_future_invocation(recorder("a"), 10 * MS);
    context.time_manager().schedule_future_invocation(recorder("b"), 5 * MS);
    context.time_manager().schedule_future_invocation(recorder("c"), 20 * MS);

    std::thread::sleep(Duration::from_millis(80));
    let entries = log.lock().clone();
    let order: Vec<_> = entries.iter().map(|(label, _)| *label).collect();
    assert_eq!(order, ["b", "a", "c"]);
    for (label, fired) in entries {
        let timeout = match label {
            "a" => 10 * MS,
            "b" => 5 * MS,
            _ => 20 * MS,
        };
        let deadline = base + nanoseconds_to_host_ticks(timeout);
        assert!(fired >= deadline, "{label} fired early");
        assert!(fired < deadline + nanoseconds_to_host_ticks(40 * MS), "{label} fired late");
    }
    context.shutdown();
}

#[test]
fn unscheduled_invocations_never_fire() {
    let context = KernelContext::new(KernelConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let recorder: Arc<dyn FutureScheduledObject> =
        Arc::new(Recorder { label: "x", log: Arc::clone(&log) });
    context.time_manager().schedule_future_invocation(Arc::clone(&recorder), 10 * MS);
    context.time_manager().unschedule_future_invocation(&recorder);
    // Unscheduling twice is fine.
    context.time_manager().unschedule_future_invocation(&recorder);
    std::thread::sleep(Duration::from_millis(40));
    assert!(log.lock().is_empty());
    context.shutdown();
}

#[test]
fn signal_wakes_every_waiter_with_success() {
    let context = KernelContext::new(KernelConfig::default());
    let event = KEvent::new(Arc::clone(&context));
    let results = Arc::new(Mutex::new(Vec::new()));

    let mut workers = Vec::new();
    for core in 0..2 {
        let thread = KThread::new(Arc::clone(&context), core, true);
        let objects: Vec<Arc<dyn KSynchronizationObject>> =
            vec![Arc::clone(&event) as Arc<dyn KSynchronizationObject>];
        let context = Arc::clone(&context);
        let results = Arc::clone(&results);
        workers.push(
            thread
                .start("waiter", move || {
                    let result = context.synchronization().wait_for(&objects, 100 * MS);
                    results.lock().push(result);
                })
                .expect("spawn waiter"),
        );
    }

    std::thread::sleep(Duration::from_millis(10));
    event.signal();
    for worker in workers {
        worker.join().expect("waiter exits");
    }
    assert_eq!(*results.lock(), vec![Ok(0), Ok(0)]);
    context.shutdown();
}

#[test]
fn presignaled_object_completes_without_parking() {
    let context = KernelContext::new(KernelConfig::default());
    let x = KEvent::new(Arc::clone(&context));
    let y = KEvent::new(Arc::clone(&context));
    let z = KEvent::new(Arc::clone(&context));
    y.signal();
    let objects: Vec<Arc<dyn KSynchronizationObject>> = vec![x, y, z]
        .into_iter()
        .map(|event| event as Arc<dyn KSynchronizationObject>)
        .collect();
    // Infinite timeout: only the fast path can return.
    assert_eq!(context.synchronization().wait_for(&objects, -1), Ok(1));
    context.shutdown();
}

#[test]
fn zero_timeout_polls() {
    let context = KernelContext::new(KernelConfig::default());
    let event = KEvent::new(Arc::clone(&context));
    let objects: Vec<Arc<dyn KSynchronizationObject>> =
        vec![Arc::clone(&event) as Arc<dyn KSynchronizationObject>];
    assert_eq!(context.synchronization().wait_for(&objects, 0), Err(KernelError::TimedOut));
    event.signal();
    assert_eq!(context.synchronization().wait_for(&objects, 0), Ok(0));
    context.shutdown();
}

#[test]
fn wait_times_out() {
    let context = KernelContext::new(KernelConfig::default());
    let event = KEvent::new(Arc::clone(&context));
    let thread = KThread::new(Arc::clone(&context), 0, true);
    let objects: Vec<Arc<dyn KSynchronizationObject>> =
        vec![Arc::clone(&event) as Arc<dyn KSynchronizationObject>];
    let result = Arc::new(Mutex::new(None));
    let worker = {
        let context = Arc::clone(&context);
        let result = Arc::clone(&result);
        let started = Instant::now();
        thread
            .start("sleeper", move || {
                let outcome = context.synchronization().wait_for(&objects, 20 * MS);
                *result.lock() = Some((outcome, started.elapsed()));
            })
            .expect("spawn sleeper")
    };
    worker.join().expect("sleeper exits");
    let (outcome, elapsed) = result.lock().take().expect("result recorded");
    assert_eq!(outcome, Err(KernelError::TimedOut));
    assert!(elapsed >= Duration::from_millis(19), "woke early: {elapsed:?}");
    context.shutdown();
}

#[test]
fn cancel_resumes_waiter() {
    let context = KernelContext::new(KernelConfig::default());
    let event = KEvent::new(Arc::clone(&context));
    let thread = KThread::new(Arc::clone(&context), 0, true);
    let objects: Vec<Arc<dyn KSynchronizationObject>> =
        vec![Arc::clone(&event) as Arc<dyn KSynchronizationObject>];
    let result = Arc::new(Mutex::new(None));
    let worker = {
        let context = Arc::clone(&context);
        let result = Arc::clone(&result);
        thread
            .start("cancelled", move || {
                *result.lock() = Some(context.synchronization().wait_for(&objects, 500 * MS));
            })
            .expect("spawn waiter")
    };
    std::thread::sleep(Duration::from_millis(10));
    let started = Instant::now();
    thread.cancel_synchronization();
    worker.join().expect("waiter exits");
    assert_eq!(result.lock().take(), Some(Err(KernelError::Cancelled)));
    assert!(started.elapsed() < Duration::from_millis(400));
    context.shutdown();
}

#[test]
fn pending_cancel_flag_wins_before_the_wait() {
    let context = KernelContext::new(KernelConfig::default());
    let event = KEvent::new(Arc::clone(&context));
    let thread = KThread::new(Arc::clone(&context), 0, true);
    thread.cancel_synchronization();
    let objects: Vec<Arc<dyn KSynchronizationObject>> =
        vec![Arc::clone(&event) as Arc<dyn KSynchronizationObject>];
    let result = Arc::new(Mutex::new(Vec::new()));
    let worker = {
        let context = Arc::clone(&context);
        let result = Arc::clone(&result);
        thread
            .start("flagged", move || {
                result.lock().push(context.synchronization().wait_for(&objects, 50 * MS));
                // The flag is consumed: the second wait times out normally.
                result.lock().push(context.synchronization().wait_for(&objects, 10 * MS));
            })
            .expect("spawn waiter")
    };
    worker.join().expect("waiter exits");
    assert_eq!(
        *result.lock(),
        vec![Err(KernelError::Cancelled), Err(KernelError::TimedOut)]
    );
    context.shutdown();
}

#[test]
fn termination_wins_over_waiting() {
    let context = KernelContext::new(KernelConfig::default());
    let event = KEvent::new(Arc::clone(&context));
    let thread = KThread::new(Arc::clone(&context), 0, true);
    let objects: Vec<Arc<dyn KSynchronizationObject>> =
        vec![Arc::clone(&event) as Arc<dyn KSynchronizationObject>];
    let result = Arc::new(Mutex::new(Vec::new()));
    let worker = {
        let context = Arc::clone(&context);
        let result = Arc::clone(&result);
        thread
            .start("terminating", move || {
                result.lock().push(context.synchronization().wait_for(&objects, 500 * MS));
                // Once requested, termination short-circuits later waits.
                result.lock().push(context.synchronization().wait_for(&objects, 500 * MS));
            })
            .expect("spawn waiter")
    };
    std::thread::sleep(Duration::from_millis(10));
    thread.request_termination();
    worker.join().expect("waiter exits");
    assert_eq!(
        *result.lock(),
        vec![Err(KernelError::ThreadTerminating), Err(KernelError::ThreadTerminating)]
    );
    context.shutdown();
}
