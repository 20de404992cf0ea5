// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Timing behaviour of the sleep primitive against the host clock
//! OWNERS: @runtime
//! NOTE: Tests only; bounds are generous so loaded hosts stay green.
//!
//! TEST_SCOPE:
//!   - Counter monotonicity
//!   - SleepEvent deadline behaviour (coarse wake lands near the deadline)
//!
//! TEST_SCENARIOS:
//!   - counter_is_monotonic(): successive reads never decrease
//!   - sleep_until_lands_near_deadline(): ms-scale sleep wakes within the
//!     documented one-millisecond undershoot window

use std::hint;

use aurora_timing::{create_sleep_event, nanoseconds_to_host_ticks, PerformanceCounter};

#[test]
fn counter_is_monotonic() {
    let mut last = PerformanceCounter::elapsed_ticks();
    for _ in 0..1_000 {
        let now = PerformanceCounter::elapsed_ticks();
        assert!(now >= last);
        last = now;
    }
}

#[test]
fn sleep_until_lands_near_deadline() {
    let event = create_sleep_event();
    let deadline = PerformanceCounter::elapsed_ticks() + nanoseconds_to_host_ticks(20_000_000);
    if !event.sleep_until(deadline) {
        while PerformanceCounter::elapsed_ticks() < deadline {
            hint::spin_loop();
        }
    }
    let woke = PerformanceCounter::elapsed_ticks();
    // The condvar path may undershoot by up to the truncated millisecond;
    // anything earlier means the deadline arithmetic is wrong.
    assert!(deadline - woke < nanoseconds_to_host_ticks(2_000_000), "woke far too early");
    assert!(woke < deadline + nanoseconds_to_host_ticks(500_000_000), "woke far too late");
}
