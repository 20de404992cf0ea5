// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Monotonic host tick source shared by the whole runtime.

use std::time::Instant;

use once_cell::sync::Lazy;

static ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// Host ticks per second. The counter is backed by [`Instant`], so one tick
/// is one nanosecond.
pub const TICKS_PER_SECOND: i64 = 1_000_000_000;

/// Monotonic tick counter with a process-lifetime origin.
pub struct PerformanceCounter;

impl PerformanceCounter {
    /// Ticks elapsed since the counter origin was captured.
    pub fn elapsed_ticks() -> i64 {
        let nanos = ORIGIN.elapsed().as_nanos();
        nanos.min(i64::MAX as u128) as i64
    }

    /// Tick rate of [`elapsed_ticks`](Self::elapsed_ticks).
    pub fn ticks_per_second() -> i64 {
        TICKS_PER_SECOND
    }
}

/// Captures the counter origin now instead of on first use.
pub fn init() {
    Lazy::force(&ORIGIN);
}
