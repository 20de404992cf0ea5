// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Conversions between guest nanoseconds, guest counter ticks and host ticks.

use crate::counter::PerformanceCounter;

/// Guest counter rate in Hz (19.2 MHz).
pub const GUEST_TICKS_PER_SECOND: i64 = 19_200_000;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MILLISECOND: i64 = 1_000_000;

/// Converts nanoseconds into host ticks.
///
/// Whole seconds and the sub-second remainder are scaled separately so the
/// intermediate products never lose precision for representable inputs.
pub fn nanoseconds_to_host_ticks(ns: i64) -> i64 {
    let tps = PerformanceCounter::ticks_per_second();
    let seconds = ns / NANOS_PER_SECOND;
    let sub_second = ns % NANOS_PER_SECOND;
    seconds
        .saturating_mul(tps)
        .saturating_add(sub_second.saturating_mul(tps) / NANOS_PER_SECOND)
}

/// Converts guest counter ticks to nanoseconds, rounding up.
pub fn guest_ticks_to_nanoseconds(ticks: i64) -> i64 {
    let numerator = ticks as i128 * NANOS_PER_SECOND as i128 + (GUEST_TICKS_PER_SECOND - 1) as i128;
    let ns = numerator / GUEST_TICKS_PER_SECOND as i128;
    ns.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Converts host ticks to guest counter ticks. Double precision is enough
/// for the rates involved.
pub fn host_ticks_to_guest_ticks(ticks: i64) -> i64 {
    let tps = PerformanceCounter::ticks_per_second();
    (ticks as f64 * GUEST_TICKS_PER_SECOND as f64 / tps as f64) as i64
}

/// Converts host ticks to whole milliseconds.
pub fn host_ticks_to_milliseconds(ticks: i64) -> i64 {
    ticks / (PerformanceCounter::ticks_per_second() / 1_000)
}

/// Converts nanoseconds to whole milliseconds, saturating at `i32::MAX`.
pub fn nanoseconds_to_milliseconds(ns: i64) -> i32 {
    let ms = ns / NANOS_PER_MILLISECOND;
    if ms > i32::MAX as i64 {
        i32::MAX
    } else {
        ms as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_tick_conversion_preserves_sub_second_precision() {
        // One tick per nanosecond on the host backend.
        assert_eq!(nanoseconds_to_host_ticks(1), 1);
        assert_eq!(nanoseconds_to_host_ticks(999_999_999), 999_999_999);
        assert_eq!(nanoseconds_to_host_ticks(3_000_000_001), 3_000_000_001);
    }

    #[test]
    fn host_tick_conversion_saturates() {
        assert_eq!(nanoseconds_to_host_ticks(i64::MAX), i64::MAX);
    }

    #[test]
    fn guest_ticks_round_up() {
        // One guest tick is 52.08... ns and must round to 53.
        assert_eq!(guest_ticks_to_nanoseconds(1), 53);
        assert_eq!(guest_ticks_to_nanoseconds(0), 0);
        // One full guest second is exact.
        assert_eq!(guest_ticks_to_nanoseconds(GUEST_TICKS_PER_SECOND), 1_000_000_000);
    }

    #[test]
    fn guest_tick_round_trip_close() {
        let ns = guest_ticks_to_nanoseconds(19_200);
        let ticks = host_ticks_to_guest_ticks(nanoseconds_to_host_ticks(ns));
        assert!((ticks - 19_200).abs() <= 1, "round trip drifted: {ticks}");
    }

    #[test]
    fn milliseconds_saturate_at_i32_max() {
        assert_eq!(nanoseconds_to_milliseconds(5_000_000), 5);
        assert_eq!(nanoseconds_to_milliseconds(i64::MAX), i32::MAX);
    }
}
