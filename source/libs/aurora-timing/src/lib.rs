// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Host time source, tick conversions and precise sleep
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests in this crate + tests/precision.rs
//!
//! PUBLIC API:
//!   - PerformanceCounter: monotonic host tick source
//!   - convert: ns/tick conversion helpers shared with the guest kernel
//!   - PreciseSleepEvent trait + SleepEvent: deadline sleep with spin handoff
//!   - WakeEvent: per-thread parking gate driven by the scheduler

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod convert;
mod counter;
mod sleep;

pub use convert::{
    guest_ticks_to_nanoseconds, host_ticks_to_guest_ticks, host_ticks_to_milliseconds,
    nanoseconds_to_host_ticks, nanoseconds_to_milliseconds, GUEST_TICKS_PER_SECOND,
};
pub use counter::{init, PerformanceCounter, TICKS_PER_SECOND};
pub use sleep::{create_sleep_event, PreciseSleepEvent, SleepEvent, WakeEvent};
