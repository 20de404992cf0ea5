// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Kernel synchronization: critical section, timers, multi-object wait.

pub mod critical_section;
pub mod sync_object;
pub mod time_manager;
pub mod wait;

pub use critical_section::{CriticalSection, RecursiveLock};
pub use sync_object::{KEvent, KSynchronizationObject, SyncObjectBase, WaitList, WaitNode};
pub use time_manager::{FutureScheduledObject, KTimeManager};
pub use wait::KSynchronization;
