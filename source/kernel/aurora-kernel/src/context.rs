// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wiring of the core subsystems.

use std::sync::Arc;

use log::info;

use crate::mm::{MemoryArrange, MemoryRegionSet, MemorySize};
use crate::sched::HleScheduler;
use crate::sync::{CriticalSection, KSynchronization, KTimeManager};

/// Build-time configuration of a kernel context.
#[derive(Clone, Copy, Debug)]
pub struct KernelConfig {
    /// Emulated DRAM module size.
    pub memory_size: MemorySize,
    /// DRAM pool arrangement.
    pub memory_arrange: MemoryArrange,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            memory_size: MemorySize::Size4GiB,
            memory_arrange: MemoryArrange::Arrange4GiB,
        }
    }
}

/// Owner of the guest-kernel core: scheduler, critical section, time
/// manager, wait machinery and the DRAM pools.
pub struct KernelContext {
    scheduler: Arc<HleScheduler>,
    critical_section: Arc<CriticalSection>,
    time_manager: KTimeManager,
    synchronization: KSynchronization,
    regions: MemoryRegionSet,
}

impl KernelContext {
    /// Brings the core up: counter origin, scheduler, critical section,
    /// time-manager worker, DRAM pools.
    pub fn new(config: KernelConfig) -> Arc<Self> {
        aurora_timing::init();
        let scheduler = Arc::new(HleScheduler::new());
        let critical_section = Arc::new(CriticalSection::new(scheduler.clone()));
        let time_manager = KTimeManager::new(Arc::clone(&critical_section));
        let regions = MemoryRegionSet::new(config.memory_size, config.memory_arrange);
        info!(
            target: "kernel",
            "context up: dram={:?} arrange={:?}",
            config.memory_size, config.memory_arrange
        );
        Arc::new_cyclic(|me| Self {
            scheduler,
            critical_section,
            time_manager,
            synchronization: KSynchronization::new(me.clone()),
            regions,
        })
    }

    /// The global critical section.
    pub fn critical_section(&self) -> &CriticalSection {
        &self.critical_section
    }

    /// The cooperative scheduler behind the critical section.
    pub(crate) fn scheduler(&self) -> &HleScheduler {
        &self.scheduler
    }

    /// The deadline manager.
    pub fn time_manager(&self) -> &KTimeManager {
        &self.time_manager
    }

    /// The multi-object wait primitive.
    pub fn synchronization(&self) -> &KSynchronization {
        &self.synchronization
    }

    /// The DRAM pools.
    pub fn regions(&self) -> &MemoryRegionSet {
        &self.regions
    }

    /// Stops the time-manager worker. Also runs on drop.
    pub fn shutdown(&self) {
        info!(target: "kernel", "context shutting down");
        self.time_manager.shutdown();
    }
}
