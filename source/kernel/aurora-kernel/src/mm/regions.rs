// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deterministic partitioning of emulated DRAM into named pools.
//!
//! Pools are carved downward from the end of DRAM: application first, then
//! applet, then the fixed-minimum nvservices pool; everything remaining
//! above the user slab heap goes to the service pool. The carve is a pure
//! function of (memory size, arrangement).

use log::{info, warn};
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use super::page_heap::PageHeap;
use super::PAGE_SIZE;
use crate::types::{KResult, KernelError};

/// Base address of emulated DRAM.
pub const DRAM_BASE: u64 = 0x8000_0000;
/// Start of the kernel's reserved carveout.
pub const KERNEL_RESERVE_BASE: u64 = DRAM_BASE + 0x6_0000;
/// Base of the kernel slab heap.
pub const SLAB_HEAP_BASE: u64 = KERNEL_RESERVE_BASE + 0x8_5000;
/// Size of the kernel slab heap.
pub const SLAB_HEAP_SIZE: u64 = 0xA2_1000;
/// First byte past the kernel slab heap.
pub const SLAB_HEAP_END: u64 = SLAB_HEAP_BASE + SLAB_HEAP_SIZE;
/// Base of the user-mode slab heap.
pub const USER_SLAB_HEAP_BASE: u64 = SLAB_HEAP_END;
/// Size of the user-mode slab heap.
pub const USER_SLAB_HEAP_SIZE: u64 = 0x3D_E000;
/// Item granule of the user-mode slab heap.
pub const USER_SLAB_HEAP_ITEM_SIZE: u64 = 4096;

const NV_SERVICES_POOL_SIZE: u64 = 0x29B_A000;

/// Emulated DRAM module size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemorySize {
    /// 4 GiB of DRAM, the retail configuration.
    Size4GiB,
    /// 6 GiB of DRAM.
    Size6GiB,
    /// 8 GiB of DRAM.
    Size8GiB,
}

impl MemorySize {
    /// DRAM bytes for this module size.
    pub const fn bytes(self) -> u64 {
        match self {
            Self::Size4GiB => 4 << 30,
            Self::Size6GiB => 6 << 30,
            Self::Size8GiB => 8 << 30,
        }
    }
}

/// Pool arrangement splitting DRAM between the application and applets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryArrange {
    /// Default split of a 4 GiB module.
    Arrange4GiB,
    /// 4 GiB module favouring applet development.
    Arrange4GiBAppletDev,
    /// 4 GiB module favouring system development.
    Arrange4GiBSystemDev,
    /// Default split of a 6 GiB module.
    Arrange6GiB,
    /// 6 GiB module favouring applet development.
    Arrange6GiBAppletDev,
    /// Default split of an 8 GiB module.
    Arrange8GiB,
}

impl MemoryArrange {
    const fn application_pool_size(self) -> u64 {
        match self {
            Self::Arrange4GiB | Self::Arrange4GiBSystemDev | Self::Arrange6GiBAppletDev => {
                0xCD50_0000
            }
            Self::Arrange4GiBAppletDev => 0x8000_0000,
            Self::Arrange6GiB | Self::Arrange8GiB => 0x1_3340_0000,
        }
    }

    const fn applet_pool_size(self) -> u64 {
        match self {
            Self::Arrange4GiB => 0x1FB0_0000,
            Self::Arrange4GiBAppletDev => 0x6120_0000,
            Self::Arrange4GiBSystemDev => 0x1C00_0000,
            Self::Arrange6GiB | Self::Arrange8GiB => 0x2320_0000,
            Self::Arrange6GiBAppletDev => 0x8910_0000,
        }
    }
}

/// One named DRAM pool wrapping a [`PageHeap`] behind its own lock.
pub struct MemoryRegionManager {
    address: u64,
    size: u64,
    page_heap: Mutex<PageHeap>,
}

impl MemoryRegionManager {
    fn new(address: u64, size: u64) -> Self {
        let mut heap = PageHeap::new(address, size, Box::new(SmallRng::from_entropy()));
        heap.free(address, size / PAGE_SIZE);
        Self { address, size, page_heap: Mutex::new(heap) }
    }

    /// Base address of the pool.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Size of the pool in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// First byte past the pool.
    pub fn end_address(&self) -> u64 {
        self.address + self.size
    }

    /// Free pages currently available in the pool.
    pub fn free_pages_count(&self) -> u64 {
        self.page_heap.lock().free_pages_count()
    }

    /// Allocates `pages_count` contiguous pages aligned to `align_pages`.
    pub fn allocate_pages_contiguous(
        &self,
        pages_count: u64,
        align_pages: u64,
        random: bool,
    ) -> KResult<u64> {
        if pages_count == 0 {
            return Err(KernelError::InvalidArgument);
        }
        let mut heap = self.page_heap.lock();
        heap.allocate_pages_contiguous(pages_count, align_pages, random).ok_or_else(|| {
            warn!(
                target: "mm",
                "pool {:#x}: out of memory allocating {} pages",
                self.address, pages_count
            );
            KernelError::OutOfMemory
        })
    }

    /// Returns pages to the pool.
    pub fn free_pages(&self, address: u64, pages_count: u64) {
        debug_assert!(address >= self.address);
        debug_assert!(address + pages_count * PAGE_SIZE <= self.end_address());
        self.page_heap.lock().free(address, pages_count);
    }
}

/// The four DRAM pools of a running kernel context.
pub struct MemoryRegionSet {
    /// Pool backing the foreground application.
    pub application: MemoryRegionManager,
    /// Pool backing system applets.
    pub applet: MemoryRegionManager,
    /// Pool backing system services.
    pub service: MemoryRegionManager,
    /// Pool reserved for the nvservices bridge.
    pub nv_services: MemoryRegionManager,
}

impl MemoryRegionSet {
    /// Carves DRAM into pools. The result is deterministic from the
    /// arguments; no component has discretion over the boundaries.
    pub fn new(size: MemorySize, arrange: MemoryArrange) -> Self {
        let dram_end = DRAM_BASE + size.bytes();
        let application_size = arrange.application_pool_size();
        let applet_size = arrange.applet_pool_size();

        let application_base = dram_end - application_size;
        let applet_base = application_base - applet_size;
        let nv_services_base = applet_base - NV_SERVICES_POOL_SIZE;
        let service_base = USER_SLAB_HEAP_BASE + USER_SLAB_HEAP_SIZE;
        let service_size = nv_services_base - service_base;

        info!(
            target: "mm",
            "DRAM pools: application {:#x}+{:#x}, applet {:#x}+{:#x}, nvservices {:#x}+{:#x}, service {:#x}+{:#x}",
            application_base, application_size,
            applet_base, applet_size,
            nv_services_base, NV_SERVICES_POOL_SIZE,
            service_base, service_size
        );

        Self {
            application: MemoryRegionManager::new(application_base, application_size),
            applet: MemoryRegionManager::new(applet_base, applet_size),
            service: MemoryRegionManager::new(service_base, service_size),
            nv_services: MemoryRegionManager::new(nv_services_base, NV_SERVICES_POOL_SIZE),
        }
    }
}
