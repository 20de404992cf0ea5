// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Buddy-style page heap over one contiguous DRAM region.
//!
//! Each tier of the granularity ladder owns a [`PageBitmap`] whose cells
//! are blocks of that tier's size. Freed blocks coalesce upward whenever a
//! whole next-tier span turns free; allocations split larger blocks and
//! return the tail through the ordinary free path. All bitmap storage comes
//! from a single management slab sized up front.

use rand::RngCore;

use super::page_bitmap::PageBitmap;
use super::{align_down, align_up, PAGE_SIZE};

/// Default granularity ladder: 4 KiB, 64 KiB, 2 MiB, 4 MiB, 32 MiB,
/// 512 MiB, 1 GiB.
pub const DEFAULT_BLOCK_SHIFTS: &[u32] = &[12, 16, 21, 22, 25, 29, 30];

/// One granularity tier and its bitmap.
struct Block {
    bitmap: PageBitmap,
    shift: u32,
    next_shift: u32,
    size: u64,
    heap_base: u64,
}

impl Block {
    /// Builds the tier over the heap region re-aligned outward to the next
    /// tier's block size, so coalescing offsets stay integral.
    fn initialize(
        storage: Vec<u64>,
        shift: u32,
        next_shift: u32,
        address: u64,
        size: u64,
    ) -> (Self, Vec<u64>) {
        let align = if next_shift != 0 { 1u64 << next_shift } else { 1u64 << shift };
        let base = align_down(address, align);
        let end = align_up(address + size, align);
        let (bitmap, tail) = PageBitmap::initialize(storage, (end - base) >> shift);
        (Self { bitmap, shift, next_shift, size: 1u64 << shift, heap_base: base }, tail)
    }

    fn overhead_words(shift: u32, next_shift: u32, size: u64) -> u64 {
        let align = if next_shift != 0 { 1u64 << next_shift } else { 1u64 << shift };
        let region = align * 2 + align_up(size, align);
        PageBitmap::storage_words(region >> shift)
    }

    fn pages_per_block(&self) -> u64 {
        self.size / PAGE_SIZE
    }

    fn free_blocks_count(&self) -> u64 {
        self.bitmap.bits_count()
    }

    fn pop_block(&mut self, random: bool, rng: &mut dyn RngCore) -> Option<u64> {
        let offset = self.bitmap.find_free_block(random, rng)?;
        self.bitmap.clear_bit(offset);
        Some(self.heap_base + (offset << self.shift))
    }

    /// Marks `address` free at this tier. When the surrounding next-tier
    /// span turns entirely free its bits are reclaimed and the span's
    /// address is returned for re-pushing one tier up.
    fn push_block(&mut self, address: u64) -> Option<u64> {
        let offset = (address - self.heap_base) >> self.shift;
        self.bitmap.set_bit(offset);
        if self.next_shift == 0 {
            return None;
        }
        let span = 1u64 << (self.next_shift - self.shift);
        let aligned = offset & !(span - 1);
        if self.bitmap.clear_range(aligned, span) {
            Some(self.heap_base + (aligned << self.shift))
        } else {
            None
        }
    }
}

/// Multi-granularity buddy allocator over `[base, base + size)`.
pub struct PageHeap {
    base: u64,
    size: u64,
    blocks: Vec<Block>,
    rng: Box<dyn RngCore + Send>,
}

impl PageHeap {
    /// Creates a heap over the default granularity ladder. Every page
    /// starts out used; the owner frees the region to arm the heap.
    pub fn new(address: u64, size: u64, rng: Box<dyn RngCore + Send>) -> Self {
        Self::with_shifts(address, size, DEFAULT_BLOCK_SHIFTS, rng)
    }

    /// Creates a heap over a custom ascending shift ladder.
    pub fn with_shifts(
        address: u64,
        size: u64,
        shifts: &[u32],
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        assert!(!shifts.is_empty(), "page heap needs at least one tier");
        debug_assert!(shifts.windows(2).all(|pair| pair[0] < pair[1]));
        debug_assert_eq!(address % PAGE_SIZE, 0);
        debug_assert_eq!(size % PAGE_SIZE, 0);

        let mut slab_words = 0;
        for (index, &shift) in shifts.iter().enumerate() {
            let next_shift = shifts.get(index + 1).copied().unwrap_or(0);
            slab_words += Block::overhead_words(shift, next_shift, size);
        }

        let mut storage = vec![0u64; slab_words as usize];
        let mut blocks = Vec::with_capacity(shifts.len());
        for (index, &shift) in shifts.iter().enumerate() {
            let next_shift = shifts.get(index + 1).copied().unwrap_or(0);
            let (block, tail) = Block::initialize(storage, shift, next_shift, address, size);
            blocks.push(block);
            storage = tail;
        }

        Self { base: address, size, blocks, rng }
    }

    /// Base address of the managed region.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Size of the managed region in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Total free pages across every tier.
    pub fn free_pages_count(&self) -> u64 {
        self.blocks.iter().map(|block| block.free_blocks_count() * block.pages_per_block()).sum()
    }

    /// Pops one block of at least tier `index`, splitting a larger block
    /// and freeing the unused tail when necessary. Returns `None` when
    /// every tier from `index` up is empty.
    pub fn allocate_block(&mut self, index: usize, random: bool) -> Option<u64> {
        let needed = self.blocks[index].size;
        for tier in index..self.blocks.len() {
            let allocated = self.blocks[tier].size;
            let address = {
                let Self { blocks, rng, .. } = self;
                blocks[tier].pop_block(random, rng.as_mut())
            };
            let Some(address) = address else { continue };
            if allocated > needed {
                self.free(address + needed, (allocated - needed) / PAGE_SIZE);
            }
            return Some(address);
        }
        None
    }

    /// Allocates `pages_count` contiguous pages aligned to `align_pages`,
    /// trimming the excess of the backing block back into the heap.
    pub fn allocate_pages_contiguous(
        &mut self,
        pages_count: u64,
        align_pages: u64,
        random: bool,
    ) -> Option<u64> {
        let index = self.aligned_index(pages_count, align_pages)?;
        let address = self.allocate_block(index, random)?;
        let required = pages_count * PAGE_SIZE;
        let block_size = self.blocks[index].size;
        if block_size > required {
            self.free(address + required, (block_size - required) / PAGE_SIZE);
        }
        Some(address)
    }

    /// Returns `pages_count` pages starting at `address` to the heap,
    /// decomposed into naturally-aligned blocks.
    ///
    /// The largest tier whose blocks fit between the aligned bounds covers
    /// the middle; the residue on each side is covered by strictly smaller
    /// tiers only.
    pub fn free(&mut self, address: u64, pages_count: u64) {
        if pages_count == 0 {
            return;
        }
        let start = address;
        let end = address + pages_count * PAGE_SIZE;
        let mut big_index = self.blocks.len() - 1;
        let before_start = start;
        let mut before_end = start;
        let mut after_start = end;
        let after_end = end;
        loop {
            let block_size = self.blocks[big_index].size;
            let big_start = align_up(start, block_size);
            let big_end = align_down(end, block_size);
            if big_start < big_end {
                let mut block = big_start;
                while block < big_end {
                    self.free_block(block, big_index);
                    block += block_size;
                }
                before_end = big_start;
                after_start = big_end;
                break;
            }
            if big_index == 0 {
                break;
            }
            big_index -= 1;
        }
        for tier in (0..big_index).rev() {
            let block_size = self.blocks[tier].size;
            while before_start + block_size <= before_end {
                before_end -= block_size;
                self.free_block(before_end, tier);
            }
            while after_start + block_size <= after_end {
                self.free_block(after_start, tier);
                after_start += block_size;
            }
        }
    }

    /// Frees one block at `index`, chasing coalescing promotions upward.
    fn free_block(&mut self, mut address: u64, mut index: usize) {
        loop {
            let Some(promoted) = self.blocks[index].push_block(address) else { break };
            address = promoted;
            index += 1;
        }
    }

    /// Largest default-ladder tier whose whole block fits in `pages_count`
    /// pages.
    pub fn block_index(pages_count: u64) -> Option<usize> {
        DEFAULT_BLOCK_SHIFTS
            .iter()
            .enumerate()
            .rev()
            .find(|(_, &shift)| pages_count >= (1u64 << shift) / PAGE_SIZE)
            .map(|(index, _)| index)
    }

    /// Smallest default-ladder tier whose block covers
    /// `max(pages_count, align_pages)` pages.
    pub fn aligned_block_index(pages_count: u64, align_pages: u64) -> Option<usize> {
        let target = pages_count.max(align_pages);
        DEFAULT_BLOCK_SHIFTS.iter().position(|&shift| target <= (1u64 << shift) / PAGE_SIZE)
    }

    fn aligned_index(&self, pages_count: u64, align_pages: u64) -> Option<usize> {
        let target = pages_count.max(align_pages);
        self.blocks.iter().position(|block| target <= block.pages_per_block())
    }

    #[cfg(test)]
    pub(crate) fn tier_free_blocks(&self, index: usize) -> u64 {
        self.blocks[index].free_blocks_count()
    }

    #[cfg(test)]
    pub(crate) fn tier_count(&self) -> usize {
        self.blocks.len()
    }
}
