// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg(test)]
//! CONTEXT: Property-based tests for the page bitmap
//! OWNERS: @kernel-mm-team
//! NOTE: Tests only; the layer-summary invariant must hold under any
//! interleaving of set/clear operations.
//!
//! TEST_SCOPE:
//!   - Summary invariant: a bit above is set iff its 64-bit group below is
//!     non-zero
//!   - Free count equals the bottom-layer popcount
//!   - clear_range succeeds exactly when every covered bit is set
//!
//! TEST_SCENARIOS:
//!   - summary_invariant_holds_under_mutation(): random set/clear traffic
//!   - bits_count_matches_popcount(): bookkeeping never drifts
//!   - clear_range_iff_all_set(): ranged clears agree with per-bit state

use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use super::page_bitmap::PageBitmap;

const BITS: u64 = 200_000;

fn build(offsets: &[u64]) -> PageBitmap {
    let storage = vec![0u64; PageBitmap::storage_words(BITS) as usize];
    let (mut bitmap, _tail) = PageBitmap::initialize(storage, BITS);
    for &offset in offsets {
        bitmap.set_bit(offset);
    }
    bitmap
}

fn check_summaries(bitmap: &PageBitmap) {
    for layer in 0..bitmap.layer_count() - 1 {
        let above = bitmap.layer_words(layer);
        let below = bitmap.layer_words(layer + 1);
        for (word_index, &word) in above.iter().enumerate() {
            for bit in 0..64 {
                let group_index = word_index * 64 + bit;
                let group_nonzero =
                    group_index < below.len() && below[group_index] != 0;
                let summary_set = word & (1 << bit) != 0;
                assert_eq!(summary_set, group_nonzero, "layer {layer} word {word_index} bit {bit}");
            }
        }
    }
}

fn unique_offsets() -> impl Strategy<Value = Vec<u64>> {
    proptest::collection::btree_set(0..BITS, 1..64)
        .prop_map(|set| set.into_iter().collect())
}

proptest! {
    #[test]
    fn summary_invariant_holds_under_mutation(
        offsets in unique_offsets(),
        clears in proptest::collection::vec(any::<prop::sample::Index>(), 0..32),
    ) {
        let mut bitmap = build(&offsets);
        check_summaries(&bitmap);
        let mut live: Vec<u64> = offsets.clone();
        for index in clears {
            if live.is_empty() {
                break;
            }
            let victim = index.index(live.len());
            bitmap.clear_bit(live.swap_remove(victim));
            check_summaries(&bitmap);
        }
    }

    #[test]
    fn bits_count_matches_popcount(offsets in unique_offsets()) {
        let bitmap = build(&offsets);
        let bottom = bitmap.layer_words(bitmap.layer_count() - 1);
        let popcount: u64 = bottom.iter().map(|word| word.count_ones() as u64).sum();
        prop_assert_eq!(bitmap.bits_count(), popcount);
        prop_assert_eq!(popcount, offsets.len() as u64);
    }

    #[test]
    fn clear_range_iff_all_set(start_word in 0u64..(BITS / 64 - 2), hole in 0u64..128) {
        let offset = start_word * 64;
        let all: Vec<u64> = (offset..offset + 128).collect();
        let mut bitmap = build(&all);
        bitmap.clear_bit(offset + hole);
        prop_assert!(!bitmap.clear_range(offset, 128));
        bitmap.set_bit(offset + hole);
        prop_assert!(bitmap.clear_range(offset, 128));
        prop_assert_eq!(bitmap.bits_count(), 0);
        let mut rng = SmallRng::seed_from_u64(0);
        prop_assert_eq!(bitmap.find_free_block(false, &mut rng), None);
    }
}
