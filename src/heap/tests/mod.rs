//! Heap manager unit tests
//!
//! Scenario tests pin the exact buffer states the block encoding
//! produces; the property tests in `fuzz` cover random op sequences.

use crate::heap::{Handle, HeapConfig, HeapError, HeapManager, NULL};


#[cfg(test)]
mod construction_tests {
    use super::*;

    #[test]
    fn test_new_initializes_single_free_block() {
        let heap = HeapManager::with_capacity(15).unwrap();
        assert_eq!(heap.capacity(), 15);
        assert_eq!(heap.memory()[0], 15);
        assert_eq!(heap.memory()[1], NULL);
        assert_eq!(heap.free_start(), Some(0));
        assert_eq!(heap.free_cells().unwrap(), 15);
    }

    #[test]
    fn test_new_overwrites_only_the_header() {
        let heap = HeapManager::new(vec![7; 8]).unwrap();
        assert_eq!(heap.memory()[0], 8);
        assert_eq!(heap.memory()[1], NULL);
        assert!(heap.memory()[2..].iter().all(|&cell| cell == 7));
    }

    #[test]
    fn test_capacity_too_small() {
        assert_eq!(
            HeapManager::new(Vec::new()).unwrap_err(),
            HeapError::CapacityTooSmall { capacity: 0 }
        );
        assert_eq!(
            HeapManager::new(vec![0]).unwrap_err(),
            HeapError::CapacityTooSmall { capacity: 1 }
        );
    }

    #[test]
    fn test_two_cells_is_enough() {
        let mut heap = HeapManager::with_capacity(2).unwrap();
        let handle = heap.allocate(1).unwrap();
        assert_eq!(handle.raw(), 1);
        assert_eq!(heap.free_start(), None);
    }

    #[test]
    fn test_into_memory_returns_buffer() {
        let heap = HeapManager::with_capacity(4).unwrap();
        assert_eq!(heap.into_memory(), vec![4, NULL, 0, 0]);
    }
}

#[cfg(test)]
mod allocation_tests {
    use super::*;

    #[test]
    fn test_first_allocation_carves_from_the_front() {
        let mut heap = HeapManager::with_capacity(15).unwrap();
        let a = heap.allocate(2).unwrap();

        assert_eq!(a.raw(), 1);
        assert_eq!(heap.memory()[0], 3);
        assert_eq!(heap.free_start(), Some(3));
        assert_eq!(heap.memory()[3], 12);
        assert_eq!(heap.memory()[4], NULL);
        heap.check().unwrap();
    }

    #[test]
    fn test_handles_are_distinct_and_in_range() {
        let mut heap = HeapManager::with_capacity(15).unwrap();
        let a = heap.allocate(2).unwrap();
        let b = heap.allocate(2).unwrap();
        let c = heap.allocate(2).unwrap();

        assert_eq!((a.raw(), b.raw(), c.raw()), (1, 4, 7));
        for handle in [a, b, c] {
            assert!(handle.raw() >= 1 && handle.raw() < 15);
        }
    }

    #[test]
    fn test_one_cell_remainder_rides_along() {
        let mut heap = HeapManager::with_capacity(7).unwrap();
        heap.allocate(2).unwrap();
        // The remaining block has 4 cells; a request for 2 needs 3 and
        // leaves a single cell, so the whole block is handed out.
        let b = heap.allocate(2).unwrap();

        assert_eq!(b.raw(), 4);
        assert_eq!(heap.memory()[3], 4);
        assert_eq!(heap.free_start(), None);
        assert_eq!(heap.payload(b).unwrap().len(), 3);
    }

    #[test]
    fn test_exact_fit_consumes_the_block() {
        let mut heap = HeapManager::with_capacity(6).unwrap();
        heap.allocate(2).unwrap();
        let b = heap.allocate(2).unwrap();

        assert_eq!(b.raw(), 4);
        assert_eq!(heap.payload(b).unwrap().len(), 2);
        assert_eq!(heap.free_start(), None);
    }

    #[test]
    fn test_first_fit_skips_undersized_blocks() {
        let mut heap = HeapManager::with_capacity(20).unwrap();
        let a = heap.allocate(2).unwrap();
        heap.allocate(5).unwrap();
        heap.deallocate(a).unwrap();

        // Free list is now 0 (3 cells) -> 9 (11 cells); a request for 4
        // needs 5 cells and must skip the head.
        let c = heap.allocate(4).unwrap();
        assert_eq!(c.raw(), 10);
        assert_eq!(heap.free_start(), Some(0));
        heap.check().unwrap();
    }

    #[test]
    fn test_zero_request_is_rejected() {
        let mut heap = HeapManager::with_capacity(15).unwrap();
        assert_eq!(heap.allocate(0).unwrap_err(), HeapError::InvalidRequest);
    }

    #[test]
    fn test_out_of_memory_leaves_state_untouched() {
        let mut heap = HeapManager::with_capacity(15).unwrap();
        heap.allocate(2).unwrap();
        heap.allocate(2).unwrap();
        heap.allocate(2).unwrap();
        let before = heap.memory().to_vec();

        assert_eq!(
            heap.allocate(20).unwrap_err(),
            HeapError::OutOfMemory { requested: 20 }
        );
        assert_eq!(heap.free_start(), Some(9));
        assert_eq!(heap.memory(), &before[..]);
    }

    #[test]
    fn test_fourth_small_allocation_still_fits() {
        let mut heap = HeapManager::with_capacity(15).unwrap();
        for _ in 0..3 {
            heap.allocate(2).unwrap();
        }
        let d = heap.allocate(2).unwrap();
        assert_eq!(d.raw(), 10);
        assert_eq!(heap.free_start(), Some(12));
    }
}

#[cfg(test)]
mod deallocation_tests {
    use super::*;

    fn heap_with_three_blocks() -> (HeapManager, Handle, Handle, Handle) {
        let mut heap = HeapManager::with_capacity(15).unwrap();
        let a = heap.allocate(2).unwrap();
        let b = heap.allocate(2).unwrap();
        let c = heap.allocate(2).unwrap();
        (heap, a, b, c)
    }

    #[test]
    fn test_free_below_head_becomes_head() {
        let (mut heap, a, _, _) = heap_with_three_blocks();
        heap.deallocate(a).unwrap();

        assert_eq!(heap.free_start(), Some(0));
        assert_eq!(heap.memory()[1], 9);
        heap.check().unwrap();
    }

    #[test]
    fn test_free_interior_splices_in_address_order() {
        let (mut heap, a, b, _) = heap_with_three_blocks();
        heap.deallocate(a).unwrap();
        heap.deallocate(b).unwrap();

        // List runs 0 -> 3 -> 9.
        assert_eq!(heap.free_start(), Some(0));
        assert_eq!(heap.memory()[1], 3);
        assert_eq!(heap.memory()[4], 9);
        heap.check().unwrap();
    }

    #[test]
    fn test_free_restores_total_capacity() {
        let mut heap = HeapManager::with_capacity(15).unwrap();
        let a = heap.allocate(2).unwrap();
        assert_eq!(heap.free_cells().unwrap(), 12);

        heap.deallocate(a).unwrap();
        assert_eq!(heap.free_cells().unwrap(), 15);
        heap.check().unwrap();
    }

    #[test]
    fn test_forward_and_reverse_free_orders_both_stay_valid() {
        let (mut heap, a, b, c) = heap_with_three_blocks();
        heap.deallocate(a).unwrap();
        heap.deallocate(b).unwrap();
        heap.deallocate(c).unwrap();
        heap.check().unwrap();
        assert_eq!(heap.free_cells().unwrap(), 15);

        let (mut heap, a, b, c) = heap_with_three_blocks();
        heap.deallocate(c).unwrap();
        heap.deallocate(b).unwrap();
        heap.deallocate(a).unwrap();
        heap.check().unwrap();
        assert_eq!(heap.free_cells().unwrap(), 15);
        assert_eq!(heap.free_start(), Some(0));
    }

    #[test]
    fn test_free_above_every_free_block_appends_at_the_tail() {
        let mut heap = HeapManager::with_capacity(20).unwrap();
        let a = heap.allocate(2).unwrap();
        heap.deallocate(a).unwrap();
        heap.allocate(12).unwrap();
        let c = heap.allocate(3).unwrap();

        // Only block 0 is free and the freed block sits above it.
        assert_eq!(heap.free_start(), Some(0));
        assert_eq!(c.raw(), 17);
        heap.deallocate(c).unwrap();

        assert_eq!(heap.memory()[1], 16);
        assert_eq!(heap.memory()[17], NULL);
        assert_eq!(heap.free_cells().unwrap(), 7);
        heap.check().unwrap();
    }

    #[test]
    fn test_free_with_empty_free_list_fails_cleanly() {
        let mut heap = HeapManager::with_capacity(6).unwrap();
        let a = heap.allocate(2).unwrap();
        let b = heap.allocate(2).unwrap();
        assert_eq!(heap.free_start(), None);
        let before = heap.memory().to_vec();

        assert_eq!(
            heap.deallocate(a).unwrap_err(),
            HeapError::InvalidFree { handle: a }
        );
        assert_eq!(
            heap.deallocate(b).unwrap_err(),
            HeapError::InvalidFree { handle: b }
        );
        assert_eq!(heap.memory(), &before[..]);
        assert_eq!(heap.free_start(), None);
    }

    #[test]
    fn test_double_free_of_the_head_is_caught() {
        let mut heap = HeapManager::with_capacity(15).unwrap();
        let a = heap.allocate(2).unwrap();
        heap.deallocate(a).unwrap();

        assert_eq!(
            heap.deallocate(a).unwrap_err(),
            HeapError::InvalidFree { handle: a }
        );
    }

    #[test]
    fn test_out_of_range_handles_are_rejected() {
        let mut heap = HeapManager::with_capacity(15).unwrap();
        for raw in [0usize, 15, 99] {
            let handle = Handle::new(raw);
            assert_eq!(
                heap.deallocate(handle).unwrap_err(),
                HeapError::InvalidHandle { handle }
            );
        }
    }

    #[test]
    fn test_foreign_free_corrupts_and_is_later_detected() {
        let mut heap = HeapManager::with_capacity(15).unwrap();
        heap.allocate(4).unwrap();

        // A handle into the middle of the live block is accepted by the
        // minimal contract and silently wrecks the list head.
        heap.deallocate(Handle::new(3)).unwrap();

        assert!(matches!(
            heap.check().unwrap_err(),
            HeapError::OutOfBounds { index: 2, .. }
        ));
        assert!(matches!(
            heap.allocate(1).unwrap_err(),
            HeapError::OutOfBounds { .. }
        ));
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    fn validating_heap(capacity: usize) -> HeapManager {
        HeapManager::with_config(
            vec![0; capacity],
            HeapConfig {
                validate_handles: true,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_double_free_is_rejected() {
        let mut heap = validating_heap(15);
        let a = heap.allocate(2).unwrap();
        heap.deallocate(a).unwrap();

        assert_eq!(
            heap.deallocate(a).unwrap_err(),
            HeapError::InvalidHandle { handle: a }
        );
        heap.check().unwrap();
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let mut heap = validating_heap(15);
        heap.allocate(4).unwrap();
        let foreign = Handle::new(3);

        assert_eq!(
            heap.deallocate(foreign).unwrap_err(),
            HeapError::InvalidHandle { handle: foreign }
        );
        heap.check().unwrap();
    }

    #[test]
    fn test_valid_sequences_are_unaffected() {
        let mut heap = validating_heap(15);
        let a = heap.allocate(2).unwrap();
        let b = heap.allocate(2).unwrap();
        heap.deallocate(a).unwrap();
        heap.deallocate(b).unwrap();
        assert_eq!(heap.free_cells().unwrap(), 15);
    }

    #[test]
    fn test_stats_reports_live_handles() {
        let mut heap = validating_heap(15);
        heap.allocate(2).unwrap();
        heap.allocate(2).unwrap();
        assert_eq!(heap.stats().unwrap().live_handles, Some(2));

        let plain = HeapManager::with_capacity(15).unwrap();
        assert_eq!(plain.stats().unwrap().live_handles, None);
    }
}

#[cfg(test)]
mod inspection_tests {
    use super::*;

    #[test]
    fn test_payloads_do_not_overlap() {
        let mut heap = HeapManager::with_capacity(30).unwrap();
        let a = heap.allocate(3).unwrap();
        let b = heap.allocate(4).unwrap();
        let c = heap.allocate(2).unwrap();

        heap.payload_mut(a).unwrap().fill(11);
        heap.payload_mut(b).unwrap().fill(22);
        heap.payload_mut(c).unwrap().fill(33);

        assert!(heap.payload(a).unwrap().iter().all(|&cell| cell == 11));
        assert!(heap.payload(b).unwrap().iter().all(|&cell| cell == 22));
        assert!(heap.payload(c).unwrap().iter().all(|&cell| cell == 33));
        heap.check().unwrap();
    }

    #[test]
    fn test_free_blocks_snapshot() {
        let mut heap = HeapManager::with_capacity(15).unwrap();
        let a = heap.allocate(2).unwrap();
        heap.allocate(2).unwrap();
        heap.deallocate(a).unwrap();

        let blocks = heap.free_blocks().unwrap();
        let summary: Vec<(usize, usize)> = blocks.iter().map(|b| (b.start, b.size)).collect();
        assert_eq!(summary, vec![(0, 3), (6, 9)]);
        assert_eq!(heap.largest_free().unwrap(), 9);
    }

    #[test]
    fn test_display_matches_dump_format() {
        let heap = HeapManager::with_capacity(5).unwrap();
        assert_eq!(format!("{}", heap), "memory = [5, -1, 0, 0, 0], freeStart = 0");
    }

    #[test]
    fn test_display_shows_null_when_exhausted() {
        let mut heap = HeapManager::with_capacity(3).unwrap();
        heap.allocate(2).unwrap();
        assert!(format!("{}", heap).ends_with("freeStart = NULL"));
    }

    #[test]
    fn test_stats_serializes_to_json() {
        let heap = HeapManager::with_capacity(15).unwrap();
        let value = serde_json::to_value(heap.stats().unwrap()).unwrap();
        assert_eq!(value["capacity"], 15);
        assert_eq!(value["free_cells"], 15);
        assert_eq!(value["free_blocks"][0]["start"], 0);
    }
}
