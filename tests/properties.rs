use std::ptr::NonNull;

use proptest::prelude::*;
use rallocator::{ALIGNMENT, FreeListAllocator, HEADER_SIZE, HeapConfig, align};

const ARENA: usize = 16 * 1024;

#[derive(Clone, Debug)]
enum Op {
  Allocate(usize),
  Free(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
  prop_oneof![
    3 => (1usize..1500).prop_map(Op::Allocate),
    2 => any::<usize>().prop_map(Op::Free),
  ]
}

proptest! {
  #[test]
  fn heap_invariants_hold_across_random_sequences(ops in prop::collection::vec(arb_op(), 1..200)) {
    let mut allocator = FreeListAllocator::with_config(HeapConfig::new(ARENA));
    let mut live: Vec<(NonNull<u8>, usize)> = Vec::new();

    for op in ops {
      match op {
        Op::Allocate(size) => {
          let before = allocator.free_blocks();

          match allocator.allocate(size) {
            Some(ptr) => {
              prop_assert_eq!(0, ptr.as_ptr() as usize % ALIGNMENT);
              unsafe { ptr.as_ptr().write_bytes(0x5A, size) };
              live.push((ptr, size));
            }
            None => {
              let needed = align!(size) + HEADER_SIZE;
              prop_assert!(before.iter().all(|block| block.footprint() < needed));
              prop_assert_eq!(before, allocator.free_blocks());
            }
          }
        }
        Op::Free(index) => {
          if live.is_empty() {
            continue;
          }
          let (ptr, _) = live.swap_remove(index % live.len());
          unsafe { allocator.free(ptr) };
        }
      }

      prop_assert_eq!(Ok(()), allocator.check_invariants());

      let stats = allocator.stats();
      let live_bytes: usize = live
        .iter()
        .map(|&(ptr, _)| unsafe { allocator.usable_size(ptr) } + HEADER_SIZE)
        .sum();
      prop_assert_eq!(ARENA, stats.free_bytes + live_bytes);

      let blocks = allocator.free_blocks();
      for pair in blocks.windows(2) {
        prop_assert!(pair[0].offset < pair[1].offset);
        prop_assert!(pair[0].offset + pair[0].footprint() < pair[1].offset);
      }
    }

    // Live payloads were never overwritten by allocator bookkeeping.
    for &(ptr, size) in &live {
      for i in 0..size {
        prop_assert_eq!(0x5A, unsafe { *ptr.as_ptr().add(i) });
      }
    }

    for (ptr, _) in live.drain(..) {
      unsafe { allocator.free(ptr) };
    }
    let blocks = allocator.free_blocks();
    prop_assert!(blocks.len() <= 1);
    if let Some(block) = blocks.first() {
      prop_assert_eq!(ARENA, block.footprint());
    }
  }
}
