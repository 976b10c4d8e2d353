//! Heap configuration.

use crate::{align::ALIGNMENT, block::HEADER_SIZE};

/// Default arena size: 1 MiB.
pub const MAX_HEAP_SIZE: usize = 1024 * 1024;

/// Configuration for a [`FreeListAllocator`](crate::FreeListAllocator).
///
/// Fixed at construction. The arena is mapped with exactly
/// [`HeapConfig::arena_bytes`] bytes the first time memory is requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapConfig {
  /// Requested arena size in bytes, rounded up to the alignment quantum.
  pub arena_size: usize,
}

impl HeapConfig {
  /// Smallest arena that can hold a free block with a non-empty payload.
  pub const MIN_ARENA_SIZE: usize = HEADER_SIZE + ALIGNMENT;

  pub fn new(arena_size: usize) -> Self {
    Self { arena_size }
  }

  /// Bytes that will actually be mapped, or `None` when rounding up to the
  /// alignment quantum overflows.
  pub fn arena_bytes(&self) -> Option<usize> {
    self
      .arena_size
      .checked_add(ALIGNMENT - 1)
      .map(|size| size & !(ALIGNMENT - 1))
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new(MAX_HEAP_SIZE)
  }
}
