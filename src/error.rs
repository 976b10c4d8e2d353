//! Allocator error types.

use std::error::Error;
use std::fmt;

/// Reasons an allocation request can fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
  /// The operating system refused to map the arena.
  ArenaInit {
    /// Bytes requested from `mmap`.
    size: usize,
    /// Raw OS error code, when one was reported.
    errno: Option<i32>,
  },
  /// The configured arena cannot even hold a single block header.
  ArenaTooSmall {
    /// Configured arena size in bytes.
    size: usize,
    /// Smallest usable arena size in bytes.
    minimum: usize,
  },
  /// The configured arena size overflows when rounded to the alignment
  /// quantum.
  ArenaTooLarge {
    /// Configured arena size in bytes.
    size: usize,
  },
  /// Allocations of zero bytes are not supported.
  ZeroSize,
  /// The requested alignment exceeds the allocator's alignment quantum.
  UnsupportedAlignment {
    /// Alignment the caller asked for.
    requested: usize,
    /// Alignment every payload is guaranteed to have.
    supported: usize,
  },
  /// No free block is large enough for the request.
  OutOfMemory {
    /// Block footprint needed, header included. Saturates at `usize::MAX`
    /// for requests too large to round.
    requested: usize,
    /// Footprint of the largest free block, header included, if any.
    largest_free: Option<usize>,
  },
}

impl fmt::Display for AllocError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::ArenaInit { size, errno } => match errno {
        Some(errno) => write!(f, "failed to map {size} byte arena (os error {errno})"),
        None => write!(f, "failed to map {size} byte arena"),
      },
      Self::ArenaTooSmall { size, minimum } => {
        write!(f, "arena of {size} bytes is too small, need at least {minimum}")
      }
      Self::ArenaTooLarge { size } => {
        write!(f, "arena of {size} bytes cannot be aligned to the word size")
      }
      Self::ZeroSize => write!(f, "zero-sized allocation"),
      Self::UnsupportedAlignment {
        requested,
        supported,
      } => {
        write!(f, "alignment {requested} exceeds supported alignment {supported}")
      }
      Self::OutOfMemory {
        requested,
        largest_free,
      } => match largest_free {
        Some(largest) => write!(
          f,
          "out of memory: need {requested} bytes, largest free block is {largest} bytes"
        ),
        None => write!(f, "out of memory: need {requested} bytes, free list is empty"),
      },
    }
  }
}

impl Error for AllocError {}

/// A broken free-list invariant, reported by
/// [`FreeListAllocator::check_invariants`](crate::FreeListAllocator::check_invariants).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
  /// Two list neighbours are not in strictly ascending address order.
  Unordered { prev: usize, next: usize },
  /// A free block overlaps the one that follows it.
  Overlap { offset: usize, next: usize },
  /// Two list neighbours touch in memory and should have been merged.
  Uncoalesced { offset: usize, next: usize },
  /// A back link does not point at the list predecessor.
  BrokenBackLink {
    offset: usize,
    expected: Option<usize>,
    found: Option<usize>,
  },
  /// A block runs past the end of the arena.
  OutOfBounds { offset: usize, end: usize },
  /// A block's payload size is not a multiple of the alignment quantum.
  Misaligned { offset: usize, size: usize },
  /// Walking the heap by footprints does not land exactly on its end.
  Conservation { accounted: usize, usable: usize },
}

impl fmt::Display for InvariantViolation {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::Unordered { prev, next } => {
        write!(f, "free list out of order: {prev:#x} precedes {next:#x}")
      }
      Self::Overlap { offset, next } => {
        write!(f, "free block {offset:#x} overlaps {next:#x}")
      }
      Self::Uncoalesced { offset, next } => {
        write!(f, "adjacent free blocks {offset:#x} and {next:#x} were not merged")
      }
      Self::BrokenBackLink {
        offset,
        expected,
        found,
      } => {
        write!(f, "block {offset:#x} has prev {found:?}, expected {expected:?}")
      }
      Self::OutOfBounds { offset, end } => {
        write!(f, "block {offset:#x} ends at {end:#x}, past the arena")
      }
      Self::Misaligned { offset, size } => {
        write!(f, "block {offset:#x} has unaligned size {size}")
      }
      Self::Conservation { accounted, usable } => {
        write!(f, "blocks cover {accounted} bytes of a {usable} byte arena")
      }
    }
  }
}

impl Error for InvariantViolation {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_out_of_memory_message() {
    let err = AllocError::OutOfMemory {
      requested: 128,
      largest_free: Some(64),
    };

    assert_eq!(
      "out of memory: need 128 bytes, largest free block is 64 bytes",
      err.to_string()
    );
  }

  #[test]
  fn test_arena_init_message() {
    let err = AllocError::ArenaInit {
      size: 4096,
      errno: Some(12),
    };

    assert_eq!("failed to map 4096 byte arena (os error 12)", err.to_string());
  }

  #[test]
  fn test_violation_message() {
    let err = InvariantViolation::Uncoalesced {
      offset: 0x20,
      next: 0x40,
    };

    assert_eq!("adjacent free blocks 0x20 and 0x40 were not merged", err.to_string());
  }
}
