use std::mem;

use crate::align;

/// Link value stored in a header word when there is no neighbour.
const NIL: usize = usize::MAX;

/// Bytes reserved in front of every payload, free or allocated.
pub const HEADER_SIZE: usize = align!(mem::size_of::<Block>());

/// Block header as it is laid out inside the arena.
///
/// Links are arena offsets of other headers. They are only meaningful while
/// the block sits on the free list and are cleared once it is handed out.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
  size: usize,
  next: usize,
  prev: usize,
}

impl Block {
  pub fn new(
    size: usize,
    next: Option<usize>,
    prev: Option<usize>,
  ) -> Self {
    Self {
      size,
      next: next.unwrap_or(NIL),
      prev: prev.unwrap_or(NIL),
    }
  }

  /// Header of a block that is handed out to a caller.
  pub fn allocated(size: usize) -> Self {
    Self::new(size, None, None)
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn next(&self) -> Option<usize> {
    (self.next != NIL).then_some(self.next)
  }

  pub fn prev(&self) -> Option<usize> {
    (self.prev != NIL).then_some(self.prev)
  }

  pub fn set_size(
    &mut self,
    size: usize,
  ) {
    self.size = size;
  }

  pub fn set_next(
    &mut self,
    next: Option<usize>,
  ) {
    self.next = next.unwrap_or(NIL);
  }

  pub fn set_prev(
    &mut self,
    prev: Option<usize>,
  ) {
    self.prev = prev.unwrap_or(NIL);
  }

  /// Header plus payload.
  pub fn footprint(&self) -> usize {
    HEADER_SIZE + self.size
  }

  /// Offset of the block that physically follows the one at `offset`.
  pub fn end(
    &self,
    offset: usize,
  ) -> usize {
    offset + self.footprint()
  }

  pub fn is_unlinked(&self) -> bool {
    self.next == NIL && self.prev == NIL
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::align::ALIGNMENT;

  #[test]
  fn test_header_size_is_aligned() {
    assert_eq!(0, HEADER_SIZE % ALIGNMENT);
    assert!(HEADER_SIZE >= mem::size_of::<Block>());
  }

  #[test]
  fn test_links_round_trip_through_sentinel() {
    let mut block = Block::new(64, Some(128), None);

    assert_eq!(Some(128), block.next());
    assert_eq!(None, block.prev());
    assert!(!block.is_unlinked());

    block.set_next(None);
    assert!(block.is_unlinked());

    block.set_prev(Some(0));
    assert_eq!(Some(0), block.prev());
  }

  #[test]
  fn test_end_is_past_payload() {
    let block = Block::allocated(40);

    assert_eq!(HEADER_SIZE + 40, block.footprint());
    assert_eq!(100 + HEADER_SIZE + 40, block.end(100));
  }
}
