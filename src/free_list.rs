//! Address-ordered doubly linked list threaded through free block headers.

use crate::{
  align::ALIGNMENT,
  arena::Arena,
  block::Block,
  error::InvariantViolation,
};

/// Head of the free list. The links themselves live in the arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FreeList {
  head: Option<usize>,
}

impl FreeList {
  /// A list holding the single block at `offset`.
  pub fn with_block(offset: usize) -> Self {
    Self { head: Some(offset) }
  }

  pub fn head(&self) -> Option<usize> {
    self.head
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  pub fn iter<'a>(
    &self,
    arena: &'a Arena,
  ) -> Iter<'a> {
    Iter {
      arena,
      cursor: self.head,
    }
  }

  /// Puts the header at `new` into the list slot currently held by `old`.
  ///
  /// The header at `new` must already carry `old`'s links.
  pub fn replace(
    &mut self,
    arena: &mut Arena,
    old: usize,
    new: usize,
  ) {
    let block = arena.header(new);

    match block.prev() {
      Some(prev) => self.update(arena, prev, |b| b.set_next(Some(new))),
      None => {
        debug_assert_eq!(self.head, Some(old));
        self.head = Some(new);
      }
    }

    if let Some(next) = block.next() {
      self.update(arena, next, |b| b.set_prev(Some(new)));
    }
  }

  /// Removes the block at `offset` from the list and clears its links.
  pub fn unlink(
    &mut self,
    arena: &mut Arena,
    offset: usize,
  ) {
    let mut block = arena.header(offset);

    match block.prev() {
      Some(prev) => self.update(arena, prev, |b| b.set_next(block.next())),
      None => {
        debug_assert_eq!(self.head, Some(offset));
        self.head = block.next();
      }
    }

    if let Some(next) = block.next() {
      self.update(arena, next, |b| b.set_prev(block.prev()));
    }

    block.set_next(None);
    block.set_prev(None);
    arena.write_header(offset, block);
  }

  /// Links `offset` in front of the listed block `before`.
  pub fn link_before(
    &mut self,
    arena: &mut Arena,
    offset: usize,
    before: usize,
  ) {
    let prev = arena.header(before).prev();

    self.update(arena, offset, |b| {
      b.set_prev(prev);
      b.set_next(Some(before));
    });
    self.update(arena, before, |b| b.set_prev(Some(offset)));

    match prev {
      Some(prev) => self.update(arena, prev, |b| b.set_next(Some(offset))),
      None => self.head = Some(offset),
    }
  }

  /// Links `offset` behind the listed block `after`, which must be the tail.
  pub fn link_after(
    &mut self,
    arena: &mut Arena,
    offset: usize,
    after: usize,
  ) {
    debug_assert!(arena.header(after).next().is_none());

    self.update(arena, offset, |b| {
      b.set_prev(Some(after));
      b.set_next(None);
    });
    self.update(arena, after, |b| b.set_next(Some(offset)));
  }

  /// Makes `offset` the only entry of an empty list.
  pub fn link_only(
    &mut self,
    arena: &mut Arena,
    offset: usize,
  ) {
    debug_assert!(self.is_empty());

    self.update(arena, offset, |b| {
      b.set_prev(None);
      b.set_next(None);
    });
    self.head = Some(offset);
  }

  /// Read-modify-write of a single header.
  pub fn update(
    &self,
    arena: &mut Arena,
    offset: usize,
    f: impl FnOnce(&mut Block),
  ) {
    let mut block = arena.header(offset);
    f(&mut block);
    arena.write_header(offset, block);
  }

  /// Verifies ordering, disjointness, coalescing and back links.
  pub fn check(
    &self,
    arena: &Arena,
  ) -> Result<(), InvariantViolation> {
    let mut prev: Option<(usize, Block)> = None;

    for (offset, block) in self.iter(arena) {
      let end = block.end(offset);

      if end > arena.len() {
        return Err(InvariantViolation::OutOfBounds { offset, end });
      }

      if block.size() % ALIGNMENT != 0 {
        return Err(InvariantViolation::Misaligned {
          offset,
          size: block.size(),
        });
      }

      let expected = prev.map(|(prev_offset, _)| prev_offset);
      if block.prev() != expected {
        return Err(InvariantViolation::BrokenBackLink {
          offset,
          expected,
          found: block.prev(),
        });
      }

      if let Some((prev_offset, prev_block)) = prev {
        let prev_end = prev_block.end(prev_offset);

        if offset <= prev_offset {
          return Err(InvariantViolation::Unordered {
            prev: prev_offset,
            next: offset,
          });
        }
        if prev_end > offset {
          return Err(InvariantViolation::Overlap {
            offset: prev_offset,
            next: offset,
          });
        }
        if prev_end == offset {
          return Err(InvariantViolation::Uncoalesced {
            offset: prev_offset,
            next: offset,
          });
        }
      }

      prev = Some((offset, block));
    }

    Ok(())
  }
}

/// Walks the free list from the head in address order.
pub struct Iter<'a> {
  arena: &'a Arena,
  cursor: Option<usize>,
}

impl Iterator for Iter<'_> {
  type Item = (usize, Block);

  fn next(&mut self) -> Option<Self::Item> {
    let offset = self.cursor?;
    let block = self.arena.header(offset);
    self.cursor = block.next();

    Some((offset, block))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::block::HEADER_SIZE;

  /// Writes unlinked headers at each `(offset, size)` and returns the arena.
  fn arena_with(blocks: &[(usize, usize)]) -> Arena {
    let mut arena = Arena::map(4096).unwrap();
    for &(offset, size) in blocks {
      arena.write_header(offset, Block::allocated(size));
    }
    arena
  }

  fn offsets(
    list: &FreeList,
    arena: &Arena,
  ) -> Vec<usize> {
    list.iter(arena).map(|(offset, _)| offset).collect()
  }

  #[test]
  fn test_link_before_head_moves_head() {
    let mut arena = arena_with(&[(0, 8), (512, 8)]);
    let mut list = FreeList::default();

    list.link_only(&mut arena, 512);
    list.link_before(&mut arena, 0, 512);

    assert_eq!(Some(0), list.head());
    assert_eq!(vec![0, 512], offsets(&list, &arena));
    assert_eq!(Some(0), arena.header(512).prev());
    assert_eq!(Ok(()), list.check(&arena));
  }

  #[test]
  fn test_link_before_middle_and_after_tail() {
    let mut arena = arena_with(&[(0, 8), (256, 8), (1024, 8)]);
    let mut list = FreeList::default();

    list.link_only(&mut arena, 0);
    list.link_after(&mut arena, 1024, 0);
    list.link_before(&mut arena, 256, 1024);

    assert_eq!(vec![0, 256, 1024], offsets(&list, &arena));
    assert_eq!(Some(256), arena.header(1024).prev());
    assert_eq!(Some(0), arena.header(256).prev());
    assert_eq!(Ok(()), list.check(&arena));
  }

  #[test]
  fn test_unlink_clears_links() {
    let mut arena = arena_with(&[(0, 8), (256, 8), (1024, 8)]);
    let mut list = FreeList::default();

    list.link_only(&mut arena, 0);
    list.link_after(&mut arena, 256, 0);
    list.link_after(&mut arena, 1024, 256);

    list.unlink(&mut arena, 256);
    assert_eq!(vec![0, 1024], offsets(&list, &arena));
    assert!(arena.header(256).is_unlinked());

    list.unlink(&mut arena, 0);
    assert_eq!(Some(1024), list.head());
    assert_eq!(None, arena.header(1024).prev());

    list.unlink(&mut arena, 1024);
    assert!(list.is_empty());
  }

  #[test]
  fn test_replace_takes_over_position() {
    let mut arena = arena_with(&[(0, 8), (256, 64), (1024, 8)]);
    let mut list = FreeList::default();

    list.link_only(&mut arena, 0);
    list.link_after(&mut arena, 256, 0);
    list.link_after(&mut arena, 1024, 256);

    let old = arena.header(256);
    arena.write_header(320, Block::new(8, old.next(), old.prev()));
    list.replace(&mut arena, 256, 320);

    assert_eq!(vec![0, 320, 1024], offsets(&list, &arena));
    assert_eq!(Some(320), arena.header(1024).prev());
  }

  #[test]
  fn test_check_reports_uncoalesced_neighbours() {
    let first = HEADER_SIZE + 8;
    let mut arena = arena_with(&[(0, 8), (first, 8)]);
    let mut list = FreeList::default();

    list.link_only(&mut arena, 0);
    list.link_after(&mut arena, first, 0);

    assert_eq!(
      Err(InvariantViolation::Uncoalesced {
        offset: 0,
        next: first
      }),
      list.check(&arena)
    );
  }

  #[test]
  fn test_check_reports_overlap() {
    let mut arena = arena_with(&[(0, 512), (256, 8)]);
    let mut list = FreeList::default();

    list.link_only(&mut arena, 0);
    list.link_after(&mut arena, 256, 0);

    assert_eq!(
      Err(InvariantViolation::Overlap {
        offset: 0,
        next: 256
      }),
      list.check(&arena)
    );
  }
}
