use std::{alloc::Layout, fmt, ptr::NonNull};

use log::{debug, log_enabled, trace, warn, Level};

use crate::{
  align,
  align::ALIGNMENT,
  arena::Arena,
  block::{Block, HEADER_SIZE},
  config::HeapConfig,
  error::{AllocError, InvariantViolation},
  free_list::FreeList,
};

pub fn print_alloc(
  size: usize,
  addr: Option<NonNull<u8>>,
) {
  match addr {
    Some(addr) => println!("Allocated {} bytes, address = {:?}", size, addr),
    None => println!("Allocation of {} bytes failed", size),
  }
}

/// Snapshot of one free block, as seen by [`FreeListAllocator::free_blocks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeBlockInfo {
  /// Offset of the header from the arena base.
  pub offset: usize,
  /// Payload bytes, header excluded.
  pub size: usize,
  pub next: Option<usize>,
  pub prev: Option<usize>,
}

impl FreeBlockInfo {
  pub fn footprint(&self) -> usize {
    HEADER_SIZE + self.size
  }
}

/// Aggregate view of the heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
  /// Mapped arena size, zero before the first allocation.
  pub arena_size: usize,
  pub free_blocks: usize,
  /// Header plus payload bytes of all free blocks.
  pub free_bytes: usize,
  /// Header plus payload bytes of all allocated blocks.
  pub allocated_bytes: usize,
  /// Header plus payload bytes of the largest free block.
  pub largest_free: Option<usize>,
}

/// Free list listing, one block per line.
pub struct FreeListDump(pub Vec<FreeBlockInfo>);

impl fmt::Display for FreeListDump {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    if self.0.is_empty() {
      return writeln!(f, "free list empty");
    }

    for block in &self.0 {
      writeln!(
        f,
        "free block offset={:#x} size={} prev={:?} next={:?}",
        block.offset, block.size, block.prev, block.next
      )?;
    }

    Ok(())
  }
}

/// First-fit allocator over a single fixed arena.
///
/// The arena is mapped on the first allocation and never grows. Free blocks
/// are kept in an address-ordered list whose links live in the block headers
/// themselves; freed blocks are merged with free neighbours immediately.
///
/// Not thread-safe: the type holds a raw arena pointer and is neither `Send`
/// nor `Sync`.
pub struct FreeListAllocator {
  config: HeapConfig,
  arena: Option<Arena>,
  free_list: FreeList,
}

impl FreeListAllocator {
  pub fn new() -> Self {
    Self::with_config(HeapConfig::default())
  }

  pub fn with_config(config: HeapConfig) -> Self {
    Self {
      config,
      arena: None,
      free_list: FreeList::default(),
    }
  }

  pub fn config(&self) -> HeapConfig {
    self.config
  }

  /// Whether the arena has been mapped yet.
  pub fn is_initialized(&self) -> bool {
    self.arena.is_some()
  }

  /// Allocates `size` bytes, returning `None` when the request cannot be met.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    self.try_allocate(size).ok()
  }

  /// Allocates memory for `layout`, returning `None` when the request cannot
  /// be met.
  pub fn allocate_layout(
    &mut self,
    layout: Layout,
  ) -> Option<NonNull<u8>> {
    self.try_allocate_layout(layout).ok()
  }

  /// Allocates memory for `layout`, reporting why the request failed.
  ///
  /// Every payload is aligned to [`ALIGNMENT`]; stricter alignments are
  /// refused.
  pub fn try_allocate_layout(
    &mut self,
    layout: Layout,
  ) -> Result<NonNull<u8>, AllocError> {
    if layout.align() > ALIGNMENT {
      warn!(
        "refusing layout with alignment {} (supported {})",
        layout.align(),
        ALIGNMENT
      );
      return Err(AllocError::UnsupportedAlignment {
        requested: layout.align(),
        supported: ALIGNMENT,
      });
    }

    self.try_allocate(layout.size())
  }

  /// Allocates `size` bytes, reporting why the request failed.
  pub fn try_allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    if size == 0 {
      return Err(AllocError::ZeroSize);
    }

    let arena = match self.arena.take() {
      Some(arena) => arena,
      None => Self::init(self.config, &mut self.free_list)?,
    };
    let arena = self.arena.insert(arena);
    let free_list = &mut self.free_list;

    let requested_total = Self::request_footprint(size);

    let Some(offset) = Self::search(free_list, arena, requested_total) else {
      return Err(Self::out_of_memory(free_list, arena, requested_total));
    };

    Self::allocate_with_split(free_list, arena, offset, requested_total);
    trace!(
      "allocated {} bytes at offset {:#x} (block size {})",
      size,
      offset,
      arena.header(offset).size()
    );

    let payload = arena.payload(offset);
    debug_assert_eq!(Ok(()), self.check_invariants());

    Ok(payload)
  }

  /// Returns a block to the free list and merges it with free neighbours.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by [`allocate`](Self::allocate) (or one of
  /// its variants) on this allocator and must not have been freed since.
  pub unsafe fn free(
    &mut self,
    ptr: NonNull<u8>,
  ) {
    let Self {
      arena, free_list, ..
    } = self;
    let Some(arena) = arena.as_mut() else {
      return;
    };
    debug_assert!(arena.contains(ptr), "{:?} is outside the arena", ptr);

    let offset = arena.header_offset(ptr);
    trace!(
      "freeing offset {:#x} (block size {})",
      offset,
      arena.header(offset).size()
    );

    Self::insert(free_list, arena, offset);
    Self::coalesce(arena, offset);

    debug_assert_eq!(Ok(()), self.check_invariants());
    self.log_free_list();
  }

  /// Payload capacity of a live allocation, which may exceed what was asked
  /// for because of alignment and unsplittable padding.
  ///
  /// # Safety
  ///
  /// Same contract as [`free`](Self::free).
  pub unsafe fn usable_size(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    match &self.arena {
      Some(arena) => arena.header(arena.header_offset(ptr)).size(),
      None => 0,
    }
  }

  /// Maps the arena and makes `free_list` hold one free block spanning all
  /// of it. Leaves `free_list` untouched on failure.
  fn init(
    config: HeapConfig,
    free_list: &mut FreeList,
  ) -> Result<Arena, AllocError> {
    let Some(size) = config.arena_bytes() else {
      return Err(AllocError::ArenaTooLarge {
        size: config.arena_size,
      });
    };
    if size < HeapConfig::MIN_ARENA_SIZE {
      return Err(AllocError::ArenaTooSmall {
        size,
        minimum: HeapConfig::MIN_ARENA_SIZE,
      });
    }

    let mut arena = Arena::map(size)?;
    arena.write_header(0, Block::new(size - HEADER_SIZE, None, None));
    *free_list = FreeList::with_block(0);
    debug!(
      "free list size:{}, head:{:#x}, prev:None, next:None",
      size - HEADER_SIZE,
      0
    );

    Ok(arena)
  }

  /// Header plus aligned payload for a `size` byte request, saturating at
  /// `usize::MAX` so oversized requests simply find no block.
  fn request_footprint(size: usize) -> usize {
    match size.checked_add(ALIGNMENT - 1 + HEADER_SIZE) {
      Some(_) => align!(size) + HEADER_SIZE,
      None => usize::MAX,
    }
  }

  /// First block, in address order, whose footprint covers `requested_total`.
  fn search(
    free_list: &FreeList,
    arena: &Arena,
    requested_total: usize,
  ) -> Option<usize> {
    debug_assert!(
      requested_total >= HEADER_SIZE,
      "request block size must be no smaller than header size"
    );

    free_list
      .iter(arena)
      .find(|(_, block)| block.footprint() >= requested_total)
      .map(|(offset, _)| offset)
  }

  /// Hands out the block at `offset`, splitting off the tail as a new free
  /// block when it can hold a header-sized payload.
  fn allocate_with_split(
    free_list: &mut FreeList,
    arena: &mut Arena,
    offset: usize,
    requested_total: usize,
  ) {
    let block = arena.header(offset);

    if block.size() >= requested_total + HEADER_SIZE {
      let remainder = offset + requested_total;
      arena.write_header(
        remainder,
        Block::new(block.size() - requested_total, block.next(), block.prev()),
      );
      free_list.replace(arena, offset, remainder);
      arena.write_header(offset, Block::allocated(requested_total - HEADER_SIZE));
    } else {
      free_list.unlink(arena, offset);
    }
  }

  /// Links the block at `offset` in front of the first free block with a
  /// higher address, or at the tail when there is none.
  fn insert(
    free_list: &mut FreeList,
    arena: &mut Arena,
    offset: usize,
  ) {
    let mut tail = None;
    let mut successor = None;

    for (candidate, _) in free_list.iter(arena) {
      if candidate > offset {
        successor = Some(candidate);
        break;
      }
      tail = Some(candidate);
    }

    match (successor, tail) {
      (Some(successor), _) => free_list.link_before(arena, offset, successor),
      (None, Some(tail)) => free_list.link_after(arena, offset, tail),
      (None, None) => free_list.link_only(arena, offset),
    }
  }

  /// Merges the freshly linked block at `offset` with its list neighbours
  /// when they are also its memory neighbours.
  fn coalesce(
    arena: &mut Arena,
    offset: usize,
  ) {
    let block = arena.header(offset);

    let successor = block.next().filter(|&next| block.end(offset) == next);
    let predecessor = block
      .prev()
      .filter(|&prev| arena.header(prev).end(prev) == offset);

    // The surviving header and the last block folded into it.
    let (survivor, last) = match (predecessor, successor) {
      (None, None) => return,
      (None, Some(next)) => (offset, next),
      (Some(prev), None) => (prev, offset),
      (Some(prev), Some(next)) => (prev, next),
    };

    let absorbed = arena.header(last);
    let mut merged = arena.header(survivor);
    merged.set_size(absorbed.end(last) - survivor - HEADER_SIZE);
    merged.set_next(absorbed.next());
    arena.write_header(survivor, merged);

    if let Some(next) = absorbed.next() {
      let mut after = arena.header(next);
      after.set_prev(Some(survivor));
      arena.write_header(next, after);
    }
  }

  fn out_of_memory(
    free_list: &FreeList,
    arena: &Arena,
    requested: usize,
  ) -> AllocError {
    let largest_free = free_list
      .iter(arena)
      .map(|(_, block)| block.footprint())
      .max();
    warn!(
      "out of memory: need {} bytes, largest free block {:?}",
      requested, largest_free
    );

    AllocError::OutOfMemory {
      requested,
      largest_free,
    }
  }

  /// Every free block in address order.
  pub fn free_blocks(&self) -> Vec<FreeBlockInfo> {
    let Some(arena) = &self.arena else {
      return Vec::new();
    };

    self
      .free_list
      .iter(arena)
      .map(|(offset, block)| FreeBlockInfo {
        offset,
        size: block.size(),
        next: block.next(),
        prev: block.prev(),
      })
      .collect()
  }

  pub fn dump(&self) -> FreeListDump {
    FreeListDump(self.free_blocks())
  }

  /// Emits the free list at debug level.
  pub fn log_free_list(&self) {
    if !log_enabled!(Level::Debug) {
      return;
    }

    for block in self.free_blocks() {
      debug!(
        "free list size:{}, head:{:#x}, prev:{:?}, next:{:?}",
        block.size, block.offset, block.prev, block.next
      );
    }
  }

  pub fn stats(&self) -> HeapStats {
    let Some(arena) = &self.arena else {
      return HeapStats::default();
    };

    let blocks = self.free_blocks();
    let free_bytes: usize = blocks.iter().map(FreeBlockInfo::footprint).sum();

    HeapStats {
      arena_size: arena.len(),
      free_blocks: blocks.len(),
      free_bytes,
      allocated_bytes: arena.len() - free_bytes,
      largest_free: blocks.iter().map(FreeBlockInfo::footprint).max(),
    }
  }

  /// Audits the free list and walks the whole arena block by block.
  ///
  /// Checks ordering, disjointness and coalescing of the free list, that
  /// allocated blocks carry no links, and that block footprints tile the
  /// arena exactly.
  pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
    let Some(arena) = &self.arena else {
      return Ok(());
    };

    self.free_list.check(arena)?;

    let mut free = self.free_list.iter(arena).peekable();
    let mut offset = 0;

    while offset < arena.len() {
      if offset + HEADER_SIZE > arena.len() {
        return Err(InvariantViolation::Conservation {
          accounted: offset + HEADER_SIZE,
          usable: arena.len(),
        });
      }

      let block = arena.header(offset);

      if free.peek().is_some_and(|&(free_offset, _)| free_offset == offset) {
        free.next();
      } else if !block.is_unlinked() {
        return Err(InvariantViolation::BrokenBackLink {
          offset,
          expected: None,
          found: block.prev().or(block.next()),
        });
      }

      offset = block.end(offset);
    }

    if offset != arena.len() {
      return Err(InvariantViolation::Conservation {
        accounted: offset,
        usable: arena.len(),
      });
    }

    // A free block the walk never landed on is not a real block boundary.
    if let Some((offset, block)) = free.next() {
      return Err(InvariantViolation::OutOfBounds {
        offset,
        end: block.end(offset),
      });
    }

    Ok(())
  }
}

impl Default for FreeListAllocator {
  fn default() -> Self {
    Self::new()
  }
}
