//! The mapped region backing every block.
//!
//! All raw pointer arithmetic in the crate lives here. The rest of the
//! allocator speaks in byte offsets from the arena base and only ever sees a
//! pointer when handing a payload to, or taking one back from, a caller.

use std::{io, ptr, ptr::NonNull};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE};
use log::{debug, error};

use crate::{
  block::{Block, HEADER_SIZE},
  error::AllocError,
};

unsafe fn os_mmap(size: usize) -> io::Result<NonNull<u8>> {
  let address = unsafe {
    libc::mmap(
      ptr::null_mut(),
      size,
      PROT_READ | PROT_WRITE,
      MAP_PRIVATE | MAP_ANONYMOUS,
      -1,
      0,
    )
  };

  if address == MAP_FAILED {
    return Err(io::Error::last_os_error());
  }

  NonNull::new(address as *mut u8).ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))
}

unsafe fn os_munmap(
  address: NonNull<u8>,
  size: usize,
) {
  unsafe { libc::munmap(address.as_ptr().cast(), size) };
}

pub struct Arena {
  base: NonNull<u8>,
  len: usize,
}

impl Arena {
  /// Maps `len` bytes of anonymous read/write memory.
  pub fn map(len: usize) -> Result<Self, AllocError> {
    match unsafe { os_mmap(len) } {
      Ok(base) => {
        debug!("mapped {} byte arena at {:?}", len, base);
        Ok(Self { base, len })
      }
      Err(err) => {
        error!("arena mmap of {} bytes failed: {}", len, err);
        Err(AllocError::ArenaInit {
          size: len,
          errno: err.raw_os_error(),
        })
      }
    }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  pub fn header(
    &self,
    offset: usize,
  ) -> Block {
    self.check_header_bounds(offset);
    unsafe { ptr::read(self.base.as_ptr().add(offset) as *const Block) }
  }

  pub fn write_header(
    &mut self,
    offset: usize,
    block: Block,
  ) {
    self.check_header_bounds(offset);
    unsafe { ptr::write(self.base.as_ptr().add(offset) as *mut Block, block) }
  }

  /// Pointer to the first payload byte of the block at `offset`.
  pub fn payload(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    debug_assert!(offset + HEADER_SIZE <= self.len);
    unsafe { self.base.add(offset + HEADER_SIZE) }
  }

  /// Header offset of the block whose payload starts at `payload`.
  ///
  /// The pointer must have come from [`Arena::payload`] on this arena.
  pub fn header_offset(
    &self,
    payload: NonNull<u8>,
  ) -> usize {
    let address = payload.as_ptr() as usize;
    let base = self.base.as_ptr() as usize;
    debug_assert!(address >= base + HEADER_SIZE && address < base + self.len);

    address - base - HEADER_SIZE
  }

  pub fn contains(
    &self,
    address: NonNull<u8>,
  ) -> bool {
    let address = address.as_ptr() as usize;
    let base = self.base.as_ptr() as usize;

    address >= base && address < base + self.len
  }

  fn check_header_bounds(
    &self,
    offset: usize,
  ) {
    debug_assert!(
      offset + HEADER_SIZE <= self.len,
      "header at {:#x} runs past the {} byte arena",
      offset,
      self.len
    );
    debug_assert!(
      offset % core::mem::align_of::<Block>() == 0,
      "header at {:#x} is misaligned",
      offset
    );
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    unsafe { os_munmap(self.base, self.len) };
  }
}
