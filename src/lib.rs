//! # rallocator - A Fixed-Arena Free-List Allocator
//!
//! This crate provides a **first-fit free-list allocator** over one fixed-size
//! memory region mapped from the operating system with `mmap(2)`.
//!
//! ## Overview
//!
//! Every block, free or allocated, starts with a header. Free blocks are
//! chained through their headers into a doubly linked list kept in ascending
//! address order:
//!
//! ```text
//!   Arena (mapped once, never grows):
//!
//!   ┌────┬──────┬────┬────────┬────┬──────┬────┬─────────────────────────┐
//!   │ H  │ used │ H  │  free  │ H  │ used │ H  │          free           │
//!   └────┴──────┴────┴────────┴────┴──────┴────┴─────────────────────────┘
//!                ▲                           ▲
//!   head ────────┘ ─────── next ───────────► │
//!                  ◄────── prev ──────────── ┘
//! ```
//!
//! - **Allocate**: walk the list from the head and take the first block that
//!   fits. If enough is left over, the tail becomes a new free block that
//!   takes the old block's place in the list.
//! - **Free**: link the block back in address order, then merge it with the
//!   free block directly before and/or after it in memory.
//!
//! ## Crate Structure
//!
//! ```text
//!   rallocator
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── arena      - mmap-backed region, header reads and writes (internal)
//!   ├── block      - Block header layout (internal)
//!   ├── config     - HeapConfig
//!   ├── error      - AllocError, InvariantViolation
//!   ├── free_list  - Address-ordered list threaded through headers (internal)
//!   └── heap       - FreeListAllocator implementation
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rallocator::FreeListAllocator;
//!
//! let mut allocator = FreeListAllocator::new();
//!
//! let ptr = allocator.allocate(64).expect("arena has room");
//!
//! unsafe {
//!     ptr.as_ptr().write_bytes(0xAB, 64);
//!     allocator.free(ptr);
//! }
//!
//! assert_eq!(1, allocator.free_blocks().len());
//! ```
//!
//! ## Block Layout
//!
//! ```text
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size: N         │  │  ┌──────────────────────────┐  │
//!   │  │ next: off/none  │  │  │                          │  │
//!   │  │ prev: off/none  │  │  │     N bytes usable       │  │
//!   │  └─────────────────┘  │  │                          │  │
//!   │     HEADER_SIZE       │  └──────────────────────────┘  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! Links are byte offsets from the arena base. They are only set while the
//! block is free.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: the allocator is neither `Send` nor `Sync`
//! - **Fixed capacity**: the arena is sized by [`HeapConfig`] and never grows
//! - **No misuse detection**: freeing a foreign or already freed pointer is
//!   undefined behaviour
//! - **Unix-only**: requires `libc` and `mmap` (POSIX systems)
//!
//! ## Safety
//!
//! Allocation is safe. Freeing takes a raw payload pointer and is `unsafe`:
//! the caller guarantees the pointer is live and came from the same
//! allocator.

pub mod align;
mod arena;
mod block;
pub mod config;
pub mod error;
mod free_list;
mod heap;

pub use align::ALIGNMENT;
pub use block::HEADER_SIZE;
pub use config::{HeapConfig, MAX_HEAP_SIZE};
pub use error::{AllocError, InvariantViolation};
pub use heap::{FreeBlockInfo, FreeListAllocator, FreeListDump, HeapStats, print_alloc};
