use std::{alloc::Layout, io::Read, ptr};

use rallocator::{FreeListAllocator, HeapConfig, print_alloc};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect the process with tools like `pmap` or
/// `gdb` between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints every free block of the arena.
fn print_free_list(
  label: &str,
  allocator: &FreeListAllocator,
) {
  println!("[{}] PID = {}, {:?}", label, std::process::id(), allocator.stats());
  print!("{}", allocator.dump());
}

fn main() {
  // A small arena keeps the offsets readable.
  let mut allocator = FreeListAllocator::with_config(HeapConfig::new(4096));

  // Nothing is mapped until the first request.
  print_free_list("start", &allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Allocate space for a u32. The arena is mapped now and its single
  //    free block is split.
  // --------------------------------------------------------------------
  let layout_u32 = Layout::new::<u32>();
  let first_block = allocator.allocate_layout(layout_u32);
  println!("\n[1] Allocate u32");
  print_alloc(layout_u32.size(), first_block);

  let Some(first_block) = first_block else {
    return;
  };

  unsafe {
    let first_ptr = first_block.cast::<u32>();
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());
  }
  print_free_list("after u32", &allocator);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Allocate 12 bytes. The request is rounded up to the word size.
  // --------------------------------------------------------------------
  let second_block = allocator.allocate(12);
  println!("\n[2] Allocate [u8; 12]");
  print_alloc(12, second_block);

  if let Some(second_block) = second_block {
    unsafe { ptr::write_bytes(second_block.as_ptr(), 0xAB, 12) };
    println!(
      "[2] Initialized second block with 0xAB, usable size = {}",
      unsafe { allocator.usable_size(second_block) }
    );
  }

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Allocate an array of u16 so there is a used block on both sides of
  //    the second one.
  // --------------------------------------------------------------------
  let layout_u16_array = Layout::array::<u16>(16).unwrap_or(layout_u32);
  let third_block = allocator.allocate_layout(layout_u16_array);
  println!("\n[3] Allocate [u16; 16]");
  print_alloc(layout_u16_array.size(), third_block);
  print_free_list("after [u16; 16]", &allocator);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Free the first block. It goes back on the free list in front of
  //    the remainder but cannot merge: its neighbour is still in use.
  // --------------------------------------------------------------------
  unsafe { allocator.free(first_block) };
  println!("\n[4] Deallocated first_block at {:?}", first_block);
  print_free_list("after free", &allocator);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Allocate 2 bytes. First fit picks the hole left by step 4.
  // --------------------------------------------------------------------
  let fourth_block = allocator.allocate(2);
  println!("\n[5] Allocate [u8; 2] (check reuse of freed block)");
  print_alloc(2, fourth_block);

  println!(
    "[5] fourth_block == first_block? {}",
    if fourth_block == Some(first_block) {
      "Yes, it reused the freed block"
    } else {
      "No, it allocated somewhere else"
    }
  );

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) Free everything. Neighbours merge until one block spans the arena.
  // --------------------------------------------------------------------
  for block in [fourth_block, second_block, third_block].into_iter().flatten() {
    unsafe { allocator.free(block) };
  }
  println!("\n[6] Freed all blocks");
  print_free_list("end", &allocator);

  // --------------------------------------------------------------------
  // 7) Ask for more than the arena holds.
  // --------------------------------------------------------------------
  match allocator.try_allocate(64 * 1024) {
    Ok(block) => print_alloc(64 * 1024, Some(block)),
    Err(err) => println!("\n[7] Allocate 64 KiB: {}", err),
  }

  println!("\n[8] End of example. The arena is unmapped when the allocator is dropped.");
}
