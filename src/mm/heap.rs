//! Kernel Heap Allocator
//!
//! Uses `linked_list_allocator` for heap management on bare-metal builds.
//! Every fd-table entry, child record and bounce buffer in this crate is
//! allocated from here.
//!
//! # Security Considerations
//! - Heap is initialized once during boot
//! - All allocations go through Rust's global allocator
//! - linked_list_allocator provides bounds checking

use core::sync::atomic::{AtomicBool, Ordering};

use linked_list_allocator::LockedHeap;

/// Global heap allocator instance
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Heap size used when the boot code does not supply a region (256 KiB)
const DEFAULT_HEAP_SIZE: usize = 256 * 1024;

/// Fallback heap region
static mut HEAP_MEMORY: [u8; DEFAULT_HEAP_SIZE] = [0; DEFAULT_HEAP_SIZE];

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize the kernel heap from the built-in static region.
///
/// Calling this more than once is a no-op.
pub fn init_heap() {
    if INITIALIZED.swap(true, Ordering::AcqRel) {
        return;
    }
    // SAFETY:
    // - HEAP_MEMORY is a valid static array, only ever handed out here
    // - The INITIALIZED flag guarantees a single initialization
    unsafe {
        let heap_start = core::ptr::addr_of_mut!(HEAP_MEMORY) as *mut u8;
        ALLOCATOR.lock().init(heap_start, DEFAULT_HEAP_SIZE);
    }
    log::debug!(
        "[HEAP] {} KiB at {:p}",
        DEFAULT_HEAP_SIZE / 1024,
        core::ptr::addr_of!(HEAP_MEMORY)
    );
}

/// Bytes still available on the kernel heap.
pub fn heap_free() -> usize {
    ALLOCATOR.lock().free()
}
