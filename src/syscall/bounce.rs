//! Kernel Bounce Buffers
//!
//! File and console data moving between user memory and the filesystem
//! is staged in kernel heap buffers. Those buffers are wiped before the
//! memory goes back to the allocator so one process's data never shows up
//! in a later allocation.
//!
//! # Design
//! - Volatile writes so the wipe cannot be optimized away
//! - Compiler fence after the wipe
//! - Wipe runs on drop, including early returns

use alloc::vec;
use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};
use core::ptr;
use core::sync::atomic::{compiler_fence, Ordering};

/// Heap buffer that zeroes itself on drop.
pub struct KernelBuffer {
    bytes: Vec<u8>,
}

impl KernelBuffer {
    /// Allocate `len` zeroed bytes.
    pub fn zeroed(len: usize) -> Self {
        Self { bytes: vec![0; len] }
    }

    /// Shorten the buffer, wiping the dropped tail.
    pub fn truncate(&mut self, len: usize) {
        if len < self.bytes.len() {
            wipe(&mut self.bytes[len..]);
            self.bytes.truncate(len);
        }
    }

    /// Overwrite the contents with zeros.
    pub fn wipe(&mut self) {
        wipe(&mut self.bytes);
    }
}

fn wipe(bytes: &mut [u8]) {
    for byte in bytes.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference
        unsafe { ptr::write_volatile(byte, 0) };
    }
    compiler_fence(Ordering::SeqCst);
}

impl Deref for KernelBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for KernelBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for KernelBuffer {
    fn drop(&mut self) {
        wipe(&mut self.bytes);
    }
}

impl core::fmt::Debug for KernelBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Contents are user data; never print them
        write!(f, "KernelBuffer({} bytes)", self.bytes.len())
    }
}
