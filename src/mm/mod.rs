//! Memory management glue for the user-program layer
//!
//! Provides:
//! - Typed user virtual addresses
//! - The address-space interface the VM subsystem implements
//! - Kernel heap allocation (bare-metal builds)
//!
//! # Security Principles
//! - User addresses are never dereferenced without translation
//! - Unsafe code is minimal and audited

pub mod address;
#[cfg(target_os = "none")]
mod heap;
pub mod space;

pub use address::{VirtAddr, PAGE_SIZE};
#[cfg(target_os = "none")]
pub use heap::{heap_free, init_heap};
pub use space::{AddressSpace, Mapping, PageFlags};
