//! Per-Process Address Space Interface
//!
//! The page tables themselves belong to the VM subsystem. The syscall
//! layer only needs to ask one question of them: "which kernel-accessible
//! frame backs this user page, and with which permissions?"

use core::ptr::NonNull;

use bitflags::bitflags;

use super::address::VirtAddr;

bitflags! {
    /// Permission bits of a user page mapping.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PageFlags: u32 {
        /// The page is mapped.
        const PRESENT = 1 << 0;
        /// User code may write to the page.
        const WRITABLE = 1 << 1;
        /// User code may access the page at all.
        const USER = 1 << 2;
    }
}

impl PageFlags {
    /// Flags for an ordinary read-only user page.
    pub const USER_RO: Self = Self::PRESENT.union(Self::USER);
    /// Flags for an ordinary read/write user page.
    pub const USER_RW: Self = Self::USER_RO.union(Self::WRITABLE);
}

/// Result of translating one user page.
#[derive(Clone, Copy, Debug)]
pub struct Mapping {
    /// Kernel pointer to the first byte of the backing frame.
    pub frame: NonNull<u8>,
    /// Permissions of the mapping.
    pub flags: PageFlags,
}

/// A process's view of user memory.
///
/// # Contract
/// A returned `frame` must stay valid for `PAGE_SIZE` bytes for as long as
/// the page remains mapped. The syscall layer only translates pages of the
/// process whose thread is currently running, so nothing else unmaps them
/// underneath it.
pub trait AddressSpace: Send + Sync {
    /// Translate the page containing `page`, or `None` if it is unmapped.
    fn translate(&self, page: VirtAddr) -> Option<Mapping>;
}
