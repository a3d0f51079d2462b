//! Virtual Address Types
//!
//! Type-safe wrapper for addresses handed to the kernel by user code.
//!
//! # Security Properties
//! - User addresses cannot be dereferenced directly; they must be
//!   translated through the owning process's address space first
//! - Arithmetic is checked so a user-supplied length can never wrap an
//!   address back into range

use core::fmt;

use crate::config::USER_TOP;

/// Page size (4 KiB)
pub const PAGE_SIZE: usize = 4096;
/// Page size mask
pub const PAGE_MASK: usize = PAGE_SIZE - 1;
/// Bits to shift for page number
pub const PAGE_SHIFT: usize = 12;

/// A virtual memory address.
///
/// Values of this type usually come straight from an untrusted user
/// stack. Constructing one performs no validation; use
/// [`VirtAddr::is_user`] and the syscall validator before touching the
/// memory behind it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(usize);

impl VirtAddr {
    /// Create a new virtual address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check for the null address.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Check if this address lies in the user portion of the address space.
    ///
    /// The null page is never considered user memory.
    #[inline]
    pub const fn is_user(self) -> bool {
        self.0 != 0 && self.0 < USER_TOP
    }

    /// Check if the address is page-aligned.
    #[inline]
    pub const fn is_aligned(self) -> bool {
        self.0 & PAGE_MASK == 0
    }

    /// Align the address down to the nearest page boundary.
    #[inline]
    pub const fn align_down(self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }

    /// Get the virtual page number.
    #[inline]
    pub const fn page_number(self) -> usize {
        self.0 >> PAGE_SHIFT
    }

    /// Get the page offset (lowest 12 bits).
    #[inline]
    pub const fn page_offset(self) -> usize {
        self.0 & PAGE_MASK
    }

    /// Bytes left between this address and the end of its page.
    #[inline]
    pub const fn page_remaining(self) -> usize {
        PAGE_SIZE - self.page_offset()
    }

    /// Add an offset, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(self, offset: usize) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }
}

impl From<u32> for VirtAddr {
    fn from(word: u32) -> Self {
        Self(word as usize)
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#010x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
