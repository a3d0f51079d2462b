//! System Call Input Validation
//!
//! Every pointer handed to the kernel by user code passes through here
//! before a single byte behind it is touched.
//!
//! # Security Principles
//! - Validate ALL inputs before use
//! - Fail-secure: deny by default
//! - Prevent common vulnerabilities:
//!   - Buffer overflows (every page of a range is checked up front)
//!   - Runaway strings (validated byte by byte up to the terminator)
//!   - TOCTOU races (data is copied into kernel buffers)
//!   - Null pointer dereference (the null page is never user memory)

use alloc::string::String;
use alloc::vec::Vec;

use crate::config::{MAX_USER_STRING, WORD_SIZE};
use crate::mm::{AddressSpace, PageFlags, VirtAddr, PAGE_SIZE};

use super::bounce::KernelBuffer;
use super::error::{SyscallError, SyscallResult};

/// Kernel pointer to the byte at `va`, checking user-accessibility.
fn translate(space: &dyn AddressSpace, va: VirtAddr, write: bool) -> SyscallResult<*mut u8> {
    if !va.is_user() {
        return Err(SyscallError::BadAddress);
    }
    let mapping = space
        .translate(va.align_down())
        .ok_or(SyscallError::BadAddress)?;
    let required = if write {
        PageFlags::USER_RW
    } else {
        PageFlags::USER_RO
    };
    if !mapping.flags.contains(required) {
        return Err(SyscallError::BadAddress);
    }
    // SAFETY: page_offset() < PAGE_SIZE and the frame spans a full page
    Ok(unsafe { mapping.frame.as_ptr().add(va.page_offset()) })
}

/// Check every page of `[start, start + len)`.
fn check_range(
    space: &dyn AddressSpace,
    start: VirtAddr,
    len: usize,
    write: bool,
) -> SyscallResult<()> {
    if len == 0 {
        return if start.is_user() {
            Ok(())
        } else {
            Err(SyscallError::BadAddress)
        };
    }

    let last = start
        .checked_add(len - 1)
        .ok_or(SyscallError::BadAddress)?;

    // Both ends first, then whatever lies between them
    translate(space, start, write)?;
    translate(space, last, write)?;

    let mut page = start.align_down();
    let last_page = last.align_down();
    while page < last_page {
        page = page.checked_add(PAGE_SIZE).ok_or(SyscallError::BadAddress)?;
        translate(space, page, write)?;
    }
    Ok(())
}

/// Copy user memory into `dst`, one page-sized chunk at a time.
fn copy_in(space: &dyn AddressSpace, start: VirtAddr, dst: &mut [u8]) -> SyscallResult<()> {
    let mut va = start;
    let mut done = 0;
    while done < dst.len() {
        let chunk = va.page_remaining().min(dst.len() - done);
        let src = translate(space, va, false)?;
        // SAFETY:
        // - `src` points into a mapped user frame with `chunk` bytes left in the page
        // - `dst[done..done + chunk]` is in bounds and does not overlap user memory
        unsafe { core::ptr::copy_nonoverlapping(src, dst[done..].as_mut_ptr(), chunk) };
        done += chunk;
        if done < dst.len() {
            va = va.checked_add(chunk).ok_or(SyscallError::BadAddress)?;
        }
    }
    Ok(())
}

/// Copy `src` into user memory, one page-sized chunk at a time.
fn copy_out(space: &dyn AddressSpace, start: VirtAddr, src: &[u8]) -> SyscallResult<()> {
    let mut va = start;
    let mut done = 0;
    while done < src.len() {
        let chunk = va.page_remaining().min(src.len() - done);
        let dst = translate(space, va, true)?;
        // SAFETY:
        // - `dst` points into a writable user frame with `chunk` bytes left in the page
        // - `src[done..done + chunk]` is in bounds and does not overlap user memory
        unsafe { core::ptr::copy_nonoverlapping(src[done..].as_ptr(), dst, chunk) };
        done += chunk;
        if done < src.len() {
            va = va.checked_add(chunk).ok_or(SyscallError::BadAddress)?;
        }
    }
    Ok(())
}

/// Start address of `[offset, offset + len)` inside a validated range.
fn sub_range(start: VirtAddr, total: usize, offset: usize, len: usize) -> SyscallResult<VirtAddr> {
    match offset.checked_add(len) {
        Some(end) if end <= total => start.checked_add(offset).ok_or(SyscallError::BadAddress),
        _ => Err(SyscallError::InvalidArgument),
    }
}

/// A validated user-space source buffer
///
/// Only constructed after every page of the range has been checked.
pub struct UserBuffer<'a> {
    space: &'a dyn AddressSpace,
    start: VirtAddr,
    len: usize,
}

impl UserBuffer<'_> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `dst.len()` bytes starting `offset` bytes into the buffer.
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> SyscallResult<()> {
        let at = sub_range(self.start, self.len, offset, dst.len())?;
        copy_in(self.space, at, dst)
    }

    /// Snapshot the whole buffer into kernel memory.
    pub fn copy_in(&self) -> SyscallResult<KernelBuffer> {
        let mut buf = KernelBuffer::zeroed(self.len);
        self.read_at(0, &mut buf)?;
        Ok(buf)
    }
}

/// A validated, writable user-space destination buffer
pub struct UserBufferMut<'a> {
    space: &'a dyn AddressSpace,
    start: VirtAddr,
    len: usize,
}

impl UserBufferMut<'_> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `src` into the buffer starting `offset` bytes in. `src` must fit.
    pub fn write_at(&mut self, offset: usize, src: &[u8]) -> SyscallResult<()> {
        let at = sub_range(self.start, self.len, offset, src.len())?;
        copy_out(self.space, at, src)
    }
}

/// Validate a user-space read buffer
///
/// # Security Checks
/// 1. Start is in user space and mapped
/// 2. Start + length doesn't overflow
/// 3. End is in user space and mapped
/// 4. Every page in between is mapped
pub fn validate_user_read(
    space: &dyn AddressSpace,
    ptr: VirtAddr,
    len: usize,
) -> SyscallResult<UserBuffer<'_>> {
    check_range(space, ptr, len, false)?;
    Ok(UserBuffer {
        space,
        start: ptr,
        len,
    })
}

/// Validate a user-space write buffer
///
/// Same as read validation, but every page must also be writable.
pub fn validate_user_write(
    space: &dyn AddressSpace,
    ptr: VirtAddr,
    len: usize,
) -> SyscallResult<UserBufferMut<'_>> {
    check_range(space, ptr, len, true)?;
    Ok(UserBufferMut {
        space,
        start: ptr,
        len,
    })
}

/// Read one little-endian word from the user stack.
pub fn read_user_word(space: &dyn AddressSpace, va: VirtAddr) -> SyscallResult<u32> {
    let mut word = [0u8; WORD_SIZE];
    check_range(space, va, WORD_SIZE, false)?;
    copy_in(space, va, &mut word)?;
    Ok(u32::from_le_bytes(word))
}

/// Copy a NUL-terminated user string into the kernel.
///
/// Each byte is validated before it is read, so an unterminated string
/// running into unmapped memory is caught at the first bad page. Strings
/// longer than [`MAX_USER_STRING`] or not valid UTF-8 are rejected as
/// invalid arguments.
pub fn read_user_str(space: &dyn AddressSpace, va: VirtAddr) -> SyscallResult<String> {
    let mut bytes = Vec::new();
    let mut addr = va;
    let mut cursor = translate(space, addr, false)?;

    loop {
        // SAFETY: `cursor` was produced by translate() for `addr`
        let byte = unsafe { cursor.read() };
        if byte == 0 {
            break;
        }
        bytes.push(byte);
        if bytes.len() >= MAX_USER_STRING {
            return Err(SyscallError::InvalidArgument);
        }

        addr = addr.checked_add(1).ok_or(SyscallError::BadAddress)?;
        cursor = if addr.is_aligned() {
            translate(space, addr, false)?
        } else {
            // SAFETY: still inside the page translated above
            unsafe { cursor.add(1) }
        };
    }

    String::from_utf8(bytes).map_err(|_| SyscallError::InvalidArgument)
}
