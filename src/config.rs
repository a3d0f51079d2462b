//! Kernel-wide constants for the user-program layer.

use crate::mm::address::PAGE_SIZE;

/// First address above user space. Everything below is user-accessible
/// (subject to the page mapping); everything at or above belongs to the
/// kernel.
pub const USER_TOP: usize = 0xC000_0000;

/// Software-interrupt vector used by user code to enter the kernel.
pub const SYSCALL_VECTOR: u8 = 0x30;

/// Privilege level allowed to raise [`SYSCALL_VECTOR`].
pub const SYSCALL_DPL: u8 = 3;

/// Size of one word on the user stack (selector and arguments).
pub const WORD_SIZE: usize = 4;

/// Largest number of argument words any syscall takes.
pub const MAX_SYSCALL_ARGS: usize = 3;

/// Longest user string (terminator included) the kernel will copy in.
pub const MAX_USER_STRING: usize = PAGE_SIZE;

/// Console writes are split into chunks of this size so that output from
/// different processes interleaves at a reasonable granularity.
pub const CONSOLE_CHUNK: usize = 256;

/// Exit status used when the kernel kills a process.
pub const EXIT_FAILURE: i32 = -1;

/// Largest kernel bounce buffer used for one step of a file read or write.
pub const IO_CHUNK: usize = PAGE_SIZE;
