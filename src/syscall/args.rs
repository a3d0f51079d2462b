//! Argument marshalling from the user stack
//!
//! Layout at the trapped stack pointer:
//!
//! ```text
//! esp + 0   selector
//! esp + 4   argument 0
//! esp + 8   argument 1
//! esp + 12  argument 2
//! ```
//!
//! Only as many argument words as the call's signature declares are read,
//! each through the validator.

use alloc::string::String;

use crate::config::{MAX_SYSCALL_ARGS, WORD_SIZE};
use crate::mm::{AddressSpace, VirtAddr};

use super::error::{SyscallError, SyscallResult};
use super::number::{ArgKind, Syscall};
use super::validate::{self, UserBuffer, UserBufferMut};

/// Read the selector word at `esp`.
pub fn read_selector(space: &dyn AddressSpace, esp: VirtAddr) -> SyscallResult<u32> {
    validate::read_user_word(space, esp)
}

/// Decoded, validated argument words of one call.
pub struct Args<'a> {
    space: &'a dyn AddressSpace,
    call: Syscall,
    words: [u32; MAX_SYSCALL_ARGS],
}

impl<'a> Args<'a> {
    /// Read every argument word `call` declares.
    pub fn decode(
        space: &'a dyn AddressSpace,
        esp: VirtAddr,
        call: Syscall,
    ) -> SyscallResult<Self> {
        let mut words = [0u32; MAX_SYSCALL_ARGS];
        for (i, word) in words.iter_mut().enumerate().take(call.signature().len()) {
            let offset = WORD_SIZE * (i + 1);
            let at = esp.checked_add(offset).ok_or(SyscallError::BadAddress)?;
            *word = validate::read_user_word(space, at)?;
        }
        Ok(Self { space, call, words })
    }

    fn word(&self, index: usize, kind: ArgKind) -> u32 {
        debug_assert_eq!(
            self.call.signature().get(index),
            Some(&kind),
            "{} argument {} is not {:?}",
            self.call.name(),
            index,
            kind
        );
        self.words[index]
    }

    /// Signed integer argument.
    pub fn int(&self, index: usize) -> i32 {
        self.word(index, ArgKind::Int) as i32
    }

    /// Unsigned integer argument.
    pub fn uint(&self, index: usize) -> u32 {
        self.word(index, ArgKind::Uint)
    }

    /// String argument, copied into the kernel.
    pub fn string(&self, index: usize) -> SyscallResult<String> {
        let ptr = VirtAddr::from(self.word(index, ArgKind::Str));
        validate::read_user_str(self.space, ptr)
    }

    /// Source buffer argument; its length is the following argument.
    pub fn buffer(&self, index: usize) -> SyscallResult<UserBuffer<'a>> {
        let ptr = VirtAddr::from(self.word(index, ArgKind::Buf));
        let len = self.uint(index + 1) as usize;
        validate::validate_user_read(self.space, ptr, len)
    }

    /// Destination buffer argument; its length is the following argument.
    pub fn buffer_mut(&self, index: usize) -> SyscallResult<UserBufferMut<'a>> {
        let ptr = VirtAddr::from(self.word(index, ArgKind::Buf));
        let len = self.uint(index + 1) as usize;
        validate::validate_user_write(self.space, ptr, len)
    }
}
