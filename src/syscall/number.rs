//! System call numbers and argument descriptors
//!
//! Each call declares the kinds of the words that follow the selector on
//! the user stack. The dispatcher reads exactly that many words, each one
//! validated, before any handler runs.

use super::error::SyscallError;

/// How one argument word is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// Signed integer (status, fd, pid).
    Int,
    /// Unsigned integer (size, length, position).
    Uint,
    /// Pointer to a NUL-terminated string.
    Str,
    /// Pointer to a buffer; its length is a separate `Uint` argument.
    Buf,
}

/// System call numbers
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syscall {
    /// Power the machine off.
    Halt = 0,
    /// Terminate the calling process.
    Exit = 1,
    /// Start a child process.
    Exec = 2,
    /// Wait for a child to exit.
    Wait = 3,
    /// Create a file.
    Create = 4,
    /// Delete a file.
    Remove = 5,
    /// Open a file.
    Open = 6,
    /// Size of an open file.
    Filesize = 7,
    /// Read from a descriptor.
    Read = 8,
    /// Write to a descriptor.
    Write = 9,
    /// Move a file's position.
    Seek = 10,
    /// Report a file's position.
    Tell = 11,
    /// Close a descriptor.
    Close = 12,
}

impl Syscall {
    /// Argument words this call takes, in stack order.
    pub const fn signature(self) -> &'static [ArgKind] {
        use ArgKind::*;
        match self {
            Self::Halt => &[],
            Self::Exit => &[Int],
            Self::Exec => &[Str],
            Self::Wait => &[Int],
            Self::Create => &[Str, Uint],
            Self::Remove => &[Str],
            Self::Open => &[Str],
            Self::Filesize => &[Int],
            Self::Read => &[Int, Buf, Uint],
            Self::Write => &[Int, Buf, Uint],
            Self::Seek => &[Int, Uint],
            Self::Tell => &[Int],
            Self::Close => &[Int],
        }
    }

    /// Value written back to user code when the call fails recoverably.
    pub const fn failure_value(self) -> i32 {
        match self {
            Self::Create | Self::Remove => 0,
            Self::Seek | Self::Close => 0,
            _ => -1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Halt => "halt",
            Self::Exit => "exit",
            Self::Exec => "exec",
            Self::Wait => "wait",
            Self::Create => "create",
            Self::Remove => "remove",
            Self::Open => "open",
            Self::Filesize => "filesize",
            Self::Read => "read",
            Self::Write => "write",
            Self::Seek => "seek",
            Self::Tell => "tell",
            Self::Close => "close",
        }
    }
}

impl TryFrom<u32> for Syscall {
    type Error = SyscallError;

    fn try_from(no: u32) -> Result<Self, Self::Error> {
        Ok(match no {
            0 => Self::Halt,
            1 => Self::Exit,
            2 => Self::Exec,
            3 => Self::Wait,
            4 => Self::Create,
            5 => Self::Remove,
            6 => Self::Open,
            7 => Self::Filesize,
            8 => Self::Read,
            9 => Self::Write,
            10 => Self::Seek,
            11 => Self::Tell,
            12 => Self::Close,
            _ => return Err(SyscallError::NoSuchSyscall),
        })
    }
}
