//! System call error codes

use core::fmt;

/// Why a system call could not complete.
///
/// Only [`SyscallError::BadAddress`] is fatal to the caller; everything
/// else is reported back to user code as the operation's failure value.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// Bad address (invalid or unmapped user pointer)
    BadAddress = -14,
    /// Bad file descriptor
    BadDescriptor = -9,
    /// No such file
    NotFound = -2,
    /// Per-process descriptor space exhausted
    TooManyFiles = -24,
    /// The loader could not start the program
    LoadFailed = -8,
    /// Not a waitable child of the caller
    NoSuchChild = -10,
    /// Invalid argument
    InvalidArgument = -22,
    /// Invalid system call number
    NoSuchSyscall = -38,
}

impl SyscallError {
    /// Check whether the calling process must be terminated.
    #[inline]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::BadAddress)
    }

    /// Errno-style code, for diagnostics.
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadAddress => write!(f, "bad user address"),
            Self::BadDescriptor => write!(f, "bad file descriptor"),
            Self::NotFound => write!(f, "no such file"),
            Self::TooManyFiles => write!(f, "too many open files"),
            Self::LoadFailed => write!(f, "program could not be loaded"),
            Self::NoSuchChild => write!(f, "no such child"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::NoSuchSyscall => write!(f, "unknown system call"),
        }
    }
}

/// Result type of system call handlers.
pub type SyscallResult<T = i32> = Result<T, SyscallError>;
