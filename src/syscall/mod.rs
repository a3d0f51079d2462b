//! System Call Interface
//!
//! Provides the system call boundary between user processes and the kernel.
//!
//! # Security Model
//! - Whitelist approach: only the calls in [`Syscall`] exist
//! - All parameters are validated before use
//! - Invalid pointers terminate the caller; other invalid inputs return
//!   an error value, never panic
//!
//! # Calls
//! - 0: halt()
//! - 1: exit(status)
//! - 2: exec(cmdline)
//! - 3: wait(pid)
//! - 4: create(name, initial_size)
//! - 5: remove(name)
//! - 6: open(name)
//! - 7: filesize(fd)
//! - 8: read(fd, buf, len)
//! - 9: write(fd, buf, len)
//! - 10: seek(fd, position)
//! - 11: tell(fd)
//! - 12: close(fd)

mod args;
mod bounce;
mod error;
mod handler;
mod number;
mod validate;


pub use bounce::KernelBuffer;
pub use error::{SyscallError, SyscallResult};
pub use handler::{dispatch, Outcome};
pub use number::{ArgKind, Syscall};
pub use validate::{
    read_user_str, read_user_word, validate_user_read, validate_user_write, UserBuffer,
    UserBufferMut,
};
