//! PantherOS - User Program Layer
//!
//! The system-call boundary between user processes and the kernel: the
//! only place where untrusted user state crosses into kernel code.
//!
//! # Components
//! - Address validation for every user pointer (`syscall::validate`)
//! - Syscall dispatch with typed argument decoding (`syscall`)
//! - Per-process file descriptor tables (`fs::fdtable`)
//! - Process exit/wait hand-off between parent and child (`process`)
//! - One global lock serializing the filesystem service (`fs::FileLock`)
//!
//! # Security Features
//! - Bad user pointers terminate the caller, never the kernel
//! - The filesystem is only reachable while its lock is held
//! - Descriptors are never recycled within a process
//! - Kernel bounce buffers are wiped before they are freed
//!
//! # Collaborators
//! Scheduling, paging, program loading, the filesystem itself and the
//! console are provided by the rest of the kernel through the traits in
//! [`platform`], [`mm::space`] and [`fs`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod drivers;
pub mod fs;
pub mod kernel;
pub mod logger;
pub mod mm;
pub mod platform;
pub mod process;
pub mod syscall;
pub mod trap;

#[cfg(test)]
mod testing;

pub use kernel::{Kernel, Services};
pub use process::Pid;
pub use trap::{syscall_init, Disposition, TrapFrame};
