//! Services the user-program layer consumes from the rest of the kernel
//!
//! Scheduling, program loading and the console are owned by other
//! subsystems. They are reached only through these traits so the syscall
//! boundary can be exercised without real hardware.

use alloc::sync::Arc;

use crate::fs::FileSystem;
use crate::mm::AddressSpace;
use crate::process::Pid;

/// Character console.
pub trait Console: Send + Sync {
    /// Write raw bytes to the console output.
    fn write(&self, bytes: &[u8]);

    /// Read one byte of console input, blocking until one is available.
    fn read_byte(&self) -> u8;
}

/// Thread and machine control.
pub trait Scheduler: Send + Sync {
    /// Process owning the thread that is currently running.
    fn current(&self) -> Pid;

    /// Start running the user thread of a freshly registered process.
    fn start(&self, pid: Pid);

    /// Give up the CPU while waiting for an event.
    fn yield_now(&self);

    /// Power the machine off.
    fn power_off(&self);
}

/// Program loader.
pub trait Loader: Send + Sync {
    /// Build the address space for `cmdline`: map the executable named by
    /// its first token and lay the arguments out on the user stack.
    ///
    /// Called with the file lock held; `fs` is the filesystem behind it and
    /// the only way the loader may read the executable.
    fn load(&self, fs: &mut dyn FileSystem, cmdline: &str) -> Option<Arc<dyn AddressSpace>>;
}
