//! File subsystem access for the syscall layer
//!
//! The on-disk filesystem is a separate service and is not safe to enter
//! from two threads at once. Every call into it goes through the single
//! global [`FileLock`]; the [`FileSystem`] object is only reachable through
//! the lock's guard, so forgetting to take the lock does not compile.

pub mod fdtable;

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;

use spin::{Mutex, MutexGuard};

pub use fdtable::{Fd, FdTable};

/// Owning token for an open file inside the filesystem service.
///
/// Not `Clone`: a handle is closed exactly once, by passing it back to
/// [`FileSystem::close`].
#[derive(PartialEq, Eq, Hash)]
pub struct FileHandle(u64);

impl FileHandle {
    /// Wrap a filesystem-internal identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The filesystem-internal identifier.
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHandle({})", self.0)
    }
}

/// The filesystem service as seen from system calls.
///
/// Offsets and sizes are 32-bit, matching the user ABI.
pub trait FileSystem: Send {
    /// Create a file of `initial_size` bytes. False if it exists or cannot be made.
    fn create(&mut self, name: &str, initial_size: u32) -> bool;

    /// Delete a file by name.
    fn remove(&mut self, name: &str) -> bool;

    /// Open a file by name, positioned at offset 0.
    fn open(&mut self, name: &str) -> Option<FileHandle>;

    /// Close an open file.
    fn close(&mut self, file: FileHandle);

    /// Read from the current position, advancing it. Returns bytes read.
    fn read(&mut self, file: &FileHandle, buf: &mut [u8]) -> Option<usize>;

    /// Write at the current position, advancing it. Returns bytes written.
    fn write(&mut self, file: &FileHandle, buf: &[u8]) -> Option<usize>;

    /// Move the position of an open file.
    fn seek(&mut self, file: &FileHandle, position: u32);

    /// Current position of an open file.
    fn tell(&mut self, file: &FileHandle) -> u32;

    /// Size of an open file in bytes.
    fn length(&mut self, file: &FileHandle) -> u32;
}

/// Guard proving the file lock is held.
pub type FsGuard<'a> = MutexGuard<'a, Box<dyn FileSystem>>;

/// Global serializer for the filesystem service.
///
/// Cloning shares the same lock.
#[derive(Clone)]
pub struct FileLock {
    inner: Arc<Mutex<Box<dyn FileSystem>>>,
}

impl FileLock {
    /// Take ownership of the filesystem service.
    pub fn new(fs: Box<dyn FileSystem>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(fs)),
        }
    }

    /// Acquire the lock. Released when the guard drops.
    pub fn lock(&self) -> FsGuard<'_> {
        self.inner.lock()
    }

    /// Check whether some thread currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

impl fmt::Debug for FileLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}
