//! Per-Process File Descriptor Table
//!
//! Maps small integers handed to user code onto open files.
//!
//! # Design
//! - Entries are kept sorted by descriptor; lookup is a binary search
//! - Descriptors come from a per-process counter and are never recycled,
//!   so a stale descriptor can never alias a newer file
//! - Descriptors 0 and 1 are reserved for the console and never stored

use alloc::vec::Vec;
use core::fmt;

use super::{FileHandle, FileSystem};

/// A file descriptor number as seen by user code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Fd(i32);

impl Fd {
    /// Console input.
    pub const STDIN: Self = Self(0);

    /// Console output.
    pub const STDOUT: Self = Self(1);

    /// First descriptor handed out for real files.
    pub const FIRST_FILE: Self = Self(2);

    /// Wrap a raw descriptor taken from a syscall argument.
    #[inline]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw descriptor value.
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Check whether this is one of the console descriptors.
    #[inline]
    pub const fn is_console(self) -> bool {
        self.0 == Self::STDIN.0 || self.0 == Self::STDOUT.0
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One open file owned by a process.
#[derive(Debug)]
struct Entry {
    fd: Fd,
    file: FileHandle,
}

/// Descriptor table of a single process.
#[derive(Debug)]
pub struct FdTable {
    entries: Vec<Entry>,
    next: i32,
}

impl FdTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next: Fd::FIRST_FILE.0,
        }
    }

    /// Number of open files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether no files are open.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an open file under the next free descriptor.
    ///
    /// Gives the file back if the descriptor space is exhausted; the caller
    /// is then responsible for closing it.
    pub fn allocate(&mut self, file: FileHandle) -> Result<Fd, FileHandle> {
        let fd = Fd(self.next);
        self.next = match self.next.checked_add(1) {
            Some(next) => next,
            None => return Err(file),
        };
        // Monotonic allocation keeps `entries` sorted
        self.entries.push(Entry { fd, file });
        Ok(fd)
    }

    fn index_of(&self, fd: Fd) -> Option<usize> {
        self.entries.binary_search_by_key(&fd, |e| e.fd).ok()
    }

    /// Look up the file behind a descriptor.
    pub fn resolve(&self, fd: Fd) -> Option<&FileHandle> {
        self.index_of(fd).map(|i| &self.entries[i].file)
    }

    /// Remove a descriptor without closing its file.
    pub fn take(&mut self, fd: Fd) -> Option<FileHandle> {
        self.index_of(fd).map(|i| self.entries.remove(i).file)
    }

    /// Remove a descriptor and close its file.
    ///
    /// Unknown descriptors are ignored. Returns whether a file was closed.
    pub fn release(&mut self, fd: Fd, fs: &mut dyn FileSystem) -> bool {
        match self.take(fd) {
            Some(file) => {
                fs.close(file);
                true
            }
            None => false,
        }
    }

    /// Close every open file. Returns how many were closed.
    pub fn release_all(&mut self, fs: &mut dyn FileSystem) -> usize {
        let count = self.entries.len();
        for entry in self.entries.drain(..) {
            fs.close(entry.file);
        }
        count
    }

    /// Descriptors currently open, in ascending order.
    pub fn descriptors(&self) -> impl Iterator<Item = Fd> + '_ {
        self.entries.iter().map(|e| e.fd)
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}
