//! Kernel context for the user-program layer
//!
//! Bundles the collaborating services with the process arena and the
//! global file lock. One instance serves every process.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;

use crate::fs::{FileLock, FileSystem};
use crate::platform::{Console, Loader, Scheduler};
use crate::process::ProcessTable;

/// Services the kernel is built from.
pub struct Services {
    pub fs: Box<dyn FileSystem>,
    pub console: Arc<dyn Console>,
    pub scheduler: Arc<dyn Scheduler>,
    pub loader: Arc<dyn Loader>,
}

/// The user-program layer of the kernel.
pub struct Kernel {
    files: FileLock,
    console: Arc<dyn Console>,
    scheduler: Arc<dyn Scheduler>,
    loader: Arc<dyn Loader>,
    processes: ProcessTable,
}

impl Kernel {
    pub fn new(services: Services) -> Self {
        Self {
            files: FileLock::new(services.fs),
            console: services.console,
            scheduler: services.scheduler,
            loader: services.loader,
            processes: ProcessTable::new(),
        }
    }

    /// The global file lock.
    pub fn file_lock(&self) -> &FileLock {
        &self.files
    }

    pub fn console(&self) -> &dyn Console {
        &*self.console
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        &*self.scheduler
    }

    pub(crate) fn loader(&self) -> &dyn Loader {
        &*self.loader
    }

    /// Live processes.
    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("files", &self.files)
            .field("processes", &self.processes.len())
            .finish_non_exhaustive()
    }
}
