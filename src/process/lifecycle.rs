//! Spawning, exiting and waiting
//!
//! These are the kernel-side halves of `exec`, `exit` and `wait`. Exit is
//! also the teardown path for processes killed by the kernel.

use alloc::format;
use alloc::sync::Arc;

use log::{debug, info, warn};

use crate::kernel::Kernel;

use super::{Pid, Process};

impl Kernel {
    /// Start the first user process (no parent).
    pub fn spawn_initial(&self, cmdline: &str) -> Option<Pid> {
        self.spawn(None, cmdline)
    }

    /// Load `cmdline` and start it as a child of `parent`.
    ///
    /// The loader runs under the file lock. Nothing is registered unless
    /// both the load and the pid allocation succeed.
    ///
    /// The child record is in place before the child's thread is started,
    /// so the child can never exit before its parent is able to see it.
    pub(crate) fn spawn(&self, parent: Option<&Process>, cmdline: &str) -> Option<Pid> {
        let loaded = {
            let mut fs = self.file_lock().lock();
            self.loader().load(&mut **fs, cmdline)
        };
        let Some(space) = loaded else {
            debug!("[PROCESS] load failed: {:?}", cmdline);
            return None;
        };

        let Some(pid) = self.processes().alloc_pid() else {
            warn!("[PROCESS] out of process ids, not starting {:?}", cmdline);
            return None;
        };
        let process = Arc::new(Process::new(pid, parent.map(Process::pid), cmdline, space));
        let name = process.name();
        info!("[PROCESS] spawn {} ({}) parent {:?}", pid, name, parent.map(Process::pid));

        self.processes().insert(Arc::clone(&process));
        if let Some(parent) = parent {
            parent.adopt(pid);
        }
        self.scheduler().start(pid);
        Some(pid)
    }

    /// Block `parent` until `child` exits; consume and return its status.
    ///
    /// `None` if `child` is not an unconsumed child of `parent`.
    pub fn wait(&self, parent: &Process, child: Pid) -> Option<i32> {
        debug!("[PROCESS] {} waits for {}", parent.pid(), child);
        parent.wait_for(child, || self.scheduler().yield_now())
    }

    /// Record the exit of `pid` and release everything it owns.
    ///
    /// Runs for every kind of termination: `exit`, a bad pointer, or a
    /// fault. The caller hands the thread back to the scheduler afterwards.
    pub fn exit_process(&self, pid: Pid, status: i32) {
        let Some(process) = self.processes().remove(pid) else {
            warn!("[PROCESS] exit of unknown pid {}", pid);
            return;
        };
        process.set_exit_status(status);

        if let Some(parent) = process.parent().and_then(|ppid| self.processes().get(ppid)) {
            parent.child_exited(pid, status);
        }

        let closed = self.release_files(&process);
        self.console()
            .write(format!("{}: exit({})\n", process.name(), status).as_bytes());
        info!("[PROCESS] {} exited with {} ({} files closed)", pid, status, closed);
    }

    /// Close every file `pid` still holds open.
    pub fn close_all_files(&self, pid: Pid) -> usize {
        match self.processes().get(pid) {
            Some(process) => self.release_files(&process),
            None => 0,
        }
    }

    fn release_files(&self, process: &Process) -> usize {
        let mut fs = self.file_lock().lock();
        process.files.lock().release_all(&mut **fs)
    }
}
