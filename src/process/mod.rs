//! User Processes
//!
//! Process records live in a [`ProcessTable`] arena keyed by [`Pid`].
//! Parents refer to their children by id only; a child's exit status is
//! parked in the parent's [`ChildRecord`] until the parent waits for it.
//!
//! # Exit/Wait Protocol
//! - The child writes its status into the parent's record under the
//!   parent's family lock
//! - The parent publishes which child it is blocked on under the same lock
//! - The child wakes the parent only if that published id is its own

mod lifecycle;
pub mod sync;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use spin::Mutex;

use crate::fs::FdTable;
use crate::mm::AddressSpace;

pub use sync::Semaphore;

/// Process identifier. Never reused while the kernel runs.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Pid(u32);

impl Pid {
    /// Wrap a raw process id.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Interpret a syscall argument as a pid. Negative values name nothing.
    #[inline]
    pub fn from_user(raw: i32) -> Option<Self> {
        u32::try_from(raw).ok().map(Self)
    }

    /// The raw id.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parent's record of one child.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ChildRecord {
    /// The child's id.
    pub pid: Pid,
    /// Set once the child has reported its exit status.
    pub exited: bool,
    /// Valid once `exited` is set.
    pub status: i32,
}

/// Children of a process plus the child it is currently waiting for.
#[derive(Debug, Default)]
struct Family {
    children: Vec<ChildRecord>,
    awaiting: Option<Pid>,
}

/// Kernel state of one user process.
pub struct Process {
    pid: Pid,
    parent: Option<Pid>,
    name: String,
    space: Arc<dyn AddressSpace>,
    exit_status: AtomicI32,
    /// Open files. Lock order: take the global file lock first.
    pub(crate) files: Mutex<FdTable>,
    family: Mutex<Family>,
    wakeup: Semaphore,
}

impl Process {
    /// Create a process record. `cmdline`'s first token becomes its name.
    pub fn new(
        pid: Pid,
        parent: Option<Pid>,
        cmdline: &str,
        space: Arc<dyn AddressSpace>,
    ) -> Self {
        let name = cmdline.split_whitespace().next().unwrap_or_default();
        Self {
            pid,
            parent,
            name: String::from(name),
            space,
            exit_status: AtomicI32::new(0),
            files: Mutex::new(FdTable::new()),
            family: Mutex::new(Family::default()),
            wakeup: Semaphore::new(0),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn parent(&self) -> Option<Pid> {
        self.parent
    }

    /// Program name (first token of the command line).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The process's user address space.
    pub fn space(&self) -> &dyn AddressSpace {
        &*self.space
    }

    /// Status recorded by the process's own exit.
    pub fn exit_status(&self) -> i32 {
        self.exit_status.load(Ordering::Acquire)
    }

    pub(crate) fn set_exit_status(&self, status: i32) {
        self.exit_status.store(status, Ordering::Release);
    }

    /// Number of files the process holds open.
    pub fn open_files(&self) -> usize {
        self.files.lock().len()
    }

    /// Snapshot of the child records.
    pub fn children(&self) -> Vec<ChildRecord> {
        self.family.lock().children.clone()
    }

    /// Register a freshly spawned child.
    pub(crate) fn adopt(&self, child: Pid) {
        self.family.lock().children.push(ChildRecord {
            pid: child,
            exited: false,
            status: 0,
        });
    }

    /// Called on the child's thread when `child` exits.
    ///
    /// Wakes this process only if it is blocked waiting for `child`.
    pub(crate) fn child_exited(&self, child: Pid, status: i32) {
        let wake = {
            let mut family = self.family.lock();
            let Some(record) = family.children.iter_mut().find(|c| c.pid == child) else {
                return;
            };
            record.exited = true;
            record.status = status;
            if family.awaiting == Some(child) {
                family.awaiting = None;
                true
            } else {
                false
            }
        };
        if wake {
            self.wakeup.up();
        }
    }

    /// Block until `child` exits and consume its status.
    ///
    /// Returns `None` without blocking if `child` is not an unconsumed
    /// child of this process.
    pub(crate) fn wait_for(&self, child: Pid, relax: impl FnMut()) -> Option<i32> {
        {
            let mut family = self.family.lock();
            let index = family.children.iter().position(|c| c.pid == child)?;
            if family.children[index].exited {
                return Some(family.children.remove(index).status);
            }
            family.awaiting = Some(child);
        }

        self.wakeup.down(relax);

        let mut family = self.family.lock();
        let index = family.children.iter().position(|c| c.pid == child)?;
        Some(family.children.remove(index).status)
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("parent", &self.parent)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Arena of live processes.
#[derive(Debug)]
pub struct ProcessTable {
    procs: Mutex<BTreeMap<Pid, Arc<Process>>>,
    next_pid: AtomicU32,
}

impl ProcessTable {
    const MAX_PID: u32 = i32::MAX as u32;

    pub const fn new() -> Self {
        Self {
            procs: Mutex::new(BTreeMap::new()),
            next_pid: AtomicU32::new(1),
        }
    }

    /// Hand out a fresh process id.
    ///
    /// Ids stay within `i32` so user code can always be told about them.
    /// `None` once they run out; the counter never wraps.
    pub fn alloc_pid(&self) -> Option<Pid> {
        self.next_pid
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
                (next <= Self::MAX_PID).then(|| next + 1)
            })
            .ok()
            .map(Pid)
    }

    #[cfg(test)]
    pub(crate) fn skip_to(&self, next: u32) {
        self.next_pid.store(next, Ordering::Relaxed);
    }

    pub fn insert(&self, process: Arc<Process>) {
        self.procs.lock().insert(process.pid(), process);
    }

    pub fn get(&self, pid: Pid) -> Option<Arc<Process>> {
        self.procs.lock().get(&pid).cloned()
    }

    pub fn remove(&self, pid: Pid) -> Option<Arc<Process>> {
        self.procs.lock().remove(&pid)
    }

    /// Number of live processes.
    pub fn len(&self) -> usize {
        self.procs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.lock().is_empty()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSpace;
    use std::thread;

    fn process(pid: u32, parent: Option<u32>) -> Arc<Process> {
        Arc::new(Process::new(
            Pid::new(pid),
            parent.map(Pid::new),
            "prog arg",
            Arc::new(MockSpace::new()),
        ))
    }

    #[test]
    fn test_name_is_first_token() {
        let p = Process::new(Pid::new(1), None, "  echo  hello world", Arc::new(MockSpace::new()));
        assert_eq!(p.name(), "echo");
    }

    #[test]
    fn test_wait_unknown_child_does_not_block() {
        let parent = process(1, None);
        assert_eq!(parent.wait_for(Pid::new(9), || panic!("must not block")), None);
    }

    #[test]
    fn test_wait_after_exit_consumes_record() {
        let parent = process(1, None);
        parent.adopt(Pid::new(2));
        parent.child_exited(Pid::new(2), 42);
        assert_eq!(parent.wait_for(Pid::new(2), || panic!("already exited")), Some(42));
        assert_eq!(parent.wait_for(Pid::new(2), || panic!("consumed")), None);
        assert!(parent.children().is_empty());
    }

    #[test]
    fn test_exit_of_other_child_does_not_wake() {
        let parent = process(1, None);
        parent.adopt(Pid::new(2));
        parent.adopt(Pid::new(3));
        parent.family.lock().awaiting = Some(Pid::new(2));
        parent.child_exited(Pid::new(3), 7);
        assert_eq!(parent.wakeup.permits(), 0);
        parent.child_exited(Pid::new(2), 5);
        assert_eq!(parent.wakeup.permits(), 1);
    }

    #[test]
    fn test_wait_blocks_until_child_exits() {
        let parent = process(1, None);
        parent.adopt(Pid::new(2));
        let child_side = {
            let parent = Arc::clone(&parent);
            thread::spawn(move || {
                // Give the parent a chance to block first
                while parent.family.lock().awaiting.is_none() {
                    thread::yield_now();
                }
                parent.child_exited(Pid::new(2), -3);
            })
        };
        assert_eq!(parent.wait_for(Pid::new(2), thread::yield_now), Some(-3));
        child_side.join().unwrap();
        assert_eq!(parent.wakeup.permits(), 0);
    }

    #[test]
    fn test_pid_from_user() {
        assert_eq!(Pid::from_user(-1), None);
        assert_eq!(Pid::from_user(5), Some(Pid::new(5)));
    }

    #[test]
    fn test_table_ids_are_unique() {
        let table = ProcessTable::new();
        let a = table.alloc_pid().unwrap();
        let b = table.alloc_pid().unwrap();
        assert_ne!(a, b);
        table.insert(process(a.raw(), None));
        assert!(table.get(a).is_some());
        assert!(table.remove(a).is_some());
        assert!(table.get(a).is_none());
    }

    #[test]
    fn test_ids_stop_at_i32_max() {
        let table = ProcessTable::new();
        table.skip_to(i32::MAX as u32);
        assert_eq!(table.alloc_pid(), Some(Pid::new(i32::MAX as u32)));
        assert_eq!(table.alloc_pid(), None);
        assert_eq!(table.alloc_pid(), None);

        table.skip_to(u32::MAX);
        assert_eq!(table.alloc_pid(), None);
    }
}
