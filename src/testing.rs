//! In-memory collaborators for host-side tests.

use std::cell::{Cell, UnsafeCell};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spin::Mutex;

use crate::fs::{FileHandle, FileSystem};
use crate::kernel::{Kernel, Services};
use crate::mm::{AddressSpace, Mapping, PageFlags, VirtAddr, PAGE_SIZE};
use crate::platform::{Console, Loader, Scheduler};
use crate::process::Pid;
use crate::trap::{Disposition, TrapFrame};

type Frame = Box<UnsafeCell<[u8; PAGE_SIZE]>>;

/// Page-granular fake user memory.
#[derive(Default)]
pub struct MockSpace {
    pages: Mutex<BTreeMap<usize, (Frame, PageFlags)>>,
}

impl MockSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `count` zeroed pages starting at the page containing `start`.
    pub fn map(&self, start: VirtAddr, count: usize, flags: PageFlags) {
        let mut pages = self.pages.lock();
        for n in 0..count {
            let frame: Frame = Box::new(UnsafeCell::new([0; PAGE_SIZE]));
            pages.insert(start.page_number() + n, (frame, flags));
        }
    }

    pub fn is_mapped(&self, va: VirtAddr) -> bool {
        self.pages.lock().contains_key(&va.page_number())
    }

    fn byte_ptr(&self, va: VirtAddr) -> *mut u8 {
        let pages = self.pages.lock();
        let (frame, _) = pages
            .get(&va.page_number())
            .unwrap_or_else(|| panic!("test touched unmapped {:?}", va));
        // SAFETY: offset < PAGE_SIZE; frames are never freed while the space lives
        unsafe { (frame.get() as *mut u8).add(va.page_offset()) }
    }

    /// Poke bytes into user memory, ignoring permissions.
    pub fn write(&self, at: VirtAddr, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            let ptr = self.byte_ptr(VirtAddr::new(at.as_usize() + i));
            // SAFETY: see byte_ptr
            unsafe { ptr.write(byte) };
        }
    }

    /// Peek bytes from user memory, ignoring permissions.
    pub fn read(&self, at: VirtAddr, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| {
                let ptr = self.byte_ptr(VirtAddr::new(at.as_usize() + i));
                // SAFETY: see byte_ptr
                unsafe { ptr.read() }
            })
            .collect()
    }
}

impl AddressSpace for MockSpace {
    fn translate(&self, page: VirtAddr) -> Option<Mapping> {
        let pages = self.pages.lock();
        let (frame, flags) = pages.get(&page.page_number())?;
        Some(Mapping {
            frame: NonNull::new(frame.get() as *mut u8)?,
            flags: *flags,
        })
    }
}

/// Lays out strings, buffers and syscall frames in a [`MockSpace`].
pub struct UserStack<'a> {
    space: &'a MockSpace,
    next: usize,
}

impl<'a> UserStack<'a> {
    pub const DATA_BASE: usize = 0x0804_8000;
    pub const DATA_PAGES: usize = 8;
    pub const STACK_BASE: usize = 0xBFFF_E000;

    pub fn new(space: &'a MockSpace) -> Self {
        if !space.is_mapped(VirtAddr::new(Self::DATA_BASE)) {
            space.map(VirtAddr::new(Self::DATA_BASE), Self::DATA_PAGES, PageFlags::USER_RW);
        }
        if !space.is_mapped(VirtAddr::new(Self::STACK_BASE)) {
            space.map(VirtAddr::new(Self::STACK_BASE), 2, PageFlags::USER_RW);
        }
        Self {
            space,
            next: Self::DATA_BASE,
        }
    }

    /// Copy bytes into the data area.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> VirtAddr {
        let at = VirtAddr::new(self.next);
        self.space.write(at, bytes);
        self.next += bytes.len();
        at
    }

    /// Copy a NUL-terminated string into the data area.
    pub fn push_str(&mut self, s: &str) -> VirtAddr {
        let at = self.push_bytes(s.as_bytes());
        self.push_bytes(&[0]);
        at
    }

    /// Reserve zeroed space in the data area.
    pub fn reserve(&mut self, len: usize) -> VirtAddr {
        let at = VirtAddr::new(self.next);
        self.next += len;
        at
    }

    /// Write selector and argument words; returns the stack pointer.
    pub fn frame(&mut self, selector: u32, args: &[u32]) -> VirtAddr {
        let esp = VirtAddr::new(Self::STACK_BASE + PAGE_SIZE);
        self.space.write(esp, &selector.to_le_bytes());
        for (i, word) in args.iter().enumerate() {
            self.space
                .write(VirtAddr::new(esp.as_usize() + 4 * (i + 1)), &word.to_le_bytes());
        }
        esp
    }
}

#[derive(Default)]
struct MemFsState {
    files: BTreeMap<String, Vec<u8>>,
    open: BTreeMap<u64, (String, usize)>,
    next_handle: u64,
}

/// Fixed-size in-memory filesystem. Files never grow past their length.
#[derive(Clone, Default)]
pub struct MemFs {
    state: Arc<Mutex<MemFsState>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().open.len()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.state.lock().files.contains_key(name)
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(name).cloned()
    }

    pub fn put(&self, name: &str, contents: &[u8]) {
        self.state
            .lock()
            .files
            .insert(name.to_string(), contents.to_vec());
    }
}

impl FileSystem for MemFs {
    fn create(&mut self, name: &str, initial_size: u32) -> bool {
        let mut state = self.state.lock();
        if name.is_empty() || state.files.contains_key(name) {
            return false;
        }
        state
            .files
            .insert(name.to_string(), vec![0; initial_size as usize]);
        true
    }

    fn remove(&mut self, name: &str) -> bool {
        self.state.lock().files.remove(name).is_some()
    }

    fn open(&mut self, name: &str) -> Option<FileHandle> {
        let mut state = self.state.lock();
        if !state.files.contains_key(name) {
            return None;
        }
        state.next_handle += 1;
        let raw = state.next_handle;
        state.open.insert(raw, (name.to_string(), 0));
        Some(FileHandle::new(raw))
    }

    fn close(&mut self, file: FileHandle) {
        let removed = self.state.lock().open.remove(&file.raw());
        assert!(removed.is_some(), "double close of {:?}", file);
    }

    fn read(&mut self, file: &FileHandle, buf: &mut [u8]) -> Option<usize> {
        let mut state = self.state.lock();
        let (name, pos) = state.open.get(&file.raw())?.clone();
        let data = state.files.get(&name)?;
        let start = pos.min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        state.open.get_mut(&file.raw())?.1 = pos + n;
        Some(n)
    }

    fn write(&mut self, file: &FileHandle, buf: &[u8]) -> Option<usize> {
        let mut state = self.state.lock();
        let (name, pos) = state.open.get(&file.raw())?.clone();
        let data = state.files.get_mut(&name)?;
        let start = pos.min(data.len());
        let n = buf.len().min(data.len() - start);
        data[start..start + n].copy_from_slice(&buf[..n]);
        state.open.get_mut(&file.raw())?.1 = pos + n;
        Some(n)
    }

    fn seek(&mut self, file: &FileHandle, position: u32) {
        if let Some(entry) = self.state.lock().open.get_mut(&file.raw()) {
            entry.1 = position as usize;
        }
    }

    fn tell(&mut self, file: &FileHandle) -> u32 {
        self.state
            .lock()
            .open
            .get(&file.raw())
            .map_or(0, |(_, pos)| *pos as u32)
    }

    fn length(&mut self, file: &FileHandle) -> u32 {
        let state = self.state.lock();
        state
            .open
            .get(&file.raw())
            .and_then(|(name, _)| state.files.get(name))
            .map_or(0, |data| data.len() as u32)
    }
}

#[derive(Default)]
struct ConsoleState {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

/// Scripted console.
#[derive(Clone, Default)]
pub struct MockConsole {
    state: Arc<Mutex<ConsoleState>>,
}

impl MockConsole {
    pub fn new(input: &[u8]) -> Self {
        let console = Self::default();
        console.state.lock().input.extend(input);
        console
    }

    pub fn output(&self) -> Vec<u8> {
        self.state.lock().output.clone()
    }

    pub fn output_str(&self) -> String {
        String::from_utf8(self.output()).unwrap()
    }

    pub fn remaining_input(&self) -> usize {
        self.state.lock().input.len()
    }
}

impl Console for MockConsole {
    fn write(&self, bytes: &[u8]) {
        self.state.lock().output.extend_from_slice(bytes);
    }

    fn read_byte(&self) -> u8 {
        self.state
            .lock()
            .input
            .pop_front()
            .expect("console input exhausted")
    }
}

thread_local! {
    static CURRENT: Cell<Option<Pid>> = const { Cell::new(None) };
}

/// Scheduler whose "current process" is per OS thread.
#[derive(Default)]
pub struct MockScheduler {
    started: Mutex<Vec<Pid>>,
    powered_off: AtomicBool,
}

impl MockScheduler {
    pub fn set_current(pid: Pid) {
        CURRENT.with(|c| c.set(Some(pid)));
    }

    pub fn started(&self) -> Vec<Pid> {
        self.started.lock().clone()
    }

    pub fn powered_off(&self) -> bool {
        self.powered_off.load(Ordering::SeqCst)
    }
}

impl Scheduler for MockScheduler {
    fn current(&self) -> Pid {
        CURRENT
            .with(Cell::get)
            .expect("test thread has no current process")
    }

    fn start(&self, pid: Pid) {
        self.started.lock().push(pid);
    }

    fn yield_now(&self) {
        std::thread::yield_now();
    }

    fn power_off(&self) {
        self.powered_off.store(true, Ordering::SeqCst);
    }
}

/// Loader that knows a fixed set of program names.
#[derive(Default)]
pub struct MockLoader {
    programs: Mutex<BTreeSet<String>>,
    loaded: Mutex<Vec<Arc<MockSpace>>>,
}

impl MockLoader {
    pub fn install(&self, name: &str) {
        self.programs.lock().insert(name.to_string());
    }
}

impl Loader for MockLoader {
    fn load(&self, fs: &mut dyn FileSystem, cmdline: &str) -> Option<Arc<dyn AddressSpace>> {
        let program = cmdline.split_whitespace().next()?;
        if !self.programs.lock().contains(program) {
            return None;
        }
        let image = fs.open(program)?;
        fs.close(image);
        let space = Arc::new(MockSpace::new());
        self.loaded.lock().push(Arc::clone(&space));
        Some(space)
    }
}

/// A kernel wired to in-memory collaborators.
pub struct TestKernel {
    pub kernel: Kernel,
    pub fs: MemFs,
    pub console: MockConsole,
    pub scheduler: Arc<MockScheduler>,
    pub loader: Arc<MockLoader>,
}

impl TestKernel {
    pub fn new() -> Self {
        Self::with_input(b"")
    }

    pub fn with_input(input: &[u8]) -> Self {
        let fs = MemFs::new();
        Self::build(input, Box::new(fs.clone()), fs)
    }

    /// Kernel backed by `service` instead of a [`MemFs`]. The loader opens
    /// programs through `service`, so it must know their names.
    pub fn with_fs(service: Box<dyn FileSystem>) -> Self {
        Self::build(b"", service, MemFs::new())
    }

    fn build(input: &[u8], service: Box<dyn FileSystem>, fs: MemFs) -> Self {
        let console = MockConsole::new(input);
        let scheduler = Arc::new(MockScheduler::default());
        let loader = Arc::new(MockLoader::default());
        let kernel = Kernel::new(Services {
            fs: service,
            console: Arc::new(console.clone()),
            scheduler: scheduler.clone(),
            loader: loader.clone(),
        });
        Self {
            kernel,
            fs,
            console,
            scheduler,
            loader,
        }
    }

    /// Make `name` both an openable file and a loadable program.
    pub fn install(&self, name: &str) {
        self.fs.put(name, b"\x7fELF");
        self.loader.install(name);
    }

    pub fn fs_create(&self, name: &str, contents: &[u8]) {
        self.fs.put(name, contents);
    }

    /// Spawn an initial process and make it current on this thread.
    pub fn boot(&self, cmdline: &str) -> Pid {
        let program = cmdline.split_whitespace().next().unwrap();
        self.install(program);
        let pid = self.kernel.spawn_initial(cmdline).unwrap();
        MockScheduler::set_current(pid);
        pid
    }

    /// The mock address space the loader built for `pid`.
    pub fn space(&self, pid: Pid) -> Arc<MockSpace> {
        let process = self.kernel.processes().get(pid).unwrap();
        let wanted = process.space() as *const dyn AddressSpace as *const u8;
        self.loader
            .loaded
            .lock()
            .iter()
            .find(|s| std::ptr::eq(Arc::as_ptr(*s) as *const u8, wanted))
            .cloned()
            .unwrap()
    }

    pub fn open_files(&self) -> usize {
        self.fs.open_count()
    }

    /// Trap into the kernel as `pid` with the given stack pointer.
    pub fn trap(&self, pid: Pid, esp: VirtAddr) -> (Disposition, i32) {
        MockScheduler::set_current(pid);
        let mut frame = TrapFrame::syscall(esp.as_usize() as u32);
        let disposition = self.kernel.handle_trap(&mut frame);
        (disposition, frame.result())
    }
}
